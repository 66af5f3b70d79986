// src/channel.rs

//! Consumer side of the native-to-consumer handoff.
//!
//! The bridge pushes decoded events into an unbounded tokio channel from
//! whatever thread the native service calls back on; pushing never blocks.
//! [`Events`] is the read end. It yields events in push order and ends
//! once the stream has left `Started` and everything already pushed has been
//! drained.

use tokio::sync::mpsc;

use crate::event::DecodedEvent;

pub(crate) type EventSender = mpsc::UnboundedSender<DecodedEvent>;

pub(crate) fn event_channel() -> (EventSender, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    (tx, Events { rx })
}

/// Lazy, unbounded, non-restartable sequence of events for one stream.
#[derive(Debug)]
pub struct Events {
    rx: mpsc::UnboundedReceiver<DecodedEvent>,
}

impl Events {
    /// Next event, or `None` once the sequence has ended.
    pub async fn recv(&mut self) -> Option<DecodedEvent> {
        self.rx.recv().await
    }

    /// Blocking variant of [`Events::recv`]. Must not be called from inside
    /// an async runtime.
    pub fn blocking_recv(&mut self) -> Option<DecodedEvent> {
        self.rx.blocking_recv()
    }

    /// Next event if one is already queued.
    pub fn try_recv(&mut self) -> Option<DecodedEvent> {
        self.rx.try_recv().ok()
    }

    /// Number of events queued but not yet received.
    pub fn pending(&self) -> usize {
        self.rx.len()
    }

    pub fn into_blocking_iter(self) -> BlockingEvents {
        BlockingEvents { inner: self }
    }
}

/// Iterator adapter over [`Events::blocking_recv`].
#[derive(Debug)]
pub struct BlockingEvents {
    inner: Events,
}

impl Iterator for BlockingEvents {
    type Item = DecodedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.blocking_recv()
    }
}
