// src/event.rs

//! Raw and decoded change notifications.

use std::fmt;
use std::path::PathBuf;

use crate::flags::{self, EventFlags};
use crate::types::EventId;

/// One notification exactly as the native layer reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: String,
    pub flags: u32,
    pub id: EventId,
}

impl RawEvent {
    pub fn new(path: impl Into<String>, flags: EventFlags, id: u64) -> Self {
        Self {
            path: path.into(),
            flags: flags.bits(),
            id: EventId(id),
        }
    }

    pub fn decode(self) -> DecodedEvent {
        DecodedEvent {
            path: PathBuf::from(self.path),
            flags: flags::decode(self.flags),
            id: self.id,
        }
    }
}

/// The unit the consumer receives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedEvent {
    pub path: PathBuf,
    pub flags: EventFlags,
    pub id: EventId,
}

/// Signal that events were coalesced or lost and cached state for the
/// event's subtree must be rebuilt by rescanning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAnomaly {
    pub kernel_dropped: bool,
    pub user_dropped: bool,
}

/// Structural classification of a [`DecodedEvent`].
///
/// Sentinels (`HistoryDone`, `RootChanged`) and anomalies are kept apart
/// from ordinary content changes so consumers can't mistake one for the
/// other.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// End of historical replay. The path is meaningless.
    HistoryDone,
    /// Rescan the subtree rooted at the event path.
    Rescan(DeliveryAnomaly),
    /// The id counter wrapped; previously stored ids are now invalid.
    IdsWrapped,
    /// A directory along a watched path's ancestry changed. Id is zero.
    RootChanged,
    Mount,
    Unmount,
    Change,
}

impl DecodedEvent {
    pub fn kind(&self) -> EventKind {
        let f = self.flags;
        if f.contains(EventFlags::HISTORY_DONE) {
            EventKind::HistoryDone
        } else if f.intersects(EventFlags::RESCAN) {
            EventKind::Rescan(DeliveryAnomaly {
                kernel_dropped: f.contains(EventFlags::KERNEL_DROPPED),
                user_dropped: f.contains(EventFlags::USER_DROPPED),
            })
        } else if f.contains(EventFlags::EVENT_IDS_WRAPPED) {
            EventKind::IdsWrapped
        } else if f.contains(EventFlags::ROOT_CHANGED) {
            EventKind::RootChanged
        } else if f.contains(EventFlags::MOUNT) {
            EventKind::Mount
        } else if f.contains(EventFlags::UNMOUNT) {
            EventKind::Unmount
        } else {
            EventKind::Change
        }
    }

    pub fn anomaly(&self) -> Option<DeliveryAnomaly> {
        match self.kind() {
            EventKind::Rescan(anomaly) => Some(anomaly),
            _ => None,
        }
    }

    pub fn is_history_done(&self) -> bool {
        self.flags.contains(EventFlags::HISTORY_DONE)
    }

    pub fn is_root_changed(&self) -> bool {
        self.flags.contains(EventFlags::ROOT_CHANGED)
    }
}

impl fmt::Display for DecodedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {} {}", self.id, self.path.display(), self.flags)
    }
}
