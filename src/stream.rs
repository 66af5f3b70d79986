// src/stream.rs

//! The stream handle and its lifecycle state machine.
//!
//! A [`Stream`] owns exactly one native stream resource, the scheduling
//! target it is attached to and the context token that routes callbacks
//! back to it. Native calls are only issued in the order
//! `create -> schedule -> start -> stop -> invalidate -> release`; anything
//! else is rejected with a [`StateError`] before it reaches the service.
//!
//! All operations take `&self`, so a stream can be shared across threads and
//! stopped from any of them.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info};

use crate::bridge::{self, ContextToken, Progress};
use crate::channel::{event_channel, Events};
use crate::errors::{CreationError, FsEventError, Result, StateError};
use crate::flags::{self, CreateFlags};
use crate::marshal::to_native_array;
use crate::native::{CreateParams, NativeService, NativeStreamRef};
use crate::types::{
    CreateOptions, DeviceId, DispatchQueue, EventId, StreamState, WatchTarget,
};

#[derive(Debug)]
struct Lifecycle {
    state: StreamState,
    queue: Option<DispatchQueue>,
}

/// Handle to one native event stream.
#[derive(Debug)]
pub struct Stream {
    service: Arc<dyn NativeService>,
    target: WatchTarget,
    options: CreateOptions,
    token: ContextToken,
    native: NativeStreamRef,
    lifecycle: Mutex<Lifecycle>,
    events: Mutex<Option<Events>>,
    progress: Arc<Progress>,
}

impl Stream {
    /// Create a stream on the platform's native service.
    #[cfg(target_os = "macos")]
    pub fn new(target: WatchTarget, options: CreateOptions) -> Result<Stream> {
        Self::with_service(crate::native::default_service(), target, options)
    }

    /// Create a stream on `service`. The stream starts out `Unstarted`.
    ///
    /// The context token is registered before the native resource exists
    /// and is removed again if creation fails.
    pub fn with_service(
        service: Arc<dyn NativeService>,
        target: WatchTarget,
        options: CreateOptions,
    ) -> Result<Stream> {
        check_creatable(&target, &options)?;
        let paths = to_native_array(target.native_paths())?;

        let (sender, events) = event_channel();
        let progress = Arc::new(Progress::default());
        let token = bridge::register(sender, Arc::clone(&progress));

        let params = CreateParams {
            flags: flags::encode(&options),
            paths: &paths,
            device: target.device_id(),
            since_when: options.start.to_native(),
            latency_secs: options.latency_secs(),
            callback: bridge::fsevents_callback,
            token,
        };
        let Some(native) = service.create(&params) else {
            bridge::deregister(token);
            return Err(CreationError::Refused(target.to_string()).into());
        };
        debug!(%token, native = native.as_raw(), %target, "stream created");

        Ok(Stream {
            service,
            target,
            options,
            token,
            native,
            lifecycle: Mutex::new(Lifecycle {
                state: StreamState::Unstarted,
                queue: None,
            }),
            events: Mutex::new(Some(events)),
            progress,
        })
    }

    fn lifecycle(&self) -> MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach the scheduling target callbacks will run on.
    pub fn schedule(&self, queue: DispatchQueue) -> std::result::Result<(), StateError> {
        let mut lc = self.lifecycle();
        if lc.state != StreamState::Unstarted {
            return Err(StateError::InvalidTransition {
                op: "schedule",
                state: lc.state,
            });
        }
        if let Some(existing) = &lc.queue {
            return Err(StateError::AlreadyScheduled(existing.label().to_string()));
        }
        self.service.set_dispatch_queue(self.native, &queue);
        debug!(token = %self.token, queue = queue.label(), "stream scheduled");
        lc.queue = Some(queue);
        Ok(())
    }

    pub fn start(&self) -> Result<()> {
        let mut lc = self.lifecycle();
        if lc.state != StreamState::Unstarted {
            return Err(StateError::InvalidTransition {
                op: "start",
                state: lc.state,
            }
            .into());
        }
        if lc.queue.is_none() {
            return Err(StateError::NotScheduled.into());
        }
        if !self.service.start(self.native) {
            return Err(FsEventError::StartFailed(self.target.to_string()));
        }
        lc.state = StreamState::Started;
        info!(token = %self.token, target = %self.target, "stream started");
        Ok(())
    }

    /// Stop delivery. Once this returns no further events for this stream
    /// are enqueued; events already enqueued can still be drained.
    ///
    /// Stopping a stopped stream does nothing.
    pub fn stop(&self) -> std::result::Result<(), StateError> {
        let mut lc = self.lifecycle();
        match lc.state {
            StreamState::Started => {}
            StreamState::Stopped => return Ok(()),
            state => return Err(StateError::InvalidTransition { op: "stop", state }),
        }
        self.service.stop(self.native);
        bridge::detach(self.token);
        lc.state = StreamState::Stopped;
        debug!(token = %self.token, "stream stopped");
        Ok(())
    }

    /// Detach from the scheduling target.
    pub fn invalidate(&self) -> std::result::Result<(), StateError> {
        let mut lc = self.lifecycle();
        if lc.state != StreamState::Stopped {
            return Err(StateError::InvalidTransition {
                op: "invalidate",
                state: lc.state,
            });
        }
        self.service.invalidate(self.native);
        lc.queue = None;
        lc.state = StreamState::Invalidated;
        debug!(token = %self.token, "stream invalidated");
        Ok(())
    }

    /// Free the native resource and retire the context token.
    ///
    /// # Panics
    ///
    /// If the resource was already released.
    pub fn release(&self) -> std::result::Result<(), StateError> {
        let mut lc = self.lifecycle();
        match lc.state {
            StreamState::Invalidated => {}
            StreamState::Released => {
                panic!("stream {} released twice", self.token);
            }
            state => return Err(StateError::InvalidTransition { op: "release", state }),
        }
        self.release_locked(&mut lc);
        Ok(())
    }

    fn release_locked(&self, lc: &mut Lifecycle) {
        self.service.release(self.native);
        bridge::deregister(self.token);
        lc.state = StreamState::Released;
        debug!(token = %self.token, "stream released");
    }

    /// Push out events held back by the latency window.
    ///
    /// A synchronous flush returns once the callback for those events has
    /// run; an asynchronous one only requests delivery.
    pub fn flush(&self, synchronous: bool) -> std::result::Result<(), StateError> {
        let lc = self.lifecycle();
        if lc.state != StreamState::Started {
            return Err(StateError::InvalidTransition {
                op: "flush",
                state: lc.state,
            });
        }
        if synchronous {
            self.service.flush_sync(self.native);
        } else {
            let last = self.service.flush_async(self.native);
            debug!(token = %self.token, last = %last, "asynchronous flush requested");
        }
        Ok(())
    }

    /// Take the read end of this stream's event sequence. Only the first
    /// call succeeds.
    pub fn events(&self) -> std::result::Result<Events, StateError> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or(StateError::EventsTaken)
    }

    /// Id of the last event the native service delivered for this stream.
    pub fn latest_event_id(&self) -> std::result::Result<EventId, StateError> {
        let lc = self.lifecycle();
        if lc.state == StreamState::Released {
            return Err(StateError::InvalidTransition {
                op: "query",
                state: lc.state,
            });
        }
        Ok(self.service.latest_event_id(self.native))
    }

    /// Highest event id delivered so far, suitable for resuming a later
    /// stream. `None` before the first event and after the id counter
    /// wrapped.
    pub fn resume_point(&self) -> Option<EventId> {
        self.progress.resume_point()
    }

    pub fn device_being_watched(&self) -> Option<DeviceId> {
        self.target.device_id()
    }

    pub fn paths_being_watched(&self) -> Vec<PathBuf> {
        self.target.native_paths()
    }

    pub fn state(&self) -> StreamState {
        self.lifecycle().state
    }

    pub fn queue_label(&self) -> Option<String> {
        self.lifecycle()
            .queue
            .as_ref()
            .map(|q| q.label().to_string())
    }

    pub fn target(&self) -> &WatchTarget {
        &self.target
    }

    pub fn options(&self) -> &CreateOptions {
        &self.options
    }

    pub fn token(&self) -> ContextToken {
        self.token
    }

    pub fn native_ref(&self) -> NativeStreamRef {
        self.native
    }

    /// Stop if needed, then invalidate and release.
    ///
    /// # Panics
    ///
    /// If the resource was already released through [`Stream::release`].
    pub fn close(self) {
        if self.state() == StreamState::Released {
            panic!("stream {} closed after its resource was released", self.token);
        }
        self.teardown();
    }

    /// Walk the remaining lifecycle steps from whatever state the stream is in.
    fn teardown(&self) {
        let mut lc = self.lifecycle();
        if lc.state == StreamState::Released {
            return;
        }
        if lc.state == StreamState::Started {
            self.service.stop(self.native);
            lc.state = StreamState::Stopped;
        }
        bridge::detach(self.token);
        if lc.queue.take().is_some() {
            self.service.invalidate(self.native);
        }
        lc.state = StreamState::Invalidated;
        self.release_locked(&mut lc);
    }
}

impl Drop for Stream {
    fn drop(&mut self) {
        self.teardown();
    }
}

fn check_creatable(
    target: &WatchTarget,
    options: &CreateOptions,
) -> std::result::Result<(), CreationError> {
    // Device paths are rooted at the device, so they are absolute too.
    let paths = match target {
        WatchTarget::Paths(paths) if paths.is_empty() => return Err(CreationError::EmptyTarget),
        WatchTarget::Paths(paths) | WatchTarget::Device { paths, .. } => paths,
    };
    if let Some(relative) = paths.iter().find(|p| !p.is_absolute()) {
        return Err(CreationError::RelativePath(relative.clone()));
    }
    let unsupported = options.flags - CreateFlags::SUPPORTED;
    if !unsupported.is_empty() {
        return Err(CreationError::UnsupportedFlags(unsupported.bits()));
    }
    Ok(())
}

/// Create a stream, schedule it on a private serial queue and start it.
pub fn watch(
    service: Arc<dyn NativeService>,
    target: WatchTarget,
    options: CreateOptions,
) -> Result<(Stream, Events)> {
    let stream = Stream::with_service(service, target, options)?;
    let events = stream.events()?;
    let label = format!("fsevents.stream{}", stream.token().as_raw());
    stream.schedule(DispatchQueue::new(label))?;
    stream.start()?;
    Ok((stream, events))
}
