// src/native/mod.rs

//! Boundary to the native change-notification service.
//!
//! The stream layer talks to a [`NativeService`] instead of calling FSEvents
//! directly. This keeps the lifecycle and bridge logic testable on any host:
//!
//! - [`macos::CoreServices`] (macOS only) drives the real FSEvents API.
//! - [`sim::SimulatedService`] is an in-process journal that emits flagged
//!   path events through the same C callback the real service uses.

use std::ffi::c_void;
use std::fmt::Debug;
use std::time::SystemTime;

use crate::bridge::ContextToken;
use crate::marshal::PathArray;
use crate::types::{DeviceId, DispatchQueue, EventId};

pub mod sim;

#[cfg(target_os = "macos")]
pub mod macos;
#[cfg(target_os = "macos")]
mod sys;

/// C callback signature shared by every native stream.
pub type NativeCallback = unsafe extern "C" fn(
    stream: *const c_void,
    info: *mut c_void,
    num_events: usize,
    event_paths: *mut c_void,
    event_flags: *const u32,
    event_ids: *const u64,
);

/// Opaque, non-null reference to a native stream resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NativeStreamRef(usize);

impl NativeStreamRef {
    /// `None` for a null resource.
    pub fn from_raw(raw: usize) -> Option<Self> {
        (raw != 0).then_some(NativeStreamRef(raw))
    }

    pub fn as_raw(self) -> usize {
        self.0
    }
}

/// Arguments of the native create call.
#[derive(Debug)]
pub struct CreateParams<'a> {
    pub flags: u32,
    pub paths: &'a PathArray,
    /// When set, `paths` are rooted at this device's mount point.
    pub device: Option<DeviceId>,
    /// Native start id; `u64::MAX` means "since now".
    pub since_when: u64,
    pub latency_secs: f64,
    pub callback: NativeCallback,
    pub token: ContextToken,
}

/// The native notification service.
///
/// Calls for one stream are issued in lifecycle order by
/// [`crate::stream::Stream`]; implementations may assume
/// `create -> set_dispatch_queue -> start -> stop -> invalidate -> release`
/// and must serialize callbacks for one stream.
pub trait NativeService: Send + Sync + Debug {
    /// Allocate a stream. `None` mirrors a null `FSEventStreamRef`.
    fn create(&self, params: &CreateParams<'_>) -> Option<NativeStreamRef>;

    fn set_dispatch_queue(&self, stream: NativeStreamRef, queue: &DispatchQueue);

    /// Begin delivery. `false` if the service refused.
    fn start(&self, stream: NativeStreamRef) -> bool;

    fn stop(&self, stream: NativeStreamRef);

    /// Detach from the scheduling target. No callback runs after this returns.
    fn invalidate(&self, stream: NativeStreamRef);

    fn release(&self, stream: NativeStreamRef);

    /// Deliver buffered events and wait until the callback has run.
    fn flush_sync(&self, stream: NativeStreamRef);

    /// Request delivery of buffered events; returns the id of the last one.
    fn flush_async(&self, stream: NativeStreamRef) -> EventId;

    /// Id of the last event delivered to this stream's callback.
    fn latest_event_id(&self, stream: NativeStreamRef) -> EventId;

    /// Most recent id the service has issued on any device.
    fn current_event_id(&self) -> EventId;

    /// UUID of the event journal for `device`; `None` if it has none.
    fn device_uuid(&self, device: DeviceId) -> Option<String>;

    /// Last id issued on `device` before `time`.
    fn last_event_id_before(&self, device: DeviceId, time: SystemTime) -> EventId;
}

/// The platform's real notification service.
#[cfg(target_os = "macos")]
pub fn default_service() -> std::sync::Arc<dyn NativeService> {
    std::sync::Arc::new(macos::CoreServices::new())
}

/// Most recent event id issued by `service`.
pub fn current_event_id(service: &dyn NativeService) -> EventId {
    service.current_event_id()
}

/// UUID identifying `device`'s event journal. A changed UUID means stored
/// event ids for that device are no longer meaningful.
pub fn device_uuid(service: &dyn NativeService, device: DeviceId) -> Option<String> {
    service.device_uuid(device)
}

/// Id to resume from to see everything on `device` since `time`.
pub fn last_event_id_before(
    service: &dyn NativeService,
    device: DeviceId,
    time: SystemTime,
) -> EventId {
    service.last_event_id_before(device, time)
}
