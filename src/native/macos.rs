// src/native/macos.rs

//! [`NativeService`] backed by the real FSEvents API.

use std::collections::HashMap;
use std::ffi::CString;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use core_foundation::base::{kCFAllocatorDefault, CFRelease, TCFType};
use core_foundation::string::CFString;
use tracing::{debug, warn};

use super::sys;
use super::{CreateParams, NativeService, NativeStreamRef};
use crate::types::{DeviceId, DispatchQueue, EventId};

/// Seconds between the Unix epoch and the CoreFoundation epoch (2001-01-01).
const CF_EPOCH_OFFSET: f64 = 978_307_200.0;

/// Drives `FSEventStream*` calls. Owns the dispatch queues it creates until
/// the stream they serve is invalidated.
#[derive(Debug, Default)]
pub struct CoreServices {
    // stream ref -> dispatch_queue_t, both kept as addresses
    queues: Mutex<HashMap<usize, usize>>,
}

impl CoreServices {
    pub fn new() -> Self {
        Self::default()
    }

    fn queues(&self) -> MutexGuard<'_, HashMap<usize, usize>> {
        self.queues.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn raw(stream: NativeStreamRef) -> sys::FSEventStreamRef {
    stream.as_raw() as sys::FSEventStreamRef
}

impl NativeService for CoreServices {
    fn create(&self, params: &CreateParams<'_>) -> Option<NativeStreamRef> {
        let paths = params.paths.to_cf_array();
        // Only `info` is used; the token is an integer and needs no retain/release.
        let context = sys::FSEventStreamContext {
            version: 0,
            info: params.token.as_info(),
            retain: None,
            release: None,
            copy_description: None,
        };

        // SAFETY: `context` and `paths` outlive the call; the service copies both.
        let stream = unsafe {
            match params.device {
                Some(device) => sys::FSEventStreamCreateRelativeToDevice(
                    kCFAllocatorDefault,
                    params.callback,
                    &context,
                    device.0,
                    paths.as_concrete_TypeRef(),
                    params.since_when,
                    params.latency_secs,
                    params.flags,
                ),
                None => sys::FSEventStreamCreate(
                    kCFAllocatorDefault,
                    params.callback,
                    &context,
                    paths.as_concrete_TypeRef(),
                    params.since_when,
                    params.latency_secs,
                    params.flags,
                ),
            }
        };
        NativeStreamRef::from_raw(stream as usize)
    }

    fn set_dispatch_queue(&self, stream: NativeStreamRef, queue: &DispatchQueue) {
        let label = CString::new(queue.label()).unwrap_or_default();
        // SAFETY: `label` is copied by libdispatch; `stream` is live and unscheduled.
        let handle = unsafe {
            let handle = sys::dispatch_queue_create(label.as_ptr(), sys::DISPATCH_QUEUE_SERIAL);
            sys::FSEventStreamSetDispatchQueue(raw(stream), handle);
            handle
        };
        if let Some(previous) = self.queues().insert(stream.as_raw(), handle as usize) {
            warn!(stream = stream.as_raw(), "stream rescheduled; releasing previous queue");
            // SAFETY: we created `previous` and the stream no longer refers to it.
            unsafe { sys::dispatch_release(previous as *mut _) };
        }
        debug!(stream = stream.as_raw(), queue = queue.label(), "scheduled on dispatch queue");
    }

    fn start(&self, stream: NativeStreamRef) -> bool {
        // SAFETY: live, scheduled stream.
        unsafe { sys::FSEventStreamStart(raw(stream)) != 0 }
    }

    fn stop(&self, stream: NativeStreamRef) {
        // SAFETY: live stream.
        unsafe { sys::FSEventStreamStop(raw(stream)) }
    }

    fn invalidate(&self, stream: NativeStreamRef) {
        // SAFETY: live stream.
        unsafe { sys::FSEventStreamInvalidate(raw(stream)) }
        if let Some(queue) = self.queues().remove(&stream.as_raw()) {
            // SAFETY: the stream was detached from `queue` by the invalidate above.
            unsafe { sys::dispatch_release(queue as *mut _) };
        }
    }

    fn release(&self, stream: NativeStreamRef) {
        // SAFETY: live, invalidated stream; never used again afterwards.
        unsafe { sys::FSEventStreamRelease(raw(stream)) }
    }

    fn flush_sync(&self, stream: NativeStreamRef) {
        // SAFETY: live, started stream.
        unsafe { sys::FSEventStreamFlushSync(raw(stream)) }
    }

    fn flush_async(&self, stream: NativeStreamRef) -> EventId {
        // SAFETY: live, started stream.
        EventId(unsafe { sys::FSEventStreamFlushAsync(raw(stream)) })
    }

    fn latest_event_id(&self, stream: NativeStreamRef) -> EventId {
        // SAFETY: live stream.
        EventId(unsafe { sys::FSEventStreamGetLatestEventId(raw(stream)) })
    }

    fn current_event_id(&self) -> EventId {
        // SAFETY: no arguments, no preconditions.
        EventId(unsafe { sys::FSEventsGetCurrentEventId() })
    }

    fn device_uuid(&self, device: DeviceId) -> Option<String> {
        // SAFETY: a null result means the device has no journal; both
        // returned objects follow the create rule and are released here.
        unsafe {
            let uuid = sys::FSEventsCopyUUIDForDevice(device.0);
            if uuid.is_null() {
                return None;
            }
            let text = sys::CFUUIDCreateString(kCFAllocatorDefault, uuid);
            CFRelease(uuid);
            if text.is_null() {
                return None;
            }
            Some(CFString::wrap_under_create_rule(text).to_string())
        }
    }

    fn last_event_id_before(&self, device: DeviceId, time: SystemTime) -> EventId {
        let unix = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => after.as_secs_f64(),
            Err(before) => -before.duration().as_secs_f64(),
        };
        // SAFETY: plain value arguments.
        EventId(unsafe {
            sys::FSEventsGetLastEventIdForDeviceBeforeTime(device.0, unix - CF_EPOCH_OFFSET)
        })
    }
}
