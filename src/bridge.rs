// src/bridge.rs

//! The single process-wide callback entry point and its token registry.
//!
//! Every native stream is created with the same C callback,
//! [`fsevents_callback`], and an opaque integer [`ContextToken`] as its
//! context. The registry maps tokens back to the owning stream's event
//! sender. Rules:
//!
//! - a token is registered before the native resource exists and removed
//!   only after the resource is released;
//! - tokens come from a monotonic counter and are never reused;
//! - lookup and handoff run under the registry lock, decoding does not.
//!
//! Stopping a stream detaches its sender under the same lock, so once
//! `detach` returns, no further events for that token can be enqueued.

use std::collections::HashMap;
use std::ffi::{c_char, c_void};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, LazyLock, Mutex, MutexGuard, PoisonError};

use tracing::{debug, error, warn};

use crate::channel::EventSender;
use crate::event::{DecodedEvent, RawEvent};
use crate::flags::EventFlags;
use crate::marshal::from_native_string;
use crate::types::EventId;

/// Opaque integer passed through the native layer to identify a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextToken(usize);

impl ContextToken {
    pub fn from_raw(raw: usize) -> Self {
        ContextToken(raw)
    }

    pub fn as_raw(self) -> usize {
        self.0
    }

    /// The `info` pointer handed to the native create call. It is never
    /// dereferenced.
    pub fn as_info(self) -> *mut c_void {
        self.0 as *mut c_void
    }
}

impl fmt::Display for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Producer-side bookkeeping for resume points.
#[derive(Debug, Default)]
pub(crate) struct Progress {
    last_id: AtomicU64,
    wrapped: AtomicBool,
}

impl Progress {
    fn observe(&self, batch: &[DecodedEvent]) {
        for event in batch {
            if event.flags.contains(EventFlags::EVENT_IDS_WRAPPED) {
                warn!(id = %event.id, "event ids wrapped; stored resume points are invalid");
                self.wrapped.store(true, Ordering::Release);
                self.last_id.store(event.id.get(), Ordering::Release);
                continue;
            }
            // RootChanged sentinels carry id 0.
            if event.id.get() == 0 {
                continue;
            }
            let prev = self.last_id.fetch_max(event.id.get(), Ordering::AcqRel);
            if event.id.get() < prev && !self.wrapped.load(Ordering::Acquire) {
                warn!(id = %event.id, previous = prev, "event id went backwards");
            }
        }
    }

    /// Highest id delivered so far, unless the counter wrapped.
    pub(crate) fn resume_point(&self) -> Option<EventId> {
        if self.wrapped.load(Ordering::Acquire) {
            return None;
        }
        match self.last_id.load(Ordering::Acquire) {
            0 => None,
            id => Some(EventId(id)),
        }
    }
}

struct Route {
    sender: Option<EventSender>,
    progress: Arc<Progress>,
}

static NEXT_TOKEN: AtomicUsize = AtomicUsize::new(1);
static UNRESOLVED: AtomicU64 = AtomicU64::new(0);
static ROUTES: LazyLock<Mutex<HashMap<ContextToken, Route>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn routes() -> MutexGuard<'static, HashMap<ContextToken, Route>> {
    // A panic elsewhere must not take event delivery down with it.
    ROUTES.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Allocate a fresh token and route it to `sender`.
pub(crate) fn register(sender: EventSender, progress: Arc<Progress>) -> ContextToken {
    let token = ContextToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed));
    routes().insert(
        token,
        Route {
            sender: Some(sender),
            progress,
        },
    );
    debug!(%token, "registered context token");
    token
}

/// Stop routing events for `token` while keeping it registered. Dropping
/// the sender ends the consumer's sequence once it is drained.
pub(crate) fn detach(token: ContextToken) -> bool {
    match routes().get_mut(&token) {
        Some(route) => route.sender.take().is_some(),
        None => false,
    }
}

/// Remove `token` from the registry. Only valid once no callback for it can
/// be in flight.
pub(crate) fn deregister(token: ContextToken) -> bool {
    let removed = routes().remove(&token).is_some();
    debug!(%token, removed, "deregistered context token");
    removed
}

pub fn is_registered(token: ContextToken) -> bool {
    routes().contains_key(&token)
}

/// Number of callback batches dropped because their token was unknown.
pub fn unresolved_deliveries() -> u64 {
    UNRESOLVED.load(Ordering::Relaxed)
}

enum Handoff {
    Unresolved,
    Detached,
    ConsumerGone,
    Delivered,
}

/// Forward one decoded batch, in order, to the stream owning `token`.
/// Returns the number of events enqueued.
///
/// The stream's resume point is advanced under the registry lock before
/// the batch is handed over, so a consumer never sees an event that the
/// resume point does not yet cover.
pub(crate) fn forward(token: ContextToken, batch: Vec<DecodedEvent>) -> usize {
    let count = batch.len();
    let handoff = {
        let routes = routes();
        match routes.get(&token) {
            None => Handoff::Unresolved,
            Some(Route { sender: None, .. }) => Handoff::Detached,
            Some(Route {
                sender: Some(sender),
                progress,
            }) => {
                progress.observe(&batch);
                if batch.into_iter().all(|event| sender.send(event).is_ok()) {
                    Handoff::Delivered
                } else {
                    Handoff::ConsumerGone
                }
            }
        }
    };

    match handoff {
        Handoff::Unresolved => {
            UNRESOLVED.fetch_add(1, Ordering::Relaxed);
            error!(%token, dropped = count, "callback for unregistered context token; batch dropped");
            0
        }
        Handoff::Detached => {
            debug!(%token, dropped = count, "stream no longer started; discarding late batch");
            0
        }
        Handoff::ConsumerGone => {
            debug!(%token, "event consumer went away; discarding batch");
            0
        }
        Handoff::Delivered => {
            debug!(%token, count, "forwarded batch");
            count
        }
    }
}

/// Decode parallel native arrays into events, preserving array order.
///
/// # Safety
///
/// `paths`, `flags` and `ids` must each point to `count` valid elements, and
/// every non-null path must be a NUL-terminated string.
pub(crate) unsafe fn decode_batch(
    count: usize,
    paths: *const *const c_char,
    flags: *const u32,
    ids: *const u64,
) -> Vec<DecodedEvent> {
    let paths = unsafe { std::slice::from_raw_parts(paths, count) };
    let flags = unsafe { std::slice::from_raw_parts(flags, count) };
    let ids = unsafe { std::slice::from_raw_parts(ids, count) };

    paths
        .iter()
        .zip(flags)
        .zip(ids)
        .map(|((&path, &flags), &id)| {
            RawEvent {
                path: unsafe { from_native_string(path) },
                flags,
                id: EventId(id),
            }
            .decode()
        })
        .collect()
}

/// The callback registered with every native stream.
///
/// Signature matches `FSEventStreamCallback` for streams created without
/// `kFSEventStreamCreateFlagUseCFTypes`: `event_paths` is a `char **`.
///
/// # Safety
///
/// Called by the native service with `num_events` valid entries in each of
/// `event_paths`, `event_flags` and `event_ids`.
pub unsafe extern "C" fn fsevents_callback(
    _stream: *const c_void,
    info: *mut c_void,
    num_events: usize,
    event_paths: *mut c_void,
    event_flags: *const u32,
    event_ids: *const u64,
) {
    let token = ContextToken(info as usize);
    if num_events == 0 {
        return;
    }
    if event_paths.is_null() || event_flags.is_null() || event_ids.is_null() {
        UNRESOLVED.fetch_add(1, Ordering::Relaxed);
        error!(%token, num_events, "native callback delivered null event arrays");
        return;
    }

    let batch = unsafe {
        decode_batch(
            num_events,
            event_paths as *const *const c_char,
            event_flags,
            event_ids,
        )
    };
    forward(token, batch);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::event_channel;
    use std::ffi::CString;

    fn decoded(path: &str, flags: EventFlags, id: u64) -> DecodedEvent {
        RawEvent::new(path, flags, id).decode()
    }

    #[test]
    fn tokens_are_never_reused() {
        let (tx, _rx) = event_channel();
        let a = register(tx.clone(), Arc::default());
        assert!(deregister(a));
        let b = register(tx, Arc::default());
        assert!(b > a);
        assert!(deregister(b));
    }

    #[test]
    fn callback_decodes_parallel_arrays_in_order() {
        let (tx, mut events) = event_channel();
        let token = register(tx, Arc::default());

        let paths: Vec<CString> = ["/a/one", "/a/two"]
            .iter()
            .map(|p| CString::new(*p).unwrap())
            .collect();
        let ptrs: Vec<*const c_char> = paths.iter().map(|p| p.as_ptr()).collect();
        let flags = [
            EventFlags::ITEM_CREATED.bits(),
            EventFlags::ITEM_REMOVED.bits(),
        ];
        let ids = [10u64, 11];

        unsafe {
            fsevents_callback(
                std::ptr::null(),
                token.as_info(),
                2,
                ptrs.as_ptr() as *mut c_void,
                flags.as_ptr(),
                ids.as_ptr(),
            );
        }

        let first = events.try_recv().unwrap();
        let second = events.try_recv().unwrap();
        assert_eq!(first, decoded("/a/one", EventFlags::ITEM_CREATED, 10));
        assert_eq!(second, decoded("/a/two", EventFlags::ITEM_REMOVED, 11));
        assert!(events.try_recv().is_none());
        deregister(token);
    }

    #[test]
    fn unknown_token_is_counted_and_dropped() {
        let before = unresolved_deliveries();
        let forged = ContextToken(usize::MAX - 7);
        let n = forward(forged, vec![decoded("/x", EventFlags::ITEM_MODIFIED, 1)]);
        assert_eq!(n, 0);
        assert!(unresolved_deliveries() > before);
    }

    #[test]
    fn detached_route_drops_late_batches_and_closes_sequence() {
        let (tx, mut events) = event_channel();
        let token = register(tx, Arc::default());
        assert!(detach(token));
        assert!(!detach(token));

        let n = forward(token, vec![decoded("/late", EventFlags::ITEM_MODIFIED, 3)]);
        assert_eq!(n, 0);
        assert!(is_registered(token));
        assert!(events.blocking_recv().is_none());
        deregister(token);
    }

    #[test]
    fn progress_covers_an_event_as_soon_as_it_is_received() {
        let (tx, mut events) = event_channel();
        let progress = Arc::new(Progress::default());
        let token = register(tx, Arc::clone(&progress));

        let producer = std::thread::spawn(move || {
            for id in 1..=500u64 {
                forward(token, vec![decoded("/p", EventFlags::ITEM_MODIFIED, id)]);
            }
        });
        for id in 1..=500u64 {
            let event = events.blocking_recv().unwrap();
            assert_eq!(event.id, EventId(id));
            assert!(progress.resume_point() >= Some(EventId(id)));
        }
        producer.join().unwrap();
        deregister(token);
    }

    #[test]
    fn wrap_invalidates_resume_point() {
        let progress = Progress::default();
        progress.observe(&[decoded("/a", EventFlags::ITEM_MODIFIED, 40)]);
        assert_eq!(progress.resume_point(), Some(EventId(40)));

        progress.observe(&[decoded("/a", EventFlags::ROOT_CHANGED, 0)]);
        assert_eq!(progress.resume_point(), Some(EventId(40)));

        progress.observe(&[decoded("/", EventFlags::EVENT_IDS_WRAPPED, 2)]);
        assert_eq!(progress.resume_point(), None);
    }
}
