// src/native/sim.rs

//! In-process stand-in for the native notification service.
//!
//! `SimulatedService` keeps its own change journal and behaves like the
//! kernel side of FSEvents as seen through the stream API:
//!
//! - every recorded change gets the next event id;
//! - each scheduling target is one worker thread, so callbacks for a stream
//!   are serialized;
//! - callbacks go through the real C entry point with raw `char **` /
//!   flag / id arrays;
//! - with a non-zero latency and no `NO_DEFER`, live events are buffered
//!   until a flush or [`SimulatedService::expire_latency`];
//! - starting from a past id replays the journal, then sends one
//!   `HISTORY_DONE` sentinel;
//! - without `FILE_EVENTS`, changes are reported against their parent
//!   directory with item-level flags stripped.
//!
//! Test hooks let callers inject raw batches, forge context tokens and make
//! the next create fail.

use std::collections::{HashMap, HashSet};
use std::ffi::{c_char, c_void, CString};
use std::path::{Path, PathBuf};
use std::sync::mpsc as std_mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use tracing::{debug, error, warn};

use super::{CreateParams, NativeCallback, NativeService, NativeStreamRef};
use crate::bridge::ContextToken;
use crate::event::RawEvent;
use crate::flags::{self, CreateFlags, EventFlags};
use crate::types::{DeviceId, DispatchQueue, EventId};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// A serial queue backed by one worker thread.
#[derive(Debug)]
struct SimQueue {
    label: String,
    jobs: Option<std_mpsc::Sender<Job>>,
    worker: Option<JoinHandle<()>>,
}

impl SimQueue {
    fn spawn(label: &str) -> Self {
        let (tx, rx) = std_mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                for job in rx {
                    job();
                }
            });
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                error!(queue = label, error = %err, "failed to spawn queue worker");
                None
            }
        };
        Self {
            label: label.to_string(),
            jobs: Some(tx),
            worker,
        }
    }

    fn submit(&self, job: Job) -> bool {
        match (&self.jobs, &self.worker) {
            (Some(tx), Some(_)) => tx.send(job).is_ok(),
            _ => false,
        }
    }
}

impl Drop for SimQueue {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain what is queued and exit.
        self.jobs.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == thread::current().id() {
                return;
            }
            if worker.join().is_err() {
                error!(queue = %self.label, "queue worker panicked");
            }
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    id: u64,
    path: PathBuf,
    flags: EventFlags,
    at: SystemTime,
}

#[derive(Debug)]
struct SimStream {
    callback: NativeCallback,
    token: ContextToken,
    flags: CreateFlags,
    since_when: u64,
    defers: bool,
    device: Option<DeviceId>,
    // Device paths are rooted at the device; the journal has one namespace,
    // so they match journal paths as-is.
    paths: Vec<PathBuf>,
    queue: Option<SimQueue>,
    started: bool,
    pending: Vec<RawEvent>,
    latest: u64,
}

impl SimStream {
    /// How `entry` looks to this stream, if it sees it at all.
    fn view(&self, entry: &Entry) -> Option<RawEvent> {
        if !self.paths.iter().any(|root| entry.path.starts_with(root)) {
            return None;
        }
        if self.flags.contains(CreateFlags::FILE_EVENTS) {
            return Some(RawEvent {
                path: entry.path.to_string_lossy().into_owned(),
                flags: entry.flags.bits(),
                id: EventId(entry.id),
            });
        }
        let dir = entry.path.parent().unwrap_or(&entry.path);
        Some(RawEvent {
            path: dir.to_string_lossy().into_owned(),
            flags: (entry.flags - EventFlags::ITEM_LEVEL).bits(),
            id: EventId(entry.id),
        })
    }

    /// Queue `batch` for delivery on this stream's worker.
    fn dispatch(
        &mut self,
        stream_ref: usize,
        token: ContextToken,
        batch: Vec<RawEvent>,
        ack: Option<std_mpsc::Sender<()>>,
    ) -> bool {
        let Some(queue) = self.queue.as_ref() else {
            return false;
        };
        if let Some(last) = batch.iter().map(|e| e.id.get()).filter(|&id| id != 0).max() {
            self.latest = self.latest.max(last);
        }
        let callback = self.callback;
        queue.submit(Box::new(move || {
            invoke(callback, stream_ref, token, &batch);
            if let Some(ack) = ack {
                let _ = ack.send(());
            }
        }))
    }
}

/// Call `callback` the way the native service does: three parallel C
/// arrays that live only for the duration of the call.
fn invoke(callback: NativeCallback, stream_ref: usize, token: ContextToken, batch: &[RawEvent]) {
    if batch.is_empty() {
        return;
    }
    let paths: Vec<CString> = batch
        .iter()
        .map(|e| CString::new(e.path.as_str()).unwrap_or_default())
        .collect();
    let ptrs: Vec<*const c_char> = paths.iter().map(|p| p.as_ptr()).collect();
    let flags: Vec<u32> = batch.iter().map(|e| e.flags).collect();
    let ids: Vec<u64> = batch.iter().map(|e| e.id.get()).collect();

    // SAFETY: all three arrays hold `batch.len()` elements and outlive the call.
    unsafe {
        callback(
            stream_ref as *const c_void,
            token.as_info(),
            batch.len(),
            ptrs.as_ptr() as *mut c_void,
            flags.as_ptr(),
            ids.as_ptr(),
        );
    }
}

#[derive(Debug, Default)]
struct SimState {
    next_ref: usize,
    last_event_id: u64,
    journal: Vec<Entry>,
    streams: HashMap<usize, SimStream>,
    released: HashSet<usize>,
    refuse_next_create: bool,
    device_uuids: HashMap<i32, String>,
}

/// Simulated native service. Cheap to clone; clones share one journal.
#[derive(Debug, Clone, Default)]
pub struct SimulatedService {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedService {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next `create` return a null resource.
    pub fn refuse_next_create(&self) {
        self.state().refuse_next_create = true;
    }

    pub fn set_device_uuid(&self, device: DeviceId, uuid: impl Into<String>) {
        self.state().device_uuids.insert(device.0, uuid.into());
    }

    /// Record one change in the journal and fan it out to started streams.
    pub fn record(&self, path: impl AsRef<Path>, flags: EventFlags) -> EventId {
        self.record_batch([(path, flags)])
            .pop()
            .unwrap_or_default()
    }

    /// Record several changes that each stream receives as a single batch.
    pub fn record_batch<I, P>(&self, changes: I) -> Vec<EventId>
    where
        I: IntoIterator<Item = (P, EventFlags)>,
        P: AsRef<Path>,
    {
        let mut state = self.state();
        let now = SystemTime::now();
        let mut entries = Vec::new();
        for (path, flags) in changes {
            state.last_event_id += 1;
            let entry = Entry {
                id: state.last_event_id,
                path: path.as_ref().to_path_buf(),
                flags,
                at: now,
            };
            state.journal.push(entry.clone());
            entries.push(entry);
        }

        for (&raw, stream) in state.streams.iter_mut() {
            if !stream.started {
                continue;
            }
            let batch: Vec<RawEvent> = entries.iter().filter_map(|e| stream.view(e)).collect();
            if batch.is_empty() {
                continue;
            }
            if stream.defers {
                stream.pending.extend(batch);
            } else {
                let token = stream.token;
                stream.dispatch(raw, token, batch, None);
            }
        }

        entries.into_iter().map(|e| EventId(e.id)).collect()
    }

    /// Deliver `batch` to a started stream exactly as given, bypassing the
    /// journal and the latency window.
    pub fn inject(&self, stream: NativeStreamRef, batch: Vec<RawEvent>) -> bool {
        let mut state = self.state();
        match state.streams.get_mut(&stream.as_raw()) {
            Some(s) if s.started => {
                let token = s.token;
                s.dispatch(stream.as_raw(), token, batch, None)
            }
            _ => {
                warn!(stream = stream.as_raw(), "inject into a stream that is not started");
                false
            }
        }
    }

    /// Like [`SimulatedService::inject`], but the callback receives `token`
    /// instead of the stream's own context.
    pub fn inject_with_token(
        &self,
        stream: NativeStreamRef,
        token: ContextToken,
        batch: Vec<RawEvent>,
    ) -> bool {
        let mut state = self.state();
        match state.streams.get_mut(&stream.as_raw()) {
            Some(s) if s.queue.is_some() => s.dispatch(stream.as_raw(), token, batch, None),
            _ => false,
        }
    }

    /// Fire the latency timer: deliver everything buffered for `stream`.
    pub fn expire_latency(&self, stream: NativeStreamRef) -> usize {
        let mut state = self.state();
        match state.streams.get_mut(&stream.as_raw()) {
            Some(s) if s.started && !s.pending.is_empty() => {
                let batch = std::mem::take(&mut s.pending);
                let count = batch.len();
                let token = s.token;
                s.dispatch(stream.as_raw(), token, batch, None);
                count
            }
            _ => 0,
        }
    }

    /// Events buffered by the latency window for `stream`.
    pub fn pending(&self, stream: NativeStreamRef) -> usize {
        self.state()
            .streams
            .get(&stream.as_raw())
            .map_or(0, |s| s.pending.len())
    }

    pub fn live_streams(&self) -> usize {
        self.state().streams.len()
    }

    pub fn is_released(&self, stream: NativeStreamRef) -> bool {
        self.state().released.contains(&stream.as_raw())
    }

    pub fn queue_label(&self, stream: NativeStreamRef) -> Option<String> {
        self.state()
            .streams
            .get(&stream.as_raw())
            .and_then(|s| s.queue.as_ref().map(|q| q.label.clone()))
    }

    pub fn device_of(&self, stream: NativeStreamRef) -> Option<DeviceId> {
        self.state()
            .streams
            .get(&stream.as_raw())
            .and_then(|s| s.device)
    }
}

impl NativeService for SimulatedService {
    fn create(&self, params: &CreateParams<'_>) -> Option<NativeStreamRef> {
        let mut state = self.state();
        if std::mem::take(&mut state.refuse_next_create) {
            debug!("simulated create refused");
            return None;
        }
        if params.paths.is_empty() {
            return None;
        }

        let flags = flags::decode_create(params.flags);
        state.next_ref += 1;
        let raw = state.next_ref;
        state.streams.insert(
            raw,
            SimStream {
                callback: params.callback,
                token: params.token,
                flags,
                since_when: params.since_when,
                defers: params.latency_secs > 0.0 && !flags.contains(CreateFlags::NO_DEFER),
                device: params.device,
                paths: params.paths.to_strings().into_iter().map(PathBuf::from).collect(),
                queue: None,
                started: false,
                pending: Vec::new(),
                latest: 0,
            },
        );
        debug!(stream = raw, token = %params.token, "simulated stream created");
        NativeStreamRef::from_raw(raw)
    }

    fn set_dispatch_queue(&self, stream: NativeStreamRef, queue: &DispatchQueue) {
        let mut state = self.state();
        if let Some(s) = state.streams.get_mut(&stream.as_raw()) {
            s.queue = Some(SimQueue::spawn(queue.label()));
        }
    }

    fn start(&self, stream: NativeStreamRef) -> bool {
        let mut state = self.state();
        let SimState {
            streams,
            journal,
            last_event_id,
            ..
        } = &mut *state;
        let Some(s) = streams.get_mut(&stream.as_raw()) else {
            return false;
        };
        if s.queue.is_none() || s.started {
            return false;
        }
        s.started = true;

        if s.since_when != EventId::SINCE_NOW.get() {
            let mut replay: Vec<RawEvent> = journal
                .iter()
                .filter(|e| e.id > s.since_when)
                .filter_map(|e| s.view(e))
                .collect();
            let sentinel_path = s
                .paths
                .first()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default();
            replay.push(RawEvent {
                path: sentinel_path,
                flags: EventFlags::HISTORY_DONE.bits(),
                id: EventId(*last_event_id),
            });
            debug!(stream = stream.as_raw(), replayed = replay.len() - 1, "replaying history");
            let token = s.token;
            s.dispatch(stream.as_raw(), token, replay, None);
        }
        true
    }

    fn stop(&self, stream: NativeStreamRef) {
        let mut state = self.state();
        if let Some(s) = state.streams.get_mut(&stream.as_raw()) {
            s.started = false;
            s.pending.clear();
        }
    }

    fn invalidate(&self, stream: NativeStreamRef) {
        let queue = {
            let mut state = self.state();
            state
                .streams
                .get_mut(&stream.as_raw())
                .and_then(|s| s.queue.take())
        };
        // Joins the worker, so nothing for this stream is in flight afterwards.
        drop(queue);
    }

    fn release(&self, stream: NativeStreamRef) {
        let removed = {
            let mut state = self.state();
            let removed = state.streams.remove(&stream.as_raw());
            if removed.is_some() {
                state.released.insert(stream.as_raw());
            }
            removed
        };
        if removed.is_none() {
            // The real service would be touching freed memory here.
            panic!("release of unknown or already released native stream {}", stream.as_raw());
        }
    }

    fn flush_sync(&self, stream: NativeStreamRef) {
        let (tx, rx) = std_mpsc::channel();
        let submitted = {
            let mut state = self.state();
            match state.streams.get_mut(&stream.as_raw()) {
                Some(s) if s.started => {
                    let batch = std::mem::take(&mut s.pending);
                    let token = s.token;
                    s.dispatch(stream.as_raw(), token, batch, Some(tx))
                }
                _ => false,
            }
        };
        if submitted {
            let _ = rx.recv();
        }
    }

    fn flush_async(&self, stream: NativeStreamRef) -> EventId {
        let mut state = self.state();
        match state.streams.get_mut(&stream.as_raw()) {
            Some(s) if s.started => {
                let batch = std::mem::take(&mut s.pending);
                let token = s.token;
                s.dispatch(stream.as_raw(), token, batch, None);
                EventId(s.latest)
            }
            _ => EventId::default(),
        }
    }

    fn latest_event_id(&self, stream: NativeStreamRef) -> EventId {
        EventId(
            self.state()
                .streams
                .get(&stream.as_raw())
                .map_or(0, |s| s.latest),
        )
    }

    fn current_event_id(&self) -> EventId {
        EventId(self.state().last_event_id)
    }

    fn device_uuid(&self, device: DeviceId) -> Option<String> {
        self.state().device_uuids.get(&device.0).cloned()
    }

    fn last_event_id_before(&self, _device: DeviceId, time: SystemTime) -> EventId {
        let id = self
            .state()
            .journal
            .iter()
            .filter(|e| e.at < time)
            .map(|e| e.id)
            .max()
            .unwrap_or(0);
        EventId(id)
    }
}
