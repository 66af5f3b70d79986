// src/types.rs

//! Value objects shared by the stream, the bridge and the native services.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::flags::CreateFlags;

/// A journal position as reported by the native service.
///
/// Identifiers grow monotonically per device until the service reports
/// `EVENT_IDS_WRAPPED`; after that, older identifiers must not be used to
/// resume a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EventId(pub u64);

impl EventId {
    /// Native sentinel meaning "start from the current position".
    pub const SINCE_NOW: EventId = EventId(u64::MAX);

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A storage device number (`st_dev`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub i32);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "dev:{}", self.0)
    }
}

/// Where a new stream starts reading the change journal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StartPoint {
    /// Only live events.
    #[default]
    Now,
    /// Replay everything after this identifier, then continue live.
    Since(EventId),
}

impl StartPoint {
    pub fn to_native(self) -> u64 {
        match self {
            StartPoint::Now => EventId::SINCE_NOW.0,
            StartPoint::Since(id) => id.0,
        }
    }

    pub fn from_native(raw: u64) -> Self {
        if raw == EventId::SINCE_NOW.0 {
            StartPoint::Now
        } else {
            StartPoint::Since(EventId(raw))
        }
    }
}

/// What a stream watches. Immutable once a stream is created from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchTarget {
    /// A set of absolute paths, watched recursively.
    Paths(Vec<PathBuf>),
    /// Paths on a single device, written absolute with `/` standing for the
    /// device's root (`/Users/me`). An empty list watches the whole device.
    Device { device: DeviceId, paths: Vec<PathBuf> },
}

impl WatchTarget {
    pub fn paths<I, P>(paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        WatchTarget::Paths(paths.into_iter().map(|p| p.as_ref().to_path_buf()).collect())
    }

    pub fn device(device: DeviceId) -> Self {
        WatchTarget::Device {
            device,
            paths: Vec::new(),
        }
    }

    pub fn device_id(&self) -> Option<DeviceId> {
        match self {
            WatchTarget::Paths(_) => None,
            WatchTarget::Device { device, .. } => Some(*device),
        }
    }

    /// Paths in the form handed to the native create call.
    pub fn native_paths(&self) -> Vec<PathBuf> {
        match self {
            WatchTarget::Paths(paths) => paths.clone(),
            WatchTarget::Device { paths, .. } if paths.is_empty() => vec![PathBuf::from("/")],
            WatchTarget::Device { paths, .. } => paths.clone(),
        }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchTarget::Paths(paths) => write!(f, "paths {paths:?}"),
            WatchTarget::Device { device, paths } => write!(f, "{device} paths {paths:?}"),
        }
    }
}

/// Stream creation options. Immutable after the stream is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CreateOptions {
    pub flags: CreateFlags,
    /// Minimum batching interval (the coalescing window).
    pub latency: Duration,
    pub start: StartPoint,
}

impl CreateOptions {
    pub fn new(flags: CreateFlags) -> Self {
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn since(mut self, id: EventId) -> Self {
        self.start = StartPoint::Since(id);
        self
    }

    pub fn latency_secs(&self) -> f64 {
        self.latency.as_secs_f64()
    }

    /// True when the native side holds events back for `latency` before
    /// delivering them.
    pub fn defers_delivery(&self) -> bool {
        !self.latency.is_zero() && !self.flags.contains(CreateFlags::NO_DEFER)
    }
}

/// Lifecycle of a [`crate::stream::Stream`].
///
/// `Unstarted -> Started -> Stopped -> Invalidated -> Released`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamState {
    Unstarted,
    Started,
    Stopped,
    Invalidated,
    Released,
}

impl fmt::Display for StreamState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StreamState::Unstarted => "unstarted",
            StreamState::Started => "started",
            StreamState::Stopped => "stopped",
            StreamState::Invalidated => "invalidated",
            StreamState::Released => "released",
        };
        f.write_str(s)
    }
}

/// A serial scheduling target on which the native service invokes callbacks.
///
/// Only the label lives here; the native service owns the actual queue
/// between `schedule` and `invalidate`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchQueue {
    label: String,
}

impl DispatchQueue {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }
}
