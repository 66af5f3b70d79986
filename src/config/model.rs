// src/config/model.rs

use std::path::PathBuf;

use serde::Deserialize;

use crate::types::{CreateOptions, WatchTarget};

/// Configuration as read from a TOML file.
///
/// ```toml
/// paths = ["/Users/me/project"]
/// latency_ms = 300
/// file_events = true
/// watch_root = true
/// since = 123456
/// ```
///
/// With `device` set, `paths` are rooted at that device (`/` is its mount
/// point) and may be left empty to watch the whole device.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawWatchConfig {
    #[serde(default)]
    pub paths: Vec<PathBuf>,

    /// Device number (`st_dev`) to watch.
    #[serde(default)]
    pub device: Option<i32>,

    /// Coalescing window; defaults to `DEFAULT_LATENCY_MS`.
    #[serde(default)]
    pub latency_ms: Option<u64>,

    #[serde(default)]
    pub no_defer: bool,

    #[serde(default)]
    pub watch_root: bool,

    #[serde(default)]
    pub ignore_self: bool,

    #[serde(default)]
    pub file_events: bool,

    /// Event id to resume after. Absent means "from now".
    #[serde(default)]
    pub since: Option<u64>,
}

pub const DEFAULT_LATENCY_MS: u64 = 100;

/// Validated configuration, ready to create a stream from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchConfig {
    pub target: WatchTarget,
    pub options: CreateOptions,
}

impl WatchConfig {
    /// Construct without validation. Prefer `WatchConfig::try_from`.
    pub fn new_unchecked(target: WatchTarget, options: CreateOptions) -> Self {
        Self { target, options }
    }
}
