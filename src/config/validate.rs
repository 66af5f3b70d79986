// src/config/validate.rs

use std::time::Duration;

use crate::config::model::{DEFAULT_LATENCY_MS, RawWatchConfig, WatchConfig};
use crate::errors::{FsEventError, Result};
use crate::flags::CreateFlags;
use crate::types::{CreateOptions, DeviceId, EventId, StartPoint, WatchTarget};

impl TryFrom<RawWatchConfig> for WatchConfig {
    type Error = FsEventError;

    fn try_from(raw: RawWatchConfig) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(WatchConfig::new_unchecked(build_target(&raw), build_options(&raw)))
    }
}

fn validate_raw_config(cfg: &RawWatchConfig) -> Result<()> {
    validate_target(cfg)?;
    validate_start(cfg)?;
    Ok(())
}

/// Every watch path is absolute. On a device target `/` is the root of
/// that device, and no paths at all means the whole device.
fn validate_target(cfg: &RawWatchConfig) -> Result<()> {
    if cfg.device.is_none() && cfg.paths.is_empty() {
        return Err(FsEventError::Config(
            "nothing to watch: give at least one path or a device".to_string(),
        ));
    }
    if let Some(path) = cfg.paths.iter().find(|p| !p.is_absolute()) {
        let msg = match cfg.device {
            Some(device) => format!(
                "watch path {} must be absolute (rooted at device {})",
                path.display(),
                device
            ),
            None => format!("watch path {} must be absolute", path.display()),
        };
        return Err(FsEventError::Config(msg));
    }
    Ok(())
}

fn validate_start(cfg: &RawWatchConfig) -> Result<()> {
    if cfg.since == Some(EventId::SINCE_NOW.get()) {
        return Err(FsEventError::Config(format!(
            "since = {} is reserved for \"from now\"; omit `since` instead",
            u64::MAX
        )));
    }
    Ok(())
}

fn build_target(cfg: &RawWatchConfig) -> WatchTarget {
    match cfg.device {
        Some(device) => WatchTarget::Device {
            device: DeviceId(device),
            paths: cfg.paths.clone(),
        },
        None => WatchTarget::Paths(cfg.paths.clone()),
    }
}

fn build_options(cfg: &RawWatchConfig) -> CreateOptions {
    let mut flags = CreateFlags::empty();
    flags.set(CreateFlags::NO_DEFER, cfg.no_defer);
    flags.set(CreateFlags::WATCH_ROOT, cfg.watch_root);
    flags.set(CreateFlags::IGNORE_SELF, cfg.ignore_self);
    flags.set(CreateFlags::FILE_EVENTS, cfg.file_events);

    CreateOptions {
        flags,
        latency: Duration::from_millis(cfg.latency_ms.unwrap_or(DEFAULT_LATENCY_MS)),
        start: cfg
            .since
            .map_or(StartPoint::Now, |id| StartPoint::Since(EventId(id))),
    }
}
