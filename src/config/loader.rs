// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::cli::CliArgs;
use crate::config::model::{RawWatchConfig, WatchConfig};
use crate::errors::Result;

/// Load a configuration file and return the raw `RawWatchConfig`.
///
/// This only performs TOML deserialization. Use [`load_and_validate`] to
/// get something a stream can be created from.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawWatchConfig> {
    let contents = fs::read_to_string(path.as_ref())?;
    let config: RawWatchConfig = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<WatchConfig> {
    let raw = load_from_path(path)?;
    WatchConfig::try_from(raw)
}

/// Build the effective configuration for a CLI run: the config file (if
/// any) with command-line values layered on top.
pub fn resolve_config(args: &CliArgs) -> Result<WatchConfig> {
    let mut raw = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawWatchConfig::default(),
    };
    apply_cli_overrides(&mut raw, args);
    WatchConfig::try_from(raw)
}

fn apply_cli_overrides(raw: &mut RawWatchConfig, args: &CliArgs) {
    if !args.paths.is_empty() {
        raw.paths = args.paths.clone();
    }
    if args.latency_ms.is_some() {
        raw.latency_ms = args.latency_ms;
    }
    if args.since.is_some() {
        raw.since = args.since;
    }
    // Boolean flags can only switch a capability on.
    raw.no_defer |= args.no_defer;
    raw.watch_root |= args.watch_root;
    raw.ignore_self |= args.ignore_self;
    raw.file_events |= args.file_events;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn cli_values_override_file_values() {
        let mut raw = RawWatchConfig {
            paths: vec![PathBuf::from("/from/file")],
            latency_ms: Some(500),
            watch_root: true,
            ..RawWatchConfig::default()
        };
        let args = CliArgs {
            paths: vec![PathBuf::from("/from/cli")],
            latency_ms: Some(0),
            no_defer: true,
            ..CliArgs::default()
        };
        apply_cli_overrides(&mut raw, &args);

        assert_eq!(raw.paths, vec![PathBuf::from("/from/cli")]);
        assert_eq!(raw.latency_ms, Some(0));
        assert!(raw.no_defer);
        assert!(raw.watch_root);
    }
}
