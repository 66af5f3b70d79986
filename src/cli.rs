// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `fsevent-watch`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "fsevent-watch",
    version,
    about = "Print filesystem change events for a set of paths.",
    long_about = None
)]
pub struct CliArgs {
    /// Absolute paths to watch. Override `paths` from the config file.
    #[arg(value_name = "PATHS")]
    pub paths: Vec<PathBuf>,

    /// Optional config file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Coalescing window in milliseconds.
    #[arg(long, value_name = "MS")]
    pub latency_ms: Option<u64>,

    /// Deliver the first event of a burst immediately.
    #[arg(long)]
    pub no_defer: bool,

    /// Report changes along the ancestry of the watched paths.
    #[arg(long)]
    pub watch_root: bool,

    /// Suppress events caused by this process.
    #[arg(long)]
    pub ignore_self: bool,

    /// Report individual files instead of their directories.
    #[arg(long)]
    pub file_events: bool,

    /// Replay history after this event id before going live.
    #[arg(long, value_name = "ID")]
    pub since: Option<u64>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `FSEVENT_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
