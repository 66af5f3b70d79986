// src/config/mod.rs

//! Optional TOML configuration for `fsevent-watch`.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a config file from disk and merge CLI overrides (`loader.rs`).
//! - Turn the raw model into a watch target and create options (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, resolve_config};
pub use model::{RawWatchConfig, WatchConfig};
