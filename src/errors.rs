// src/errors.rs

//! Crate-wide error types.
//!
//! Three families mirror the stream lifecycle:
//! - [`CreationError`]: the native resource could not be allocated.
//! - [`StateError`]: an operation was issued in the wrong lifecycle state.
//! - everything else (config, IO) funnels into [`FsEventError`].
//!
//! Delivery anomalies (dropped or coalesced events) are *not* errors; they
//! reach the consumer as ordinary events, see [`crate::event::EventKind`].

use std::path::PathBuf;

use thiserror::Error;

use crate::types::StreamState;

/// The native stream resource could not be created.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CreationError {
    #[error("watch target contains no paths")]
    EmptyTarget,

    #[error("watch path {0:?} is not absolute")]
    RelativePath(PathBuf),

    #[error("watch path {path:?} cannot be marshaled: {reason}")]
    InvalidPath { path: PathBuf, reason: &'static str },

    #[error("create flags {0:#x} are not supported by this bridge")]
    UnsupportedFlags(u32),

    #[error("native service refused to create a stream for {0}")]
    Refused(String),
}

/// A lifecycle operation that is not valid for the stream's current state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StateError {
    #[error("cannot {op} a stream that is {state}")]
    InvalidTransition { op: &'static str, state: StreamState },

    #[error("cannot start stream: no scheduling target attached")]
    NotScheduled,

    #[error("stream is already scheduled on queue {0:?}")]
    AlreadyScheduled(String),

    #[error("the event sequence for this stream was already taken")]
    EventsTaken,
}

#[derive(Error, Debug)]
pub enum FsEventError {
    #[error("Creation error: {0}")]
    Creation(#[from] CreationError),

    #[error("State error: {0}")]
    State(#[from] StateError),

    #[error("native service failed to start stream {0}")]
    StartFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, FsEventError>;
