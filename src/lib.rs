// src/lib.rs

//! Safe lifecycle and marshaling layer over the FSEvents change journal.
//!
//! A [`Stream`] wraps one native event stream. Paths go out through
//! [`marshal`], flags through [`flags`]; events come back through the
//! process-wide [`bridge`] callback and are read from an [`Events`]
//! sequence.

pub mod bridge;
pub mod channel;
pub mod cli;
pub mod config;
pub mod errors;
pub mod event;
pub mod flags;
pub mod logging;
pub mod marshal;
pub mod native;
pub mod stream;
pub mod types;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

pub use crate::channel::Events;
pub use crate::errors::{CreationError, FsEventError, StateError};
pub use crate::event::{DecodedEvent, DeliveryAnomaly, EventKind, RawEvent};
pub use crate::flags::{CreateFlags, EventFlags};
pub use crate::native::{current_event_id, device_uuid, last_event_id_before, NativeService};
pub use crate::stream::{watch, Stream};
pub use crate::types::{
    CreateOptions, DeviceId, DispatchQueue, EventId, StartPoint, StreamState, WatchTarget,
};

use crate::cli::CliArgs;
use crate::config::resolve_config;

/// High-level entry point used by `main.rs`.
///
/// Resolves the configuration, starts one stream and prints every event
/// until the stream ends or Ctrl-C is pressed.
pub async fn run(args: CliArgs) -> Result<()> {
    let config = resolve_config(&args)?;
    let service = platform_service()?;

    let (stream, mut events) = watch(service, config.target, config.options)?;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => report(&event),
                None => break,
            },
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl+C")?;
                info!("Ctrl+C received; stopping stream");
                break;
            }
        }
    }

    stream.stop()?;
    // Drain what was enqueued before the stop.
    while let Some(event) = events.try_recv() {
        report(&event);
    }
    if let Some(id) = stream.resume_point() {
        info!(resume_from = %id, "pass --since {id} to continue from here");
    }
    stream.close();
    Ok(())
}

fn report(event: &DecodedEvent) {
    match event.kind() {
        EventKind::Rescan(anomaly) => warn!(
            path = %event.path.display(),
            kernel_dropped = anomaly.kernel_dropped,
            user_dropped = anomaly.user_dropped,
            "events were coalesced or dropped; rescan required"
        ),
        EventKind::IdsWrapped => warn!("event ids wrapped; stored ids are no longer valid"),
        EventKind::HistoryDone => info!("historical replay complete"),
        _ => {}
    }
    println!("{event}");
}

#[cfg(target_os = "macos")]
fn platform_service() -> errors::Result<Arc<dyn NativeService>> {
    Ok(native::default_service())
}

#[cfg(not(target_os = "macos"))]
fn platform_service() -> errors::Result<Arc<dyn NativeService>> {
    Err(FsEventError::Config(
        "the FSEvents service is only available on macOS".to_string(),
    ))
}
