pub mod builders;

use std::sync::Once;
use std::time::Duration;

use tracing_subscriber::{fmt, EnvFilter};

use fsevent_bridge::{DecodedEvent, Events};

static INIT: Once = Once::new();

/// Initialise tracing for tests.
///
/// - Uses `with_test_writer()`, so logs are captured per-test.
/// - The Rust test harness only prints captured output for **failing** tests
///   (unless you run with `-- --nocapture`).
///
/// Enable levels with e.g.:
/// `RUST_LOG=fsevent_bridge=debug cargo test`
pub fn init_tracing() {
    INIT.call_once(|| {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

        fmt()
            .with_env_filter(filter)
            .with_test_writer() // print only for failing tests unless --nocapture
            .with_target(true)
            .with_thread_names(true)
            .init();
    });
}

/// Run a future with a 5-second timeout.
pub async fn with_timeout<F, T>(f: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(Duration::from_secs(5), f)
        .await
        .expect("Test timed out after 5 seconds")
}

/// Receive exactly `n` events, failing the test if they don't arrive in time.
pub async fn recv_n(events: &mut Events, n: usize) -> Vec<DecodedEvent> {
    let mut out = Vec::with_capacity(n);
    while out.len() < n {
        match with_timeout(events.recv()).await {
            Some(event) => out.push(event),
            None => panic!("event sequence ended after {} of {n} events", out.len()),
        }
    }
    out
}

/// Drain the sequence until it ends.
pub async fn recv_all(events: &mut Events) -> Vec<DecodedEvent> {
    let mut out = Vec::new();
    while let Some(event) = with_timeout(events.recv()).await {
        out.push(event);
    }
    out
}
