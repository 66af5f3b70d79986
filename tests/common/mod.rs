#![allow(dead_code)]

use std::sync::Arc;

use fsevent_bridge::native::sim::SimulatedService;
use fsevent_bridge::NativeService;

pub use fsevent_bridge_test_utils::builders;
pub use fsevent_bridge_test_utils::{init_tracing, recv_all, recv_n, with_timeout};

/// A trait-object handle onto `sim`, sharing its journal.
pub fn service(sim: &SimulatedService) -> Arc<dyn NativeService> {
    Arc::new(sim.clone())
}
