// tests/stream_lifecycle.rs

mod common;
use crate::common::builders::OptionsBuilder;
use crate::common::{init_tracing, service};

use fsevent_bridge::bridge;
use fsevent_bridge::native::sim::SimulatedService;
use fsevent_bridge::{DispatchQueue, StateError, Stream, StreamState, WatchTarget};

fn new_stream(sim: &SimulatedService) -> Stream {
    Stream::with_service(
        service(sim),
        WatchTarget::paths(["/lifecycle"]),
        OptionsBuilder::immediate().build(),
    )
    .unwrap()
}

fn invalid(op: &'static str, state: StreamState) -> StateError {
    StateError::InvalidTransition { op, state }
}

#[test]
fn full_lifecycle_walks_every_state() {
    init_tracing();
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    let native = stream.native_ref();
    let token = stream.token();
    assert!(bridge::is_registered(token));
    assert_eq!(stream.state(), StreamState::Unstarted);

    stream.schedule(DispatchQueue::new("lifecycle.full")).unwrap();
    assert_eq!(sim.queue_label(native).as_deref(), Some("lifecycle.full"));

    stream.start().unwrap();
    assert_eq!(stream.state(), StreamState::Started);

    stream.stop().unwrap();
    assert_eq!(stream.state(), StreamState::Stopped);

    stream.invalidate().unwrap();
    assert_eq!(stream.state(), StreamState::Invalidated);
    assert_eq!(stream.queue_label(), None);

    stream.release().unwrap();
    assert_eq!(stream.state(), StreamState::Released);
    assert!(sim.is_released(native));
    assert!(!bridge::is_registered(token));
}

#[test]
fn out_of_order_calls_fail_and_leave_state_unchanged() {
    init_tracing();
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);

    // Unstarted, nothing scheduled.
    let err = stream.start().unwrap_err();
    assert!(matches!(
        err,
        fsevent_bridge::FsEventError::State(StateError::NotScheduled)
    ));
    assert_eq!(stream.stop(), Err(invalid("stop", StreamState::Unstarted)));
    assert_eq!(
        stream.invalidate(),
        Err(invalid("invalidate", StreamState::Unstarted))
    );
    assert_eq!(stream.release(), Err(invalid("release", StreamState::Unstarted)));
    assert_eq!(stream.flush(true), Err(invalid("flush", StreamState::Unstarted)));
    assert_eq!(stream.state(), StreamState::Unstarted);

    stream.schedule(DispatchQueue::new("lifecycle.order")).unwrap();
    stream.start().unwrap();

    // Started.
    assert_eq!(
        stream.schedule(DispatchQueue::new("other")),
        Err(invalid("schedule", StreamState::Started))
    );
    assert!(stream.start().is_err());
    assert_eq!(
        stream.invalidate(),
        Err(invalid("invalidate", StreamState::Started))
    );
    assert_eq!(stream.release(), Err(invalid("release", StreamState::Started)));
    assert_eq!(stream.state(), StreamState::Started);

    stream.stop().unwrap();

    // Stopped.
    assert!(stream.start().is_err());
    assert_eq!(stream.flush(false), Err(invalid("flush", StreamState::Stopped)));
    assert_eq!(stream.release(), Err(invalid("release", StreamState::Stopped)));
    assert_eq!(stream.state(), StreamState::Stopped);

    stream.invalidate().unwrap();
    stream.release().unwrap();
    assert!(stream.latest_event_id().is_err());
}

#[test]
fn stop_is_idempotent() {
    init_tracing();
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    stream.schedule(DispatchQueue::new("lifecycle.stop")).unwrap();
    stream.start().unwrap();

    assert_eq!(stream.stop(), Ok(()));
    assert_eq!(stream.stop(), Ok(()));
    assert_eq!(stream.state(), StreamState::Stopped);
}

#[test]
fn close_tears_down_a_running_stream() {
    init_tracing();
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    let native = stream.native_ref();
    let token = stream.token();
    stream.schedule(DispatchQueue::new("lifecycle.close")).unwrap();
    stream.start().unwrap();

    stream.close();
    assert!(sim.is_released(native));
    assert!(!bridge::is_registered(token));
    assert_eq!(sim.live_streams(), 0);
}

#[test]
fn close_after_stop_is_fine() {
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    let native = stream.native_ref();
    stream.schedule(DispatchQueue::new("lifecycle.close-stopped")).unwrap();
    stream.start().unwrap();
    stream.stop().unwrap();
    stream.close();
    assert!(sim.is_released(native));
}

#[test]
fn dropping_an_unscheduled_stream_releases_it() {
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    let native = stream.native_ref();
    drop(stream);
    assert!(sim.is_released(native));
}

#[test]
#[should_panic(expected = "released twice")]
fn double_release_is_fatal() {
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    stream.schedule(DispatchQueue::new("lifecycle.double")).unwrap();
    stream.start().unwrap();
    stream.stop().unwrap();
    stream.invalidate().unwrap();
    stream.release().unwrap();
    let _ = stream.release();
}

#[test]
#[should_panic(expected = "after its resource was released")]
fn close_after_release_is_fatal() {
    let sim = SimulatedService::new();
    let stream = new_stream(&sim);
    stream.schedule(DispatchQueue::new("lifecycle.close-released")).unwrap();
    stream.start().unwrap();
    stream.stop().unwrap();
    stream.invalidate().unwrap();
    stream.release().unwrap();
    stream.close();
}
