// tests/history_replay.rs

mod common;
use crate::common::builders::OptionsBuilder;
use crate::common::{init_tracing, recv_n, service};

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use fsevent_bridge::native::sim::SimulatedService;
use fsevent_bridge::{
    current_event_id, device_uuid, last_event_id_before, watch, DeviceId, EventFlags, EventId,
    EventKind, WatchTarget,
};

#[tokio::test]
async fn replay_then_one_history_done_then_live() {
    init_tracing();
    let sim = SimulatedService::new();

    // First session: observe two changes and keep the checkpoint.
    let (first, mut events) = watch(
        service(&sim),
        WatchTarget::paths(["/h"]),
        OptionsBuilder::immediate().build(),
    )
    .unwrap();
    sim.record("/h/one", EventFlags::ITEM_CREATED | EventFlags::ITEM_IS_FILE);
    let checkpoint = sim.record("/h/two", EventFlags::ITEM_CREATED | EventFlags::ITEM_IS_FILE);
    recv_n(&mut events, 2).await;
    assert_eq!(first.resume_point(), Some(checkpoint));
    first.close();

    // Changes nobody was watching.
    let missed_a = sim.record("/h/three", EventFlags::ITEM_MODIFIED);
    sim.record("/elsewhere/x", EventFlags::ITEM_MODIFIED);
    let missed_b = sim.record("/h/four", EventFlags::ITEM_REMOVED);

    // Second session resumes after the checkpoint.
    let (second, mut events) = watch(
        service(&sim),
        WatchTarget::paths(["/h"]),
        OptionsBuilder::immediate().since(checkpoint).build(),
    )
    .unwrap();
    let live = sim.record("/h/five", EventFlags::ITEM_CREATED);

    let got = recv_n(&mut events, 4).await;
    assert_eq!(got[0].id, missed_a);
    assert_eq!(got[0].path, PathBuf::from("/h/three"));
    assert_eq!(got[1].id, missed_b);
    assert_eq!(got[2].kind(), EventKind::HistoryDone);
    assert_eq!(got[3].id, live);
    assert_eq!(
        got.iter().filter(|e| e.is_history_done()).count(),
        1,
        "exactly one HistoryDone sentinel"
    );
    second.close();
}

#[tokio::test]
async fn replay_from_the_present_is_just_the_sentinel() {
    let sim = SimulatedService::new();
    sim.record("/p/old", EventFlags::ITEM_CREATED);
    let now = current_event_id(&sim);

    let (stream, mut events) = watch(
        service(&sim),
        WatchTarget::paths(["/p"]),
        OptionsBuilder::immediate().since(now).build(),
    )
    .unwrap();
    let got = recv_n(&mut events, 1).await;
    assert!(got[0].is_history_done());
    stream.close();
}

#[tokio::test]
async fn whole_device_streams_see_everything() {
    let sim = SimulatedService::new();
    let (stream, mut events) = watch(
        service(&sim),
        WatchTarget::device(DeviceId(7)),
        OptionsBuilder::immediate().build(),
    )
    .unwrap();
    assert_eq!(stream.device_being_watched(), Some(DeviceId(7)));
    assert_eq!(stream.paths_being_watched(), vec![PathBuf::from("/")]);
    assert_eq!(sim.device_of(stream.native_ref()), Some(DeviceId(7)));

    sim.record("/anywhere/at/all", EventFlags::ITEM_XATTR_MOD);
    let got = recv_n(&mut events, 1).await;
    assert_eq!(got[0].path, PathBuf::from("/anywhere/at/all"));
    stream.close();
}

#[tokio::test]
async fn device_paths_scope_what_is_seen() {
    let sim = SimulatedService::new();
    let (stream, mut events) = watch(
        service(&sim),
        WatchTarget::Device {
            device: DeviceId(7),
            paths: vec![PathBuf::from("/Users/me")],
        },
        OptionsBuilder::immediate().build(),
    )
    .unwrap();

    sim.record("/Users/other/x", EventFlags::ITEM_CREATED);
    let mine = sim.record("/Users/me/notes.txt", EventFlags::ITEM_CREATED);
    let got = recv_n(&mut events, 1).await;
    assert_eq!(got[0].id, mine);
    assert_eq!(got[0].path, PathBuf::from("/Users/me/notes.txt"));
    assert!(events.try_recv().is_none());
    stream.close();
}

#[test]
fn journal_queries() {
    let sim = SimulatedService::new();
    assert_eq!(current_event_id(&sim), EventId(0));

    let first = sim.record("/q/a", EventFlags::ITEM_CREATED);
    let second = sim.record("/q/b", EventFlags::ITEM_CREATED);
    assert_eq!(current_event_id(&sim), second);
    assert!(second > first);

    let later = SystemTime::now() + Duration::from_secs(60);
    assert_eq!(last_event_id_before(&sim, DeviceId(1), later), second);
    let earlier = SystemTime::now() - Duration::from_secs(3600);
    assert_eq!(last_event_id_before(&sim, DeviceId(1), earlier), EventId(0));

    assert_eq!(device_uuid(&sim, DeviceId(3)), None);
    sim.set_device_uuid(DeviceId(3), "6A1C5E2B-0D7F-4C5E-9E1A-2B3C4D5E6F70");
    assert_eq!(
        device_uuid(&sim, DeviceId(3)).as_deref(),
        Some("6A1C5E2B-0D7F-4C5E-9E1A-2B3C4D5E6F70")
    );
}
