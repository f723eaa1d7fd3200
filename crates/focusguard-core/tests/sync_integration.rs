//! Cross-device synchronization scenarios: two services sharing one store.

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use focusguard_core::enforcement::testing::RecordingBackend;
use focusguard_core::sync::InMemoryStore;
use focusguard_core::{CommitmentConfig, FocusService, SessionOptions, SharedStateStore};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 8, 10, 9, 0, 0).unwrap()
}

fn device(
    id: &str,
    store: Arc<InMemoryStore>,
) -> FocusService<InMemoryStore> {
    FocusService::new(
        "user-1",
        id,
        CommitmentConfig {
            month_anchor: t0(),
            ..Default::default()
        },
        Arc::new(RecordingBackend::new(true)),
        store,
    )
}

fn options() -> SessionOptions {
    SessionOptions {
        duration_secs: 1500,
        strict: false,
        blocked_items: vec!["social.example".into()],
        mode: "focus".into(),
    }
}

#[tokio::test]
async fn start_on_phone_stop_on_laptop() {
    let store = Arc::new(InMemoryStore::new());
    let mut phone = device("focusguard-phone", store.clone());

    phone.start_session(options(), t0()).await.unwrap();

    // The laptop, merely observing, sees the shared record.
    let remote = store.read_timer_state("user-1").await.unwrap().unwrap();
    assert!(remote.is_active);
    assert_eq!(remote.last_modified_by, "focusguard-phone");
    assert_eq!(remote.remaining_secs(t0() + Duration::seconds(500)), 1000);

    // The laptop issues an authoritative stop by deactivating the record.
    let mut stopped = remote.clone();
    stopped.deactivate("focusguard-laptop", t0() + Duration::seconds(600));
    store.write_timer_state(&stopped).await.unwrap();

    // The phone's next reconciliation tears its session down.
    phone.refresh_remote(t0() + Duration::seconds(630)).await.unwrap();
    assert!(!phone.is_running());
}

#[tokio::test]
async fn expired_remote_record_reads_as_over() {
    let store = Arc::new(InMemoryStore::new());
    let mut phone = device("focusguard-phone", store.clone());

    phone.start_session(
        SessionOptions {
            duration_secs: 60,
            ..options()
        },
        t0(),
    )
    .await
    .unwrap();

    // Nobody wrote a deactivation, but the end time has passed. Any reader
    // must treat the record as over without waiting for a write.
    let remote = store.read_timer_state("user-1").await.unwrap().unwrap();
    assert!(remote.is_active, "no deactivating write happened");
    assert!(remote.is_expired(t0() + Duration::seconds(61)));
    assert_eq!(remote.remaining_secs(t0() + Duration::seconds(61)), 0);
}

#[tokio::test]
async fn concurrent_starts_resolve_last_write_wins() {
    let store = Arc::new(InMemoryStore::new());
    let mut phone = device("focusguard-phone", store.clone());
    let mut laptop = device("focusguard-laptop", store.clone());

    // Phone starts at t0, laptop starts one second later; the laptop's
    // write lands last and silently wins. Accepted limitation.
    phone.start_session(options(), t0()).await.unwrap();
    laptop
        .start_session(
            SessionOptions {
                duration_secs: 600,
                ..options()
            },
            t0() + Duration::seconds(1),
        )
        .await
        .unwrap();

    let remote = store.read_timer_state("user-1").await.unwrap().unwrap();
    assert_eq!(remote.last_modified_by, "focusguard-laptop");
    assert_eq!(remote.planned_duration_secs, Some(600));
}

#[tokio::test]
async fn offline_session_stays_usable_and_invisible() {
    let store = Arc::new(InMemoryStore::new());
    let mut phone = device("focusguard-phone", store.clone());

    store.set_offline(true);
    phone.start_session(options(), t0()).await.unwrap();
    assert!(phone.is_running());
    assert!(phone.is_degraded());

    // No remote record was created.
    store.set_offline(false);
    assert!(store.read_timer_state("user-1").await.unwrap().is_none());

    // The local countdown kept going the whole time and still completes.
    let done = phone.tick(t0() + Duration::seconds(1501)).await.unwrap();
    assert!(done.unwrap().was_completed);
}

#[tokio::test]
async fn reconnect_after_local_only_start_keeps_the_session() {
    let store = Arc::new(InMemoryStore::new());

    // Another device left an old, inactive record behind hours ago.
    let stale = focusguard_core::SharedTimerState::inactive(
        "user-1",
        "focusguard-laptop",
        t0() - Duration::hours(6),
    );
    store.write_timer_state(&stale).await.unwrap();

    // The phone starts while unreachable, then reconnects.
    let mut phone = device("focusguard-phone", store.clone());
    store.set_offline(true);
    phone.start_session(options(), t0()).await.unwrap();
    assert!(phone.is_degraded());

    store.set_offline(false);
    phone.refresh_remote(t0() + Duration::seconds(60)).await.unwrap();

    // The stale record predates the local session and must not stop it.
    assert!(phone.is_running());
}

#[tokio::test]
async fn extend_propagates_to_remote() {
    let store = Arc::new(InMemoryStore::new());
    let mut phone = device("focusguard-phone", store.clone());

    phone.start_session(options(), t0()).await.unwrap();
    let new_end = phone
        .extend_session(300, t0() + Duration::seconds(10))
        .await
        .unwrap();
    assert_eq!(new_end, t0() + Duration::seconds(1800));

    let remote = store.read_timer_state("user-1").await.unwrap().unwrap();
    assert_eq!(remote.end_time, Some(t0() + Duration::seconds(1800)));
    assert_eq!(remote.planned_duration_secs, Some(1800));
}
