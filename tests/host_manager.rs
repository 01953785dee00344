//! Host-integrated settings manager tests.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use futures_util::poll;

use settings_store::config::loader::parse_config;
use settings_store::host::{HostBackend, HostSettingsManager};
use settings_store::notice::MALFORMED_DATA;
use settings_store::settings::{LoadState, ManagerOptions, SettingsError};

mod common;
use common::{fix_counter, Counter, RecordingHost, RecordingNotifier};

const WINDOW: Duration = Duration::from_millis(100);

fn manager(host: RecordingHost) -> HostSettingsManager<Counter, RecordingHost> {
    HostSettingsManager::new(HostBackend::with_debounce(host, WINDOW), fix_counter)
}

fn manual_write_manager(host: RecordingHost) -> HostSettingsManager<Counter, RecordingHost> {
    let options = ManagerOptions {
        write_on_mutate: false,
        ..Default::default()
    };
    HostSettingsManager::with_options(HostBackend::with_debounce(host, WINDOW), fix_counter, options)
}

async fn write_then_count(m: &HostSettingsManager<Counter, RecordingHost>) -> usize {
    m.write().await.unwrap();
    m.backend().host().save_count()
}

#[tokio::test(start_paused = true)]
async fn test_writes_in_one_window_share_one_save() {
    let m = manager(RecordingHost::with_data(json!({ "count": 1 })));
    m.load().await;
    assert_eq!(m.backend().host().save_count(), 1);

    let (a, b, c) = tokio::join!(write_then_count(&m), write_then_count(&m), write_then_count(&m));
    // Each caller resolved only after the single shared save finished.
    assert_eq!((a, b, c), (2, 2, 2));
    assert_eq!(m.backend().host().save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_saved_value_is_current_when_window_closes() {
    let m = manual_write_manager(RecordingHost::with_data(json!({ "count": 1 })));
    m.load().await;

    let (written, mutated) = tokio::join!(m.write(), async {
        tokio::time::sleep(WINDOW / 2).await;
        m.mutate(|c| c.count = 42).await
    });
    written.unwrap();
    mutated.unwrap();

    assert_eq!(m.backend().host().last_saved(), Some(json!({ "count": 42 })));
    assert_eq!(m.backend().host().save_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_load_heals_malformed_data() {
    let notifier = Arc::new(RecordingNotifier::default());
    let backend = HostBackend::with_debounce(
        RecordingHost::with_data(json!({ "count": 5, "junk": "x" })),
        WINDOW,
    )
    .with_notifier(notifier.clone());
    let m = HostSettingsManager::new(backend, fix_counter);

    m.load().await;
    assert_eq!(m.value().unwrap().count, 5);
    assert_eq!(notifier.keys(), vec![MALFORMED_DATA]);
    assert_eq!(m.backend().host().last_saved(), Some(json!({ "count": 5 })));
    assert!(!m.backend().has_pending_write());
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_loads_share_one_read() {
    let m = manager(RecordingHost::with_data(json!({ "count": 2 })));
    let waiter = m.on_loaded();

    tokio::join!(m.load(), m.load(), m.load());
    assert!(waiter.await.is_ok());
    assert_eq!(m.backend().host().loads.load(Ordering::SeqCst), 1);
    assert_eq!(m.value().unwrap().count, 2);
}

#[tokio::test(start_paused = true)]
async fn test_persistence_failure_reaches_caller() {
    let m = manager(RecordingHost::with_data(json!({ "count": 1 })));
    m.load().await;
    m.backend().host().fail_saves.store(true, Ordering::SeqCst);

    assert_eq!(
        m.write().await,
        Err(SettingsError::Persistence("host refused save".into()))
    );

    let err = m.mutate(|c| c.count = 3).await.unwrap_err();
    assert!(matches!(err, SettingsError::Persistence(_)));
    // No retry: the in-memory snapshot moved on, the host still has the old data.
    assert_eq!(m.value().unwrap().count, 3);
    assert_eq!(*m.backend().host().stored.lock().unwrap(), json!({ "count": 1 }));

    m.backend().host().fail_saves.store(false, Ordering::SeqCst);
    m.write().await.unwrap();
    assert_eq!(*m.backend().host().stored.lock().unwrap(), json!({ "count": 3 }));
}

#[tokio::test(start_paused = true)]
async fn test_read_failure_falls_back_without_overwriting() {
    let host = RecordingHost::with_data(json!({ "count": 9 }));
    host.fail_loads.store(true, Ordering::SeqCst);
    let m = manager(host);

    m.load().await;
    assert!(m.is_loaded());
    assert_eq!(m.value().unwrap().count, 0);
    assert_eq!(m.backend().host().save_count(), 0);
    assert_eq!(*m.backend().host().stored.lock().unwrap(), json!({ "count": 9 }));
}

#[tokio::test(start_paused = true)]
async fn test_write_requires_load() {
    let m = manager(RecordingHost::default());
    assert_eq!(m.write().await, Err(SettingsError::NotLoaded));
    assert_eq!(m.backend().host().save_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_dropped_load_can_be_retried() {
    let m = manager(RecordingHost::with_data(json!({ "count": 2 })));
    let waiter = m.on_loaded();

    {
        let mut first = Box::pin(m.load());
        assert!(poll!(&mut first).is_pending());
        assert_eq!(m.state(), LoadState::Loading);
    }
    assert_eq!(m.state(), LoadState::Unloaded);

    tokio::time::timeout(Duration::from_secs(2), m.load())
        .await
        .expect("load after a dropped load completes");
    assert_eq!(m.value().unwrap().count, 2);
    assert!(waiter.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn test_waiting_load_takes_over_dropped_driver() {
    let m = manager(RecordingHost::with_data(json!({ "count": 4 })));

    let mut driver = Box::pin(m.load());
    assert!(poll!(&mut driver).is_pending());
    let mut follower = Box::pin(m.load());
    assert!(poll!(&mut follower).is_pending());

    drop(driver);
    tokio::time::timeout(Duration::from_secs(2), follower)
        .await
        .expect("waiting load finishes the cycle");
    assert!(m.is_loaded());
    assert_eq!(m.value().unwrap().count, 4);
    assert_eq!(m.backend().host().loads.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_manager_from_config() {
    let config = parse_config(
        r#"
[persistence]
debounce_ms = 250
write_on_mutate = false
"#,
    )
    .unwrap();
    let backend = HostBackend::from_config(
        RecordingHost::with_data(json!({ "count": 1 })),
        &config.persistence,
    );
    let m = HostSettingsManager::with_options(backend, fix_counter, ManagerOptions::from_config(&config));
    assert_eq!(m.backend().debounce_window(), Duration::from_millis(250));

    m.load().await;
    m.mutate(|c| c.count = 2).await.unwrap();
    // Only the write that follows load reached the host.
    assert_eq!(m.backend().host().save_count(), 1);
}
