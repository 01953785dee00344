//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use settings_store::host::HostApi;
use settings_store::notice::{Notice, Notifier};
use settings_store::settings::{fix_field, mark_fixed, Fixed, SettingsError, SettingsResult};
use settings_store::storage::FailureMarker;

/// Settings used across tests: `{count: number}` plus an optional name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Counter {
    pub count: i64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip)]
    pub failed: bool,
}

impl FailureMarker for Counter {
    fn mark_failed(&mut self) {
        self.failed = true;
    }

    fn is_failed(&self) -> bool {
        self.failed
    }
}

/// Accepts exactly `{count: number}` with an optional string `name`.
pub fn fix_counter(raw: &Value) -> Fixed<Counter> {
    let value = Counter {
        count: fix_field(raw, "count", 0),
        name: fix_field(raw, "name", String::new()),
        failed: false,
    };
    mark_fixed(raw, value)
}

/// Host that keeps data in memory and records every call.
#[derive(Default)]
pub struct RecordingHost {
    pub stored: Mutex<Value>,
    pub loads: AtomicUsize,
    pub saves: Mutex<Vec<Value>>,
    pub fail_saves: AtomicBool,
    pub fail_loads: AtomicBool,
}

#[allow(dead_code)]
impl RecordingHost {
    pub fn with_data(data: Value) -> Self {
        Self {
            stored: Mutex::new(data),
            ..Default::default()
        }
    }

    pub fn save_count(&self) -> usize {
        self.saves.lock().unwrap().len()
    }

    pub fn last_saved(&self) -> Option<Value> {
        self.saves.lock().unwrap().last().cloned()
    }
}

impl HostApi for RecordingHost {
    fn load_data(&self) -> BoxFuture<'_, SettingsResult<Value>> {
        async move {
            self.loads.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            if self.fail_loads.load(Ordering::SeqCst) {
                return Err(SettingsError::Read("host unavailable".into()));
            }
            Ok(self.stored.lock().unwrap().clone())
        }
        .boxed()
    }

    fn save_data(&self, data: Value) -> BoxFuture<'_, SettingsResult<()>> {
        async move {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            if self.fail_saves.load(Ordering::SeqCst) {
                return Err(SettingsError::Persistence("host refused save".into()));
            }
            *self.stored.lock().unwrap() = data.clone();
            self.saves.lock().unwrap().push(data);
            Ok(())
        }
        .boxed()
    }
}

/// Notifier that keeps every notice it receives.
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<Notice>>,
}

#[allow(dead_code)]
impl RecordingNotifier {
    pub fn keys(&self) -> Vec<&'static str> {
        self.notices.lock().unwrap().iter().map(|n| n.key).collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) {
        self.notices.lock().unwrap().push(notice.clone());
    }
}
