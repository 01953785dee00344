//! Settings backend over a key-value store.
//!
//! # Responsibilities
//! - Keep each manager's settings in its own slot of a shared document
//! - Record rejected payloads in the document's recovery log
//! - Mark fallback values so callers can tell them from real settings
//!
//! # Stored Document
//! ```text
//! key → {
//!     "settings": { "<prefix>": <settings>, ... },
//!     "recovery": { "<prefix><timestamp>": "<raw json text>", ... }
//! }
//! ```
//!
//! # Design Decisions
//! - Every write replaces the whole blob under the key
//! - A blob that is not JSON reaches the fixer as a string, so its text ends
//!   up in the recovery log instead of being silently dropped
//! - A missing slot is not "malformed": nothing is recorded for it

use std::sync::Arc;

use chrono::Utc;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::schema::StorageConfig;
use crate::notice::{LogNotifier, Notice, Notifier};
use crate::settings::backend::{SettingsBackend, SnapshotCell};
use crate::settings::manager::SettingsManager;
use crate::settings::types::SettingsResult;
use crate::storage::kv::{KeyValueStore, Namespaced};
use crate::storage::recovery::{append_recovery, get_recovery, set_recovery, RecoveryLog};

/// Sentinel marking a value produced after rejecting stored data.
pub trait FailureMarker {
    fn mark_failed(&mut self);
    fn is_failed(&self) -> bool;
}

/// Document stored under one physical key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageDocument {
    pub settings: std::collections::BTreeMap<String, Value>,
    pub recovery: RecoveryLog,
}

enum Stored {
    Missing,
    Document(StorageDocument),
    Corrupt(String),
}

/// Backend persisting one prefix slot of a shared storage document.
pub struct StorageBackend<S> {
    store: S,
    key: String,
    prefix: String,
    notifier: Arc<dyn Notifier>,
}

/// Settings manager persisted in a key-value store.
pub type StorageSettingsManager<T, S> = SettingsManager<T, StorageBackend<S>>;

impl<S: KeyValueStore> StorageBackend<S> {
    /// Backend for the `prefix` slot of the document under `key`.
    ///
    /// Recovery entries are keyed `<prefix><timestamp>`, so prefixes may nest
    /// (`a.` and `a.b.`) without sharing entries. Two managers with the same
    /// prefix on one key share a slot.
    pub fn new(store: S, key: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            key: key.into(),
            prefix: prefix.into(),
            notifier: Arc::new(LogNotifier::default()),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// This backend's recovery entries, keyed by timestamp.
    pub fn recovery(&self) -> SettingsResult<RecoveryLog> {
        Ok(get_recovery(&self.document()?.recovery, &self.prefix))
    }

    /// Replace this backend's recovery entries, leaving other prefixes alone.
    pub fn replace_recovery(&self, entries: &RecoveryLog) -> SettingsResult<()> {
        let mut document = self.document()?;
        document.recovery = set_recovery(&document.recovery, &self.prefix, entries);
        self.save(&document)?;
        tracing::info!(key = %self.key, prefix = %self.prefix, entries = entries.len(), "Recovery log replaced");
        Ok(())
    }

    fn fetch(&self) -> SettingsResult<Stored> {
        let Some(text) = self.store.get(&self.key)? else {
            return Ok(Stored::Missing);
        };
        match serde_json::from_str::<StorageDocument>(&text) {
            Ok(document) => Ok(Stored::Document(document)),
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "Stored document is not valid JSON");
                Ok(Stored::Corrupt(text))
            }
        }
    }

    /// The stored document, or an empty one when missing or corrupt.
    pub fn document(&self) -> SettingsResult<StorageDocument> {
        Ok(match self.fetch()? {
            Stored::Document(document) => document,
            Stored::Missing | Stored::Corrupt(_) => StorageDocument::default(),
        })
    }

    fn save(&self, document: &StorageDocument) -> SettingsResult<()> {
        self.store.set(&self.key, serde_json::to_string(document)?)
    }

    fn read_slot(&self) -> SettingsResult<Value> {
        Ok(match self.fetch()? {
            Stored::Missing => Value::Null,
            Stored::Document(mut document) => document.settings.remove(&self.prefix).unwrap_or(Value::Null),
            Stored::Corrupt(text) => Value::String(text),
        })
    }

    fn record_rejected(&self, raw: &Value) -> SettingsResult<String> {
        let text = serde_json::to_string(raw)?;
        let mut document = self.document()?;
        let key = append_recovery(&mut document.recovery, &self.prefix, Utc::now(), text);
        self.save(&document)?;
        Ok(key)
    }
}

impl<S: KeyValueStore> StorageBackend<Namespaced<S>> {
    /// Backend for the configured key and prefix, inside `storage.namespace`.
    pub fn from_config(store: S, config: &StorageConfig) -> Self {
        Self::new(
            Namespaced::new(config.namespace.clone(), store),
            config.key.clone(),
            config.prefix.clone(),
        )
    }
}

impl<T, S> SettingsBackend<T> for StorageBackend<S>
where
    T: Serialize + FailureMarker + Send + Sync + 'static,
    S: KeyValueStore,
{
    fn name(&self) -> &'static str {
        "storage"
    }

    fn read(&self) -> BoxFuture<'_, SettingsResult<Value>> {
        let result = self.read_slot();
        async move { result }.boxed()
    }

    fn write(&self, cell: SnapshotCell<T>) -> BoxFuture<'_, SettingsResult<()>> {
        async move {
            let value = cell.current()?;
            let mut document = self.document()?;
            document.settings.insert(self.prefix.clone(), serde_json::to_value(&*value)?);
            self.save(&document)?;
            tracing::debug!(key = %self.key, prefix = %self.prefix, "Settings written to storage");
            Ok(())
        }
        .boxed()
    }

    fn on_invalid_data<'a>(&'a self, raw: &'a Value, mut fixed: T) -> BoxFuture<'a, SettingsResult<T>> {
        async move {
            if raw.is_null() {
                tracing::debug!(key = %self.key, prefix = %self.prefix, "No stored settings, using defaults");
                return Ok(fixed);
            }
            let entry = self.record_rejected(raw)?;
            tracing::warn!(key = %self.key, entry = %entry, "Rejected settings saved to recovery log");
            self.notifier.notify(
                &Notice::malformed_data("storage", &format!("{}/{}", self.key, self.prefix))
                    .arg("entry", entry),
            );
            fixed.mark_failed();
            Ok(fixed)
        }
        .boxed()
    }
}
