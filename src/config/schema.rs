//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML files and
//! every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

use crate::events::lock::DEFAULT_MAX_PENDING;

/// Root configuration for a settings store.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct StoreConfig {
    /// Change emitter settings.
    pub emitter: EmitterConfig,

    /// Write behaviour.
    pub persistence: PersistenceConfig,

    /// Key-value storage location.
    pub storage: StorageConfig,

    /// Host-integrated persistence.
    pub host: HostConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Change emitter configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EmitterConfig {
    /// Name of the emission lock (shows up in errors and logs).
    pub lock_name: String,

    /// Maximum emissions waiting for the lock before emit fails.
    pub max_pending: usize,
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            lock_name: "settings".to_string(),
            max_pending: DEFAULT_MAX_PENDING,
        }
    }
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PersistenceConfig {
    /// Debounce window for host saves in milliseconds.
    pub debounce_ms: u64,

    /// Persist after every mutation.
    pub write_on_mutate: bool,

    /// Persist once after the initial load to normalize stored data.
    pub heal_on_load: bool,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 500,
            write_on_mutate: true,
            heal_on_load: true,
        }
    }
}

/// Key-value storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Namespace prepended to the key, usually the host's context id.
    pub namespace: String,

    /// Physical key shared by every manager of this document.
    pub key: String,

    /// This manager's slot and recovery prefix.
    pub prefix: String,

    /// File backing the store (`FileStore`); in-memory when unset.
    pub path: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            namespace: String::new(),
            key: "settings".to_string(),
            prefix: "settings.".to_string(),
            path: None,
        }
    }
}

/// Host persistence configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// Path of the host data file (`JsonFileHost`).
    pub data_path: String,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            data_path: "data.json".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Record counters through the `metrics` facade.
    pub metrics_enabled: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
        }
    }
}
