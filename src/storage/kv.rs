//! Key-value stores holding opaque string blobs.
//!
//! # Responsibilities
//! - Get and replace whole blobs by key
//! - Provide in-memory, file-backed and namespaced variants
//!
//! # Design Decisions
//! - Only whole-value replacement; there are no partial updates
//! - `FileStore` re-reads the file on every `get`, so external edits are seen
//! - `FileStore` writes through a temp file and rename

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use uuid::Uuid;

use crate::settings::types::{SettingsError, SettingsResult};

/// A simple key-value store of opaque strings.
pub trait KeyValueStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> SettingsResult<Option<String>>;

    /// Replace the whole value stored under `key`.
    fn set(&self, key: &str, value: String) -> SettingsResult<()>;
}

impl<S: KeyValueStore> KeyValueStore for Arc<S> {
    fn get(&self, key: &str) -> SettingsResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: String) -> SettingsResult<()> {
        (**self).set(key, value)
    }
}

/// In-memory store. Clones share the same map.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> SettingsResult<Option<String>> {
        Ok(self.inner.get(key).map(|r| r.value().clone()))
    }

    fn set(&self, key: &str, value: String) -> SettingsResult<()> {
        self.inner.insert(key.to_string(), value);
        Ok(())
    }
}

/// Store persisted as one JSON object in a file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_map(&self) -> SettingsResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let file = File::open(&self.path)
            .map_err(|e| SettingsError::Read(format!("{}: {}", self.path.display(), e)))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| SettingsError::Read(format!("{}: {}", self.path.display(), e)))
    }

    fn save_map(&self, map: &BTreeMap<String, String>) -> SettingsResult<()> {
        let persistence = |e: std::io::Error| {
            SettingsError::Persistence(format!("{}: {}", self.path.display(), e))
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(persistence)?;
        }
        let tmp = self.path.with_extension(format!("tmp-{}", Uuid::new_v4()));
        {
            let file = File::create(&tmp).map_err(persistence)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, map)?;
            writer.flush().map_err(persistence)?;
        }
        fs::rename(&tmp, &self.path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            persistence(e)
        })?;
        tracing::debug!(path = %self.path.display(), keys = map.len(), "Saved store file");
        Ok(())
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> SettingsResult<Option<String>> {
        Ok(self.load_map()?.remove(key))
    }

    fn set(&self, key: &str, value: String) -> SettingsResult<()> {
        let _guard = self.write_lock.lock().expect("file store mutex poisoned");
        // An unreadable file holds other keys too; leave it for the user to repair.
        let mut map = self.load_map().inspect_err(|e| {
            tracing::error!(path = %self.path.display(), error = %e, "Store file unreadable, refusing to overwrite");
        })?;
        map.insert(key.to_string(), value);
        self.save_map(&map)
    }
}

/// Prefixes every key with a namespace, e.g. the host's context id.
#[derive(Debug, Clone)]
pub struct Namespaced<S> {
    namespace: String,
    inner: S,
}

impl<S> Namespaced<S> {
    pub fn new(namespace: impl Into<String>, inner: S) -> Self {
        Self {
            namespace: namespace.into(),
            inner,
        }
    }

    pub fn physical_key(&self, key: &str) -> String {
        namespaced_key(&self.namespace, key)
    }
}

impl<S: KeyValueStore> KeyValueStore for Namespaced<S> {
    fn get(&self, key: &str) -> SettingsResult<Option<String>> {
        self.inner.get(&self.physical_key(key))
    }

    fn set(&self, key: &str, value: String) -> SettingsResult<()> {
        self.inner.set(&self.physical_key(key), value)
    }
}

/// Physical key for `key` under `namespace`. An empty namespace leaves the key as is.
pub fn namespaced_key(namespace: &str, key: &str) -> String {
    if namespace.is_empty() {
        key.to_string()
    } else {
        format!("{namespace}:{key}")
    }
}
