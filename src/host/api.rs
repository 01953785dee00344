//! Host persistence seam.

use std::path::{Path, PathBuf};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde_json::Value;
use uuid::Uuid;

use crate::config::schema::HostConfig;
use crate::settings::types::{SettingsError, SettingsResult};

/// Opaque asynchronous load/save pair provided by the host application.
pub trait HostApi: Send + Sync + 'static {
    /// Load the persisted data; `Value::Null` when nothing was saved yet.
    fn load_data(&self) -> BoxFuture<'_, SettingsResult<Value>>;

    /// Replace the persisted data.
    fn save_data(&self, data: Value) -> BoxFuture<'_, SettingsResult<()>>;
}

/// Host storage in a single JSON file, the way plugin hosts keep `data.json`.
#[derive(Debug, Clone)]
pub struct JsonFileHost {
    path: PathBuf,
}

impl JsonFileHost {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn from_config(config: &HostConfig) -> Self {
        Self::new(config.data_path.clone())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl HostApi for JsonFileHost {
    fn load_data(&self) -> BoxFuture<'_, SettingsResult<Value>> {
        async move {
            let text = match tokio::fs::read_to_string(&self.path).await {
                Ok(text) => text,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Value::Null),
                Err(e) => {
                    return Err(SettingsError::Read(format!("{}: {}", self.path.display(), e)))
                }
            };
            serde_json::from_str(&text)
                .map_err(|e| SettingsError::Read(format!("{}: {}", self.path.display(), e)))
        }
        .boxed()
    }

    fn save_data(&self, data: Value) -> BoxFuture<'_, SettingsResult<()>> {
        async move {
            let persistence =
                |e: std::io::Error| SettingsError::Persistence(format!("{}: {}", self.path.display(), e));

            let text = serde_json::to_string_pretty(&data)?;
            if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(parent).await.map_err(persistence)?;
            }
            let tmp = self.path.with_extension(format!("tmp-{}", Uuid::new_v4()));
            tokio::fs::write(&tmp, text).await.map_err(persistence)?;
            if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
                let _ = tokio::fs::remove_file(&tmp).await;
                return Err(persistence(e));
            }
            Ok(())
        }
        .boxed()
    }
}
