//! Settings backend over the host's load/save API.
//!
//! # Responsibilities
//! - Read raw settings through the host
//! - Debounce and coalesce writes into single host saves
//! - Tell the user when stored settings had to be repaired

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use serde::Serialize;
use serde_json::Value;

use crate::config::schema::PersistenceConfig;
use crate::host::api::HostApi;
use crate::host::debounce::Debouncer;
use crate::notice::{LogNotifier, Notice, Notifier};
use crate::settings::backend::{SettingsBackend, SnapshotCell};
use crate::settings::manager::SettingsManager;
use crate::settings::types::SettingsResult;

/// Default debounce window for host saves.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// Backend persisting through a [`HostApi`].
pub struct HostBackend<H> {
    host: Arc<H>,
    debouncer: Debouncer,
    notifier: Arc<dyn Notifier>,
}

/// Settings manager persisted through the host.
pub type HostSettingsManager<T, H> = SettingsManager<T, HostBackend<H>>;

impl<H: HostApi> HostBackend<H> {
    pub fn new(host: H) -> Self {
        Self::with_debounce(host, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(host: H, window: Duration) -> Self {
        Self {
            host: Arc::new(host),
            debouncer: Debouncer::new(window),
            notifier: Arc::new(LogNotifier::default()),
        }
    }

    pub fn from_config(host: H, config: &PersistenceConfig) -> Self {
        Self::with_debounce(host, Duration::from_millis(config.debounce_ms))
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn debounce_window(&self) -> Duration {
        self.debouncer.window()
    }

    /// True while a debounced save is waiting for its window to close.
    pub fn has_pending_write(&self) -> bool {
        self.debouncer.is_pending()
    }
}

impl<T, H> SettingsBackend<T> for HostBackend<H>
where
    T: Serialize + Send + Sync + 'static,
    H: HostApi,
{
    fn name(&self) -> &'static str {
        "host"
    }

    fn read(&self) -> BoxFuture<'_, SettingsResult<Value>> {
        self.host.load_data()
    }

    fn write(&self, cell: SnapshotCell<T>) -> BoxFuture<'_, SettingsResult<()>> {
        let host = self.host.clone();
        self.debouncer
            .call(move || async move {
                // Whatever is current when the window closes.
                let value = cell.current()?;
                let data = serde_json::to_value(&*value)?;
                host.save_data(data).await?;
                tracing::debug!("Settings saved through host");
                Ok(())
            })
            .boxed()
    }

    fn on_invalid_data<'a>(&'a self, _raw: &'a Value, fixed: T) -> BoxFuture<'a, SettingsResult<T>> {
        tracing::warn!("Host settings data malformed, repaired value will be saved");
        self.notifier.notify(&Notice::malformed_data("host", "data"));
        async move { Ok(fixed) }.boxed()
    }
}
