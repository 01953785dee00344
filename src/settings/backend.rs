//! Backend seam implemented by concrete settings managers.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use futures_util::future::BoxFuture;
use serde_json::Value;

use crate::settings::types::{SettingsError, SettingsResult};

/// Shared handle to a manager's current snapshot.
///
/// The snapshot is only ever replaced as a whole, never edited in place.
#[derive(Debug)]
pub struct SnapshotCell<T> {
    inner: Arc<ArcSwapOption<T>>,
}

impl<T> SnapshotCell<T> {
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(ArcSwapOption::empty()),
        }
    }

    /// Current snapshot, if any.
    pub fn load(&self) -> Option<Arc<T>> {
        self.inner.load_full()
    }

    /// Current snapshot or [`SettingsError::NotLoaded`].
    pub fn current(&self) -> SettingsResult<Arc<T>> {
        self.load().ok_or(SettingsError::NotLoaded)
    }

    /// Swap in `value`, returning the snapshot it replaced.
    pub fn replace(&self, value: Option<Arc<T>>) -> Option<Arc<T>> {
        self.inner.swap(value)
    }
}

impl<T> Clone for SnapshotCell<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// Backing store of a [`SettingsManager`](crate::settings::SettingsManager).
pub trait SettingsBackend<T>: Send + Sync + 'static {
    /// Short label for logs and metrics.
    fn name(&self) -> &'static str;

    /// Fetch the raw, untrusted settings data.
    fn read(&self) -> BoxFuture<'_, SettingsResult<Value>>;

    /// Persist the snapshot held by `cell`.
    ///
    /// Implementations decide when the cell is read, so a delayed write
    /// persists whatever is current at that moment.
    fn write(&self, cell: SnapshotCell<T>) -> BoxFuture<'_, SettingsResult<()>>;

    /// Called when the fixer rejected `raw`. Returns the value to install.
    fn on_invalid_data<'a>(&'a self, raw: &'a Value, fixed: T) -> BoxFuture<'a, SettingsResult<T>>;
}
