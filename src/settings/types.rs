//! Settings types and error definitions.

use std::sync::Arc;
use thiserror::Error;

use crate::events::EmitError;

/// Errors that can occur during settings operations.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    /// The snapshot was accessed outside the `Loaded` state.
    #[error("Settings not loaded")]
    NotLoaded,

    /// Raw input failed the fixer's structural check.
    #[error("Malformed settings data: {0}")]
    MalformedData(String),

    /// The change event could not be delivered.
    #[error(transparent)]
    Emit(#[from] EmitError),

    /// The backing store could not be read.
    #[error("Read failed: {0}")]
    Read(String),

    /// The underlying write primitive rejected the write.
    #[error("Persistence failed: {0}")]
    Persistence(String),

    /// A value could not be converted to or from JSON.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for SettingsError {
    fn from(e: serde_json::Error) -> Self {
        SettingsError::Serialization(e.to_string())
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;

/// Lifecycle state of a settings manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Unloaded,
    Loading,
    Loaded,
}

/// Payload of every change event.
#[derive(Debug)]
pub struct ChangeEvent<T> {
    /// Snapshot that was just installed.
    pub current: Arc<T>,
    /// Snapshot it replaced, `None` for the first install of a load cycle.
    pub previous: Option<Arc<T>>,
}

impl<T> Clone for ChangeEvent<T> {
    fn clone(&self) -> Self {
        Self {
            current: self.current.clone(),
            previous: self.previous.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(SettingsError::NotLoaded.to_string(), "Settings not loaded");

        let err = SettingsError::from(EmitError::Listener("boom".into()));
        assert_eq!(err.to_string(), "Listener failed: boom");

        let json_err = serde_json::from_str::<u32>("nope").unwrap_err();
        assert!(matches!(
            SettingsError::from(json_err),
            SettingsError::Serialization(_)
        ));
    }
}
