//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (queue bound, debounce window)
//! - Check storage identifiers are usable
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: StoreConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::StoreConfig;

/// Longest accepted debounce window.
pub const MAX_DEBOUNCE_MS: u64 = 60_000;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, collecting every error.
pub fn validate_config(config: &StoreConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.emitter.max_pending == 0 {
        errors.push(ValidationError::new("emitter.max_pending", "must be at least 1"));
    }
    if config.emitter.lock_name.trim().is_empty() {
        errors.push(ValidationError::new("emitter.lock_name", "must not be empty"));
    }
    if config.persistence.debounce_ms > MAX_DEBOUNCE_MS {
        errors.push(ValidationError::new(
            "persistence.debounce_ms",
            format!("must not exceed {MAX_DEBOUNCE_MS}"),
        ));
    }
    if config.storage.key.trim().is_empty() {
        errors.push(ValidationError::new("storage.key", "must not be empty"));
    }
    if config.storage.prefix.is_empty() {
        // The prefix also names the settings slot.
        errors.push(ValidationError::new("storage.prefix", "must not be empty"));
    }
    if config.storage.namespace.contains(':') {
        errors.push(ValidationError::new("storage.namespace", "must not contain ':'"));
    }
    if config.host.data_path.trim().is_empty() {
        errors.push(ValidationError::new("host.data_path", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
