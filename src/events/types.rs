//! Emitter error definitions.

use thiserror::Error;

/// Error returned by a listener.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Errors that can occur while emitting an event.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EmitError {
    /// Too many emissions are already waiting on the lock.
    #[error("Lock '{name}' saturated: more than {bound} pending acquisitions")]
    LockSaturation { name: String, bound: usize },

    /// A listener failed while handling the event.
    #[error("Listener failed: {0}")]
    Listener(String),
}
