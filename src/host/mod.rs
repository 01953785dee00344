//! Host-integrated settings.
//!
//! # Data Flow
//! ```text
//! HostApi::load_data (api.rs)
//!     → settings manager fixes and installs
//!     → one healing write right after load
//!
//! write() calls
//!     → debounce.rs collapses calls within the window
//!     → window closes: current snapshot serialized
//!     → HostApi::save_data, result shared by every caller
//! ```
//!
//! # Design Decisions
//! - The snapshot is read when the window closes, not when write() is called
//! - Failed saves are returned to every waiting caller and never retried

pub mod api;
pub mod backend;
pub mod debounce;

pub use api::{HostApi, JsonFileHost};
pub use backend::{HostBackend, HostSettingsManager, DEFAULT_DEBOUNCE};
pub use debounce::Debouncer;
