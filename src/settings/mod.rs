//! Reactive settings core.
//!
//! # Data Flow
//! ```text
//! backend.read() (raw serde_json::Value)
//!     → fixer.rs (coerce to T, report validity)
//!     → backend.on_invalid_data() if the input needed repair
//!     → manager.rs installs Arc<T> in the snapshot cell
//!     → events emitter broadcasts ChangeEvent
//!     → subscription.rs compares projections, fires callbacks
//!     → backend.write() persists
//! ```
//!
//! # Design Decisions
//! - Snapshots are immutable `Arc<T>`; every change installs a new one
//! - Untyped data stops at the fixer
//! - Concrete persistence lives behind the `SettingsBackend` trait

pub mod backend;
pub mod fixer;
pub mod gate;
pub mod manager;
pub mod subscription;
pub mod types;

pub use backend::{SettingsBackend, SnapshotCell};
pub use fixer::{fix_array, fix_field, fix_in_set, mark_fixed, Fixed, Fixer};
pub use manager::{ManagerOptions, SettingsManager};
pub use types::{ChangeEvent, LoadState, SettingsError, SettingsResult};
