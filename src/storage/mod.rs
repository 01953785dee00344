//! Storage-backed settings.
//!
//! # Data Flow
//! ```text
//! KeyValueStore (kv.rs, opaque string blobs)
//!     → backend.rs parses the shared document, selects the prefix slot
//!     → settings manager fixes and installs it
//!
//! Rejected payloads:
//!     → recovery.rs appends "<prefix><timestamp>" → raw text
//!     → document written back under the same key
//! ```
//!
//! # Design Decisions
//! - Several managers share one physical key, each owning a prefix
//! - Recovery entries are only appended automatically; bulk replacement
//!   is an explicit user action

pub mod backend;
pub mod kv;
pub mod recovery;

pub use backend::{FailureMarker, StorageBackend, StorageDocument, StorageSettingsManager};
pub use kv::{FileStore, KeyValueStore, MemoryStore, Namespaced};
pub use recovery::{get_recovery, set_recovery, RecoveryLog};
