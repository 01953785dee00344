//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → StoreConfig (validated, immutable)
//!     → ManagerOptions / backend constructors
//!
//! On external edit of a store file:
//!     watcher.rs detects change
//!     → owner calls SettingsManager::read()
//!     → fixed snapshot swapped in
//!     → subscribers observe the new settings
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use schema::StoreConfig;
pub use schema::{EmitterConfig, HostConfig, ObservabilityConfig, PersistenceConfig, StorageConfig};
