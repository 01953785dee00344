//! Reactive settings store for host-application plugins.
//!
//! # Architecture Overview
//!
//! ```text
//!   UI / commands
//!        │ mutate / read / write / on_mutate
//!        ▼
//!  ┌──────────────────────────────────────────────┐
//!  │              SettingsManager<T, B>            │
//!  │  fixer ─▶ snapshot cell (Arc<T>) ─▶ emitter   │
//!  │                    │                 │        │
//!  │                    ▼                 ▼        │
//!  │           SettingsBackend      subscriptions  │
//!  └────────────────────┼─────────────────────────┘
//!            ┌──────────┴───────────┐
//!            ▼                      ▼
//!   StorageBackend<S>          HostBackend<H>
//!   key-value document         debounced host saves
//!   + prefixed recovery log
//! ```

// Core subsystems
pub mod events;
pub mod settings;

// Persistence backends
pub mod host;
pub mod storage;

// Cross-cutting concerns
pub mod config;
pub mod notice;
pub mod observability;

pub use config::schema::StoreConfig;
pub use settings::{Fixed, Fixer, SettingsError, SettingsManager, SettingsResult};
pub use host::HostSettingsManager;
pub use storage::StorageSettingsManager;
