//! Event emission subsystem.
//!
//! # Data Flow
//! ```text
//! emit(args)
//!     → lock.rs (named lock, bounded pending queue)
//!     → emitter.rs snapshots the listener list
//!     → all listeners run concurrently
//!     → every listener future is awaited, lock released
//!     → first listener failure (if any) returned to the caller
//! ```
//!
//! # Design Decisions
//! - One emission at a time per emitter, so events are delivered in order
//! - Listener failure never poisons the lock for later emissions
//! - Queueing beyond the bound is an error instead of unbounded growth

pub mod emitter;
pub mod lock;
pub mod types;

pub use emitter::{EventEmitter, Unregister};
pub use lock::EmitLock;
pub use types::{EmitError, ListenerError};
