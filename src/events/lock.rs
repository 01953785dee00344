//! Named async lock with a bounded pending queue.
//!
//! # Responsibilities
//! - Serialize emissions of one emitter
//! - Reject acquisitions once too many callers are already waiting
//!
//! # Design Decisions
//! - `tokio::sync::Mutex` is fair, so waiters acquire in arrival order
//! - The pending count is tracked by an RAII guard, so a caller that gives up
//!   while waiting still frees its queue slot

use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, MutexGuard};

use crate::events::types::EmitError;
use crate::observability::metrics;

/// Default bound on pending acquisitions.
pub const DEFAULT_MAX_PENDING: usize = 1000;

/// A named mutual-exclusion lock with a bounded pending queue.
#[derive(Debug)]
pub struct EmitLock {
    name: String,
    max_pending: usize,
    pending: AtomicUsize,
    inner: Mutex<()>,
}

impl EmitLock {
    /// Create a new lock. `max_pending` is clamped to at least 1.
    pub fn new(name: impl Into<String>, max_pending: usize) -> Self {
        Self {
            name: name.into(),
            max_pending: max_pending.max(1),
            pending: AtomicUsize::new(0),
            inner: Mutex::new(()),
        }
    }

    /// Name used in errors and logs.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of callers currently waiting for the lock.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Acquire the lock, waiting behind earlier callers.
    ///
    /// Fails with [`EmitError::LockSaturation`] when `max_pending` callers are
    /// already queued.
    pub async fn acquire(&self) -> Result<MutexGuard<'_, ()>, EmitError> {
        let ticket = self.enqueue()?;
        let guard = self.inner.lock().await;
        drop(ticket);
        Ok(guard)
    }

    fn enqueue(&self) -> Result<PendingTicket<'_>, EmitError> {
        let mut current = self.pending.load(Ordering::Acquire);
        loop {
            if current >= self.max_pending {
                tracing::warn!(lock = %self.name, bound = self.max_pending, "Lock saturated");
                metrics::record_emit_failure("lock_saturation");
                return Err(EmitError::LockSaturation {
                    name: self.name.clone(),
                    bound: self.max_pending,
                });
            }
            match self.pending.compare_exchange_weak(
                current, current + 1, Ordering::AcqRel, Ordering::Acquire
            ) {
                Ok(_) => break,
                Err(x) => current = x,
            }
        }
        Ok(PendingTicket { lock: self })
    }
}

/// Holds one pending slot until dropped.
struct PendingTicket<'a> {
    lock: &'a EmitLock,
}

impl Drop for PendingTicket<'_> {
    fn drop(&mut self) {
        self.lock.pending.fetch_sub(1, Ordering::AcqRel);
    }
}
