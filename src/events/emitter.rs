//! Minimal async pub/sub primitive.
//!
//! # Responsibilities
//! - Register and unregister listeners
//! - Deliver one event at a time to a snapshot of the listeners
//! - Isolate listener failures from the emitter's own lock
//!
//! # Design Decisions
//! - Listeners keyed by a monotonically increasing id, so a `BTreeMap`
//!   iterates in registration order
//! - All snapshotted listeners run concurrently; every one is awaited before
//!   the lock is released, even after a failure
//! - The first failure to complete is reported to the caller

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, Weak};

use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;

use crate::events::lock::{EmitLock, DEFAULT_MAX_PENDING};
use crate::events::types::{EmitError, ListenerError};
use crate::observability::metrics;

/// A registered listener.
pub type Listener<A> = Arc<dyn Fn(A) -> BoxFuture<'static, Result<(), ListenerError>> + Send + Sync>;

type ListenerMap<A> = Mutex<BTreeMap<u64, Listener<A>>>;

/// Broadcasts events of shape `A` to registered listeners.
pub struct EventEmitter<A> {
    listeners: Arc<ListenerMap<A>>,
    next_id: AtomicU64,
    lock: EmitLock,
}

impl<A> EventEmitter<A>
where
    A: Clone + Send + 'static,
{
    /// Create an emitter whose lock is called `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_bound(name, DEFAULT_MAX_PENDING)
    }

    /// Create an emitter with an explicit pending-emission bound.
    pub fn with_bound(name: impl Into<String>, max_pending: usize) -> Self {
        Self {
            listeners: Arc::new(Mutex::new(BTreeMap::new())),
            next_id: AtomicU64::new(0),
            lock: EmitLock::new(name, max_pending),
        }
    }

    /// Register an async listener.
    pub fn listen<F, Fut>(&self, listener: F) -> Unregister
    where
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        self.insert(Arc::new(move |args| listener(args).boxed()))
    }

    /// Register a synchronous listener.
    pub fn listen_sync<F>(&self, listener: F) -> Unregister
    where
        F: Fn(A) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.insert(Arc::new(move |args| {
            let result = listener(args);
            async move { result }.boxed()
        }))
    }

    fn insert(&self, listener: Listener<A>) -> Unregister {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.listeners
            .lock()
            .expect("listener map mutex poisoned")
            .insert(id, listener);

        let weak: Weak<ListenerMap<A>> = Arc::downgrade(&self.listeners);
        Unregister::new(move || {
            if let Some(listeners) = weak.upgrade() {
                listeners
                    .lock()
                    .expect("listener map mutex poisoned")
                    .remove(&id);
            }
        })
    }

    /// Number of currently registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.lock().expect("listener map mutex poisoned").len()
    }

    /// Deliver `args` to every listener registered at the time the lock is
    /// acquired.
    pub async fn emit(&self, args: A) -> Result<(), EmitError> {
        let _guard = self.lock.acquire().await?;

        let snapshot: Vec<Listener<A>> = self
            .listeners
            .lock()
            .expect("listener map mutex poisoned")
            .values()
            .cloned()
            .collect();

        let mut running: FuturesUnordered<_> = snapshot
            .iter()
            .map(|listener| listener(args.clone()))
            .collect();

        let mut first_error = None;
        while let Some(result) = running.next().await {
            if let Err(e) = result {
                tracing::warn!(emitter = %self.lock.name(), error = %e, "Listener failed");
                first_error.get_or_insert(e);
            }
        }

        metrics::record_event_emitted(self.lock.name());
        match first_error {
            Some(e) => {
                metrics::record_emit_failure("listener");
                Err(EmitError::Listener(e.to_string()))
            }
            None => Ok(()),
        }
    }
}

/// Handle returned by `listen`; removes exactly that listener.
pub struct Unregister {
    action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl Unregister {
    pub(crate) fn new(action: impl FnOnce() + Send + 'static) -> Self {
        Self {
            action: Mutex::new(Some(Box::new(action))),
        }
    }

    /// Remove the listener. Calling this again is a no-op.
    pub fn unregister(&self) {
        let action = self.action.lock().expect("unregister mutex poisoned").take();
        if let Some(action) = action {
            action();
        }
    }
}

impl std::fmt::Debug for Unregister {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let active = self
            .action
            .lock()
            .map(|a| a.is_some())
            .unwrap_or(false);
        f.debug_struct("Unregister").field("active", &active).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    #[tokio::test]
    async fn test_listeners_fire_in_registration_order() {
        let emitter = EventEmitter::<u32>::new("order");
        let seen = Arc::new(Mutex::new(Vec::new()));
        for tag in ["a", "b", "c"] {
            let seen = seen.clone();
            emitter.listen_sync(move |n| {
                seen.lock().unwrap().push(format!("{tag}{n}"));
                Ok(())
            });
        }

        emitter.emit(1).await.unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["a1", "b1", "c1"]);
    }

    #[tokio::test]
    async fn test_unregister_is_idempotent() {
        let emitter = EventEmitter::<()>::new("unregister");
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let first = emitter.listen_sync(move |_| {
            h.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let h = hits.clone();
        let _second = emitter.listen_sync(move |_| {
            h.fetch_add(10, Ordering::SeqCst);
            Ok(())
        });

        first.unregister();
        first.unregister();
        assert_eq!(emitter.listener_count(), 1);

        emitter.emit(()).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn test_failing_listener_does_not_block_later_emits() {
        let emitter = EventEmitter::<u32>::new("failing");
        emitter.listen_sync(|_| Err("listener A failed".into()));
        let b_calls = Arc::new(AtomicUsize::new(0));
        let b = b_calls.clone();
        emitter.listen_sync(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let err = emitter.emit(1).await.unwrap_err();
        assert_eq!(err, EmitError::Listener("listener A failed".into()));
        assert_eq!(b_calls.load(Ordering::SeqCst), 1);

        assert!(emitter.emit(2).await.is_err());
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_listeners_run_concurrently() {
        let emitter = EventEmitter::<()>::new("concurrent");
        for _ in 0..3 {
            emitter.listen(|_| async {
                tokio::time::sleep(Duration::from_millis(100)).await;
                Ok::<(), ListenerError>(())
            });
        }

        let started = tokio::time::Instant::now();
        emitter.emit(()).await.unwrap();
        assert!(started.elapsed() < Duration::from_millis(200));
    }

    #[tokio::test]
    async fn test_listener_added_during_emit_is_skipped() {
        let emitter = Arc::new(EventEmitter::<()>::new("late"));
        let late_hits = Arc::new(AtomicUsize::new(0));

        let weak = Arc::downgrade(&emitter);
        let hits = late_hits.clone();
        emitter.listen_sync(move |_| {
            if let Some(emitter) = weak.upgrade() {
                let hits = hits.clone();
                // Registered mid-emission; must wait for the next emit.
                let _ = emitter.listen_sync(move |_| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
            Ok(())
        });

        emitter.emit(()).await.unwrap();
        assert_eq!(late_hits.load(Ordering::SeqCst), 0);

        emitter.emit(()).await.unwrap();
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_emit_saturates_behind_slow_listener() {
        let emitter = EventEmitter::<u32>::with_bound("busy", 1);
        let release = Arc::new(tokio::sync::Notify::new());
        let r = release.clone();
        let _listener = emitter.listen(move |_| {
            let r = r.clone();
            async move {
                r.notified().await;
                Ok::<(), ListenerError>(())
            }
        });

        let mut holder = Box::pin(emitter.emit(1));
        assert!(futures_util::poll!(&mut holder).is_pending());
        let mut queued = Box::pin(emitter.emit(2));
        assert!(futures_util::poll!(&mut queued).is_pending());

        assert_eq!(
            emitter.emit(3).await,
            Err(EmitError::LockSaturation { name: "busy".into(), bound: 1 })
        );

        release.notify_one();
        holder.await.unwrap();
        release.notify_one();
        queued.await.unwrap();
    }
}
