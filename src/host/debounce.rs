//! Trailing-edge debounce with a shared result.
//!
//! # Responsibilities
//! - Collapse calls made within one window into a single action
//! - Give every caller of a window the same result
//!
//! # Design Decisions
//! - Each call pushes the deadline to `now + window`
//! - The window closes before the action runs, so a call made while the
//!   action is in flight opens a new window
//! - The shared future is spawned, so the action runs even if every caller
//!   drops its future

use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use futures_util::FutureExt;
use tokio::time::Instant;

use crate::observability::metrics;
use crate::settings::types::SettingsResult;

/// Result shared by every caller of one window.
pub type SharedResult = Shared<BoxFuture<'static, SettingsResult<()>>>;

struct Window {
    deadline: Instant,
    pending: SharedResult,
}

type Slot = Arc<Mutex<Option<Window>>>;

/// Coalesces calls made within a fixed window.
pub struct Debouncer {
    window: Duration,
    slot: Slot,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            slot: Arc::new(Mutex::new(None)),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// True while a window is open.
    pub fn is_pending(&self) -> bool {
        self.slot.lock().expect("debounce mutex poisoned").is_some()
    }

    /// Schedule `action` for when the window closes.
    ///
    /// If a window is already open, `action` is dropped, the deadline is
    /// pushed back and the caller joins the pending result.
    pub fn call<F, Fut>(&self, action: F) -> SharedResult
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = SettingsResult<()>> + Send + 'static,
    {
        let mut slot = self.slot.lock().expect("debounce mutex poisoned");
        let deadline = Instant::now() + self.window;

        if let Some(open) = slot.as_mut() {
            open.deadline = deadline;
            metrics::record_debounce_coalesced();
            return open.pending.clone();
        }

        let timer_slot = self.slot.clone();
        let pending = async move {
            wait_for_close(&timer_slot).await;
            action().await
        }
        .boxed()
        .shared();

        *slot = Some(Window {
            deadline,
            pending: pending.clone(),
        });
        tokio::spawn(pending.clone());
        pending
    }
}

/// Sleep until the window's deadline stops moving, then close the window.
async fn wait_for_close(slot: &Slot) {
    loop {
        let deadline = match slot.lock().expect("debounce mutex poisoned").as_ref() {
            Some(open) => open.deadline,
            None => return,
        };
        tokio::time::sleep_until(deadline).await;

        let mut guard = slot.lock().expect("debounce mutex poisoned");
        let closed = guard
            .as_ref()
            .map_or(true, |open| open.deadline <= Instant::now());
        if closed {
            *guard = None;
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::types::SettingsError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce() -> BoxFuture<'static, SettingsResult<()>> {
        let counter = counter.clone();
        move || {
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_calls_in_window_coalesce() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));

        let a = debouncer.call(counting(&runs));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let b = debouncer.call(counting(&runs));
        tokio::time::sleep(Duration::from_millis(50)).await;
        let c = debouncer.call(counting(&runs));
        assert!(debouncer.is_pending());

        let (ra, rb, rc) = tokio::join!(a, b, c);
        assert!(ra.is_ok() && rb.is_ok() && rc.is_ok());
        assert_eq!(runs.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_moves_with_each_call() {
        let debouncer = Debouncer::new(Duration::from_millis(100));
        let runs = Arc::new(AtomicUsize::new(0));
        let started = Instant::now();

        let first = debouncer.call(counting(&runs));
        tokio::time::sleep(Duration::from_millis(80)).await;
        let _second = debouncer.call(counting(&runs));

        first.await.unwrap();
        assert!(started.elapsed() >= Duration::from_millis(180));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_separate_windows_run_separately() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let runs = Arc::new(AtomicUsize::new(0));

        debouncer.call(counting(&runs)).await.unwrap();
        debouncer.call(counting(&runs)).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_shared_by_all_callers() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let fail = || async { Err(SettingsError::Persistence("disk full".into())) };

        let a = debouncer.call(fail);
        let b = debouncer.call(fail);
        let (ra, rb) = tokio::join!(a, b);
        assert_eq!(ra, Err(SettingsError::Persistence("disk full".into())));
        assert_eq!(ra, rb);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runs_when_callers_drop() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let runs = Arc::new(AtomicUsize::new(0));

        drop(debouncer.call(counting(&runs)));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
