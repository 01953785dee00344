//! Projection-keyed change subscriptions.
//!
//! # Responsibilities
//! - Track the last observed projection of the settings
//! - Fire the callback only when the projection actually changes
//!
//! # Design Decisions
//! - Equality is `PartialEq` on the projected value
//! - A subscription's first observation, with nothing to compare against,
//!   only records the value

use std::future::Future;
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use futures_util::FutureExt;

use crate::events::ListenerError;
use crate::settings::types::ChangeEvent;

/// Projection, last observed value, and callback of one subscription.
pub struct Subscription<T, V, P, C> {
    projection: P,
    last: Mutex<Option<V>>,
    callback: C,
    _settings: std::marker::PhantomData<fn(&T)>,
}

impl<T, V, P, C, Fut> Subscription<T, V, P, C>
where
    T: Send + Sync + 'static,
    V: PartialEq + Clone + Send + Sync + 'static,
    P: Fn(&T) -> V + Send + Sync + 'static,
    C: Fn(V, V, Arc<T>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
{
    /// Create a subscription, seeding the last observed value from `initial` if present.
    pub fn new(projection: P, callback: C, initial: Option<&T>) -> Self {
        let last = initial.map(&projection);
        Self {
            projection,
            last: Mutex::new(last),
            callback,
            _settings: std::marker::PhantomData,
        }
    }

    /// Compare the projection of the new snapshot with the last one observed.
    /// Returns the callback future when it changed.
    pub fn observe(&self, event: ChangeEvent<T>) -> BoxFuture<'static, Result<(), ListenerError>> {
        let current = (self.projection)(&event.current);
        let previous = {
            let mut last = self.last.lock().expect("subscription mutex poisoned");
            let previous = match last.take() {
                Some(v) => Some(v),
                None => event.previous.as_deref().map(&self.projection),
            };
            *last = Some(current.clone());
            previous
        };

        match previous {
            Some(previous) if previous != current => {
                (self.callback)(current, previous, event.current).boxed()
            }
            _ => async { Ok::<(), ListenerError>(()) }.boxed(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug)]
    struct Pair {
        a: u32,
        b: u32,
    }

    fn event(current: Pair, previous: Option<Pair>) -> ChangeEvent<Pair> {
        ChangeEvent {
            current: Arc::new(current),
            previous: previous.map(Arc::new),
        }
    }

    #[tokio::test]
    async fn test_fires_only_on_projection_change() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = Subscription::new(
            |p: &Pair| p.a,
            move |cur, prev, _| {
                assert_ne!(cur, prev);
                h.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), ListenerError>(()) }
            },
            Some(&Pair { a: 1, b: 0 }),
        );

        sub.observe(event(Pair { a: 1, b: 5 }, None)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        sub.observe(event(Pair { a: 2, b: 5 }, None)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);

        sub.observe(event(Pair { a: 2, b: 6 }, None)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_observation_uses_previous_or_records() {
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        let sub = Subscription::new(
            |p: &Pair| p.b,
            move |_, _, _| {
                h.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), ListenerError>(()) }
            },
            None,
        );

        // Nothing to compare against: record only.
        sub.observe(event(Pair { a: 0, b: 1 }, None)).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 0);

        sub.observe(event(Pair { a: 0, b: 2 }, Some(Pair { a: 0, b: 1 }))).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
