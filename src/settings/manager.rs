//! Generic settings manager.
//!
//! # Responsibilities
//! - Drive the Unloaded → Loading → Loaded lifecycle
//! - Run untrusted data through the fixer before it becomes a snapshot
//! - Install copy-on-write snapshots and broadcast one event per change
//! - Hand persistence to the backend
//!
//! # State Transitions
//! ```text
//! Unloaded → Loading: load()
//! Loading  → Loaded:  read + fix complete, snapshot installed
//! Loaded   → Unloaded: unload()
//! ```
//!
//! # Design Decisions
//! - Every load cycle has a generation number; work started in an older
//!   cycle can never install a snapshot into a newer one
//! - Mutations clone the snapshot when called and swap when finished, so
//!   overlapping async mutations are last-writer-wins
//! - Load never fails outward; problems are logged

use std::future::Future;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::config::schema::StoreConfig;
use crate::events::lock::DEFAULT_MAX_PENDING;
use crate::events::{EventEmitter, ListenerError, Unregister};
use crate::observability::metrics;
use crate::settings::backend::{SettingsBackend, SnapshotCell};
use crate::settings::fixer::{Fixed, Fixer};
use crate::settings::gate::{Attempt, LoaderGate};
use crate::settings::subscription::Subscription;
use crate::settings::types::{ChangeEvent, LoadState, SettingsError, SettingsResult};

/// Tunables for a [`SettingsManager`].
#[derive(Debug, Clone)]
pub struct ManagerOptions {
    /// Name of the change emitter's lock.
    pub name: String,
    /// Bound on emissions waiting for the emitter lock.
    pub max_pending: usize,
    /// Persist after every successful mutation.
    pub write_on_mutate: bool,
    /// Persist once right after the initial load.
    pub heal_on_load: bool,
}

impl Default for ManagerOptions {
    fn default() -> Self {
        Self {
            name: "settings".to_string(),
            max_pending: DEFAULT_MAX_PENDING,
            write_on_mutate: true,
            heal_on_load: true,
        }
    }
}

impl ManagerOptions {
    pub fn from_config(config: &StoreConfig) -> Self {
        Self {
            name: config.emitter.lock_name.clone(),
            max_pending: config.emitter.max_pending,
            write_on_mutate: config.persistence.write_on_mutate,
            heal_on_load: config.persistence.heal_on_load,
        }
    }
}

struct Lifecycle {
    state: LoadState,
    generation: u64,
    gate: LoaderGate,
}

/// Reactive settings container over a backend `B`.
pub struct SettingsManager<T, B> {
    backend: B,
    fixer: Box<dyn Fixer<T>>,
    cell: SnapshotCell<T>,
    lifecycle: Mutex<Lifecycle>,
    events: EventEmitter<ChangeEvent<T>>,
    options: ManagerOptions,
}

impl<T, B> SettingsManager<T, B>
where
    T: Clone + Send + Sync + 'static,
    B: SettingsBackend<T>,
{
    /// Create an unloaded manager with default options.
    pub fn new(backend: B, fixer: impl Fixer<T>) -> Self {
        Self::with_options(backend, fixer, ManagerOptions::default())
    }

    pub fn with_options(backend: B, fixer: impl Fixer<T>, options: ManagerOptions) -> Self {
        Self {
            backend,
            fixer: Box::new(fixer),
            cell: SnapshotCell::empty(),
            lifecycle: Mutex::new(Lifecycle {
                state: LoadState::Unloaded,
                generation: 0,
                gate: LoaderGate::new(),
            }),
            events: EventEmitter::with_bound(options.name.clone(), options.max_pending),
            options,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn options(&self) -> &ManagerOptions {
        &self.options
    }

    pub fn state(&self) -> LoadState {
        self.lifecycle().state
    }

    pub fn is_loaded(&self) -> bool {
        self.state() == LoadState::Loaded
    }

    /// Current snapshot. Fails with [`SettingsError::NotLoaded`] outside `Loaded`.
    pub fn value(&self) -> SettingsResult<Arc<T>> {
        self.loaded_snapshot().map(|(value, _)| value)
    }

    /// Resolves once the current load cycle has loaded.
    ///
    /// Fails with [`SettingsError::NotLoaded`] if the cycle is unloaded first.
    pub fn on_loaded(&self) -> impl Future<Output = SettingsResult<()>> + Send + 'static {
        self.lifecycle().gate.wait()
    }

    /// Load the settings. Concurrent callers share one load.
    ///
    /// If the caller driving the load drops its future before the snapshot is
    /// installed, the cycle returns to `Unloaded` and a waiting caller takes
    /// over.
    pub async fn load(&self) {
        let generation = loop {
            let step = {
                let mut lifecycle = self.lifecycle();
                match lifecycle.state {
                    LoadState::Unloaded => {
                        lifecycle.state = LoadState::Loading;
                        Ok(lifecycle.generation)
                    }
                    _ => Err(lifecycle.gate.attempt()),
                }
            };
            match step {
                Ok(generation) => break generation,
                Err(attempt) => match attempt.await {
                    Ok(Attempt::Abandoned) => {
                        tracing::debug!(backend = self.backend.name(), "Previous load abandoned, retrying");
                    }
                    Ok(Attempt::Resolved) | Err(_) => return,
                },
            }
        };

        let _guard = LoadGuard {
            lifecycle: &self.lifecycle,
            generation,
            backend: self.backend.name(),
        };
        tracing::debug!(backend = self.backend.name(), generation, "Loading settings");
        if let Err(e) = self.run_load(generation).await {
            tracing::error!(backend = self.backend.name(), error = %e, "Settings load failed");
        }
    }

    async fn run_load(&self, generation: u64) -> SettingsResult<()> {
        let (value, heal) = match self.backend.read().await {
            Ok(raw) => (self.fix(&raw).await, true),
            Err(e) => {
                tracing::error!(
                    backend = self.backend.name(),
                    error = %e,
                    "Settings read failed, falling back to defaults"
                );
                (self.fixer.fix(&Value::Null).value, false)
            }
        };

        match self.commit(value, generation).await {
            Ok(_) => {}
            Err(SettingsError::Emit(e)) => {
                tracing::warn!(backend = self.backend.name(), error = %e, "Change listeners failed during load");
            }
            Err(e) => return Err(e),
        }
        tracing::info!(backend = self.backend.name(), generation, "Settings loaded");

        if heal && self.options.heal_on_load {
            self.write().await?;
        }
        Ok(())
    }

    /// Discard the snapshot and return to `Unloaded`.
    ///
    /// Subscriptions stay registered.
    pub fn unload(&self) {
        let mut lifecycle = self.lifecycle();
        lifecycle.state = LoadState::Unloaded;
        lifecycle.generation += 1;
        lifecycle.gate = LoaderGate::new();
        self.cell.replace(None);
        tracing::debug!(backend = self.backend.name(), "Settings unloaded");
    }

    /// Apply a synchronous edit to a copy of the current snapshot and install it.
    pub async fn mutate<F>(&self, mutator: F) -> SettingsResult<Arc<T>>
    where
        F: FnOnce(&mut T),
    {
        let (mut working, generation) = self.working_copy()?;
        mutator(&mut working);
        self.finish_mutation(working, generation).await
    }

    /// Apply an asynchronous edit.
    ///
    /// The working copy is taken when this is called, not when the returned
    /// future is first polled. If another mutation lands while `mutator` is
    /// suspended, it is overwritten when this one completes.
    pub fn mutate_async<'a, F, Fut>(
        &'a self,
        mutator: F,
    ) -> impl Future<Output = SettingsResult<Arc<T>>> + 'a
    where
        F: FnOnce(T) -> Fut + 'a,
        Fut: Future<Output = T> + 'a,
    {
        let working = self.working_copy();
        async move {
            let (working, generation) = working?;
            let edited = mutator(working).await;
            self.finish_mutation(edited, generation).await
        }
    }

    async fn finish_mutation(&self, value: T, generation: u64) -> SettingsResult<Arc<T>> {
        let event = self.install(value, generation)?;
        let current = event.current.clone();
        // The snapshot is swapped in now, so persist it even if a listener fails.
        let emitted = self.events.emit(event).await;
        if self.options.write_on_mutate {
            self.write().await?;
        }
        emitted?;
        Ok(current)
    }

    /// Reload from the backend.
    pub async fn read(&self) -> SettingsResult<Arc<T>> {
        self.read_with(|| self.backend.read()).await
    }

    /// Reload from an overriding source, through the same fixer path.
    pub async fn read_with<R, Fut>(&self, reader: R) -> SettingsResult<Arc<T>>
    where
        R: FnOnce() -> Fut,
        Fut: Future<Output = SettingsResult<Value>>,
    {
        let (_, generation) = self.loaded_snapshot()?;
        let raw = reader().await?;
        let value = self.fix(&raw).await;
        self.commit(value, generation).await
    }

    /// Persist the current snapshot.
    pub async fn write(&self) -> SettingsResult<()> {
        self.loaded_snapshot()?;
        let result = self.backend.write(self.cell.clone()).await;
        metrics::record_write(self.backend.name(), result.is_ok());
        if let Err(e) = &result {
            tracing::error!(backend = self.backend.name(), error = %e, "Settings write failed");
        }
        result
    }

    /// Call `callback(current, previous, settings)` whenever `projection`
    /// of the settings changes.
    pub fn on_mutate<V, P, C>(&self, projection: P, callback: C) -> Unregister
    where
        V: PartialEq + Clone + Send + Sync + 'static,
        P: Fn(&T) -> V + Send + Sync + 'static,
        C: Fn(&V, &V, &T) + Send + Sync + 'static,
    {
        self.on_mutate_async(projection, move |current, previous, settings| {
            callback(&current, &previous, &settings);
            async { Ok::<(), ListenerError>(()) }
        })
    }

    /// Async variant of [`on_mutate`](Self::on_mutate). A failing callback
    /// fails the `mutate`/`read` that triggered it.
    pub fn on_mutate_async<V, P, C, Fut>(&self, projection: P, callback: C) -> Unregister
    where
        V: PartialEq + Clone + Send + Sync + 'static,
        P: Fn(&T) -> V + Send + Sync + 'static,
        C: Fn(V, V, Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), ListenerError>> + Send + 'static,
    {
        let initial = self.cell.load();
        let subscription = Arc::new(Subscription::new(projection, callback, initial.as_deref()));
        self.events.listen(move |event| subscription.observe(event))
    }

    async fn fix(&self, raw: &Value) -> T {
        let Fixed { value, valid } = self.fixer.fix(raw);
        if valid {
            return value;
        }

        let reason = SettingsError::MalformedData(format!("{} rejected by fixer", describe(raw)));
        tracing::warn!(backend = self.backend.name(), error = %reason, "Substituting fixed settings");
        metrics::record_invalid_data(self.backend.name());

        match self.backend.on_invalid_data(raw, value.clone()).await {
            Ok(handled) => handled,
            Err(e) => {
                tracing::error!(backend = self.backend.name(), error = %e, "Invalid data handler failed");
                value
            }
        }
    }

    /// Swap `value` in and emit the change.
    async fn commit(&self, value: T, generation: u64) -> SettingsResult<Arc<T>> {
        let event = self.install(value, generation)?;
        let current = event.current.clone();
        self.events.emit(event).await?;
        Ok(current)
    }

    /// Swap `value` in. Fails if `generation` is stale.
    fn install(&self, value: T, generation: u64) -> SettingsResult<ChangeEvent<T>> {
        let mut lifecycle = self.lifecycle();
        if lifecycle.generation != generation || lifecycle.state == LoadState::Unloaded {
            return Err(SettingsError::NotLoaded);
        }
        let current = Arc::new(value);
        let previous = self.cell.replace(Some(current.clone()));
        if lifecycle.state == LoadState::Loading {
            lifecycle.state = LoadState::Loaded;
            lifecycle.gate.resolve();
        }
        Ok(ChangeEvent { current, previous })
    }

    fn working_copy(&self) -> SettingsResult<(T, u64)> {
        let (value, generation) = self.loaded_snapshot()?;
        Ok((T::clone(&value), generation))
    }

    fn loaded_snapshot(&self) -> SettingsResult<(Arc<T>, u64)> {
        let lifecycle = self.lifecycle();
        if lifecycle.state != LoadState::Loaded {
            return Err(SettingsError::NotLoaded);
        }
        Ok((self.cell.current()?, lifecycle.generation))
    }

    fn lifecycle(&self) -> std::sync::MutexGuard<'_, Lifecycle> {
        self.lifecycle.lock().expect("lifecycle mutex poisoned")
    }
}

/// Returns an unfinished load cycle to `Unloaded` when its driver is dropped.
struct LoadGuard<'a> {
    lifecycle: &'a Mutex<Lifecycle>,
    generation: u64,
    backend: &'static str,
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        let Ok(mut lifecycle) = self.lifecycle.lock() else {
            return;
        };
        if lifecycle.state == LoadState::Loading && lifecycle.generation == self.generation {
            lifecycle.state = LoadState::Unloaded;
            lifecycle.gate.abandon();
            tracing::warn!(backend = self.backend, generation = self.generation, "Load dropped before completion");
        }
    }
}

fn describe(raw: &Value) -> &'static str {
    match raw {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
