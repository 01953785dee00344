//! One-shot loader gate.

use tokio::sync::watch;

use crate::settings::types::{SettingsError, SettingsResult};

#[derive(Debug, Clone, Copy, Default)]
struct Status {
    resolved: bool,
    // Bumped each time a load attempt is dropped before finishing.
    abandoned: u64,
}

/// How a wait on the current load attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Resolved,
    /// The loading caller went away; someone else must load.
    Abandoned,
}

/// Resolved exactly once, when a load cycle finishes loading.
#[derive(Debug)]
pub struct LoaderGate {
    tx: watch::Sender<Status>,
}

impl LoaderGate {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Status::default());
        Self { tx }
    }

    /// Mark the gate as resolved. Returns false if it already was.
    pub fn resolve(&self) -> bool {
        self.tx.send_if_modified(|status| !std::mem::replace(&mut status.resolved, true))
    }

    /// Wake callers waiting on the current attempt without resolving.
    pub fn abandon(&self) {
        self.tx.send_modify(|status| status.abandoned += 1);
    }

    pub fn is_resolved(&self) -> bool {
        self.tx.borrow().resolved
    }

    /// Wait for the gate. The returned future does not borrow the gate.
    ///
    /// Abandoned attempts are waited through. Fails with
    /// [`SettingsError::NotLoaded`] if the gate is discarded before it resolves.
    pub fn wait(&self) -> impl std::future::Future<Output = SettingsResult<()>> + Send + 'static {
        let mut rx = self.tx.subscribe();
        async move {
            rx.wait_for(|status| status.resolved)
                .await
                .map(|_| ())
                .map_err(|_| SettingsError::NotLoaded)
        }
    }

    /// Wait for the attempt in flight to resolve or be abandoned.
    pub fn attempt(&self) -> impl std::future::Future<Output = SettingsResult<Attempt>> + Send + 'static {
        let mut rx = self.tx.subscribe();
        let seen = rx.borrow().abandoned;
        async move {
            let status = *rx
                .wait_for(|status| status.resolved || status.abandoned != seen)
                .await
                .map_err(|_| SettingsError::NotLoaded)?;
            Ok(if status.resolved {
                Attempt::Resolved
            } else {
                Attempt::Abandoned
            })
        }
    }
}

impl Default for LoaderGate {
    fn default() -> Self {
        Self::new()
    }
}
