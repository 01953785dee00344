//! Backing-file watcher for external edits.
//!
//! The owner of a settings manager receives a signal whenever the file
//! behind its store changes on disk and decides when to call `read()`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// A watcher that monitors a store file for changes.
pub struct StoreWatcher {
    path: PathBuf,
    change_tx: mpsc::UnboundedSender<PathBuf>,
}

impl StoreWatcher {
    /// Create a new StoreWatcher.
    ///
    /// Returns the watcher and a receiver of change signals.
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<PathBuf>) {
        let (change_tx, change_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                change_tx,
            },
            change_rx,
        )
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.change_tx.clone();
        let path = self.path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let relevant = event.paths.is_empty()
                        || event.paths.iter().any(|p| p.file_name() == path.file_name());
                    if relevant && (event.kind.is_modify() || event.kind.is_create()) {
                        tracing::info!(path = %path.display(), "Store file change detected");
                        let _ = tx.send(path.clone());
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        // Watch the directory so atomic replace-by-rename is still seen.
        let target = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        watcher.watch(target, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %self.path.display(), "Watching store file");
        Ok(watcher)
    }
}
