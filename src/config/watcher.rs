//! Snapshot file watcher.
//!
//! Polling already picks up every change within one interval; the watcher
//! only shortens that delay by nudging the reconciler when the file is
//! written.

use std::path::{Path, PathBuf};
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

/// Watches a snapshot file and emits a nudge per modification.
pub struct SnapshotWatcher {
    path: PathBuf,
    nudge_tx: mpsc::UnboundedSender<()>,
}

impl SnapshotWatcher {
    /// Create a new watcher.
    ///
    /// Returns the watcher and the receiver to hand to
    /// [`LevelReconciler::with_nudges`](crate::level::LevelReconciler::with_nudges).
    pub fn new(path: &Path) -> (Self, mpsc::UnboundedReceiver<()>) {
        let (nudge_tx, nudge_rx) = mpsc::unbounded_channel();

        (
            Self {
                path: path.to_path_buf(),
                nudge_tx,
            },
            nudge_rx,
        )
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.nudge_tx;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::debug!("Snapshot file change detected");
                        let _ = tx.send(());
                    }
                }
                Err(e) => tracing::warn!(error = %e, "Snapshot watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Snapshot watcher started");
        Ok(watcher)
    }
}
