use anyhow::{Context, Result};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::platform::normalize_path;
use crate::watch::ChangeTracker;

// Bounded so a burst of events cannot grow memory without limit
const FS_EVENT_CHANNEL_CAPACITY: usize = 1000;

/// Feeds filesystem events for tracked files into a [`ChangeTracker`]
pub struct FileWatcher {
    tracker: Arc<ChangeTracker>,
    debounce: Duration,
    cancellation: CancellationToken,
    events: mpsc::Receiver<Event>,
    // Dropping the watcher stops event delivery
    _watcher: RecommendedWatcher,
}

impl FileWatcher {
    /// Register the parent directories of every tracked file.
    ///
    /// Events are buffered from this point on, so changes made before [`run`](Self::run)
    /// is polled are not lost.
    pub async fn new(
        tracker: Arc<ChangeTracker>,
        debounce: Duration,
        cancellation: CancellationToken,
    ) -> Result<Self> {
        let (notify_tx, notify_rx) = mpsc::channel(FS_EVENT_CHANNEL_CAPACITY);

        let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| {
            match res {
                Ok(event) => {
                    if notify_tx.try_send(event).is_err() {
                        debug!("File event channel full or closed, dropping event");
                    }
                }
                Err(e) => error!("Watch error: {:?}", e),
            }
        })?;

        let directories: BTreeSet<PathBuf> = tracker
            .watched()
            .await
            .iter()
            .filter_map(|p| p.parent().map(|d| d.to_path_buf()))
            .collect();

        for dir in &directories {
            info!("Watching directory: {}", dir.display());
            watcher
                .watch(dir, RecursiveMode::NonRecursive)
                .with_context(|| format!("Failed to watch {}", dir.display()))?;
        }

        Ok(Self {
            tracker,
            debounce,
            cancellation,
            events: notify_rx,
            _watcher: watcher,
        })
    }

    /// Process events until cancelled
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                Some(event) = self.events.recv() => {
                    self.handle_event(event).await;
                }

                _ = self.cancellation.cancelled() => {
                    info!("File watcher shutdown complete");
                    break;
                }
            }
        }

        Ok(())
    }

    async fn handle_event(&self, event: Event) {
        if !is_content_change(&event) {
            return;
        }

        let tracked = self.tracker.watched().await;
        let changed: BTreeSet<PathBuf> = event
            .paths
            .iter()
            .map(normalize_path)
            .filter(|p| tracked.contains(p))
            .collect();

        if changed.is_empty() {
            return;
        }

        // Let the writer finish before snapshotting
        tokio::time::sleep(self.debounce).await;

        for path in changed {
            match self.tracker.check_and_backup_if_changed(&path).await {
                Ok(Some(record)) => debug!("Auto backup {}", record.storage_path.display()),
                Ok(None) => {}
                Err(e) => warn!("Auto backup of {} failed: {}", path.display(), e),
            }
        }
    }
}

fn is_content_change(event: &Event) -> bool {
    matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_))
}
