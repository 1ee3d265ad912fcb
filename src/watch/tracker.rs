use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::core::{BackupError, BackupManager, BackupRecord, BackupResult};
use crate::platform::normalize_path;

/// Backs up tracked files whenever their modification time moves forward
pub struct ChangeTracker {
    manager: Arc<BackupManager>,
    watched: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl ChangeTracker {
    pub fn new(manager: Arc<BackupManager>) -> Self {
        Self {
            manager,
            watched: Mutex::new(HashMap::new()),
        }
    }

    pub fn manager(&self) -> &BackupManager {
        &self.manager
    }

    /// Start tracking `path` from its current modification time
    pub async fn watch(&self, path: impl AsRef<Path>) -> BackupResult<()> {
        let path = normalize_path(path);
        let modified = modified_time(&path).await?;

        info!("Now watching: {}", path.display());
        self.watched.lock().await.insert(path, modified);
        Ok(())
    }

    /// Stop tracking `path`; returns whether it was tracked
    pub async fn unwatch(&self, path: impl AsRef<Path>) -> bool {
        let path = normalize_path(path);
        self.watched.lock().await.remove(&path).is_some()
    }

    /// Tracked paths, sorted
    pub async fn watched(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self.watched.lock().await.keys().cloned().collect();
        paths.sort();
        paths
    }

    /// Back up `path` if it changed since it was last seen.
    ///
    /// A missing file is not an error and yields `None`. Untracked files count as
    /// changed and become tracked.
    pub async fn check_and_backup_if_changed(
        &self,
        path: impl AsRef<Path>,
    ) -> BackupResult<Option<BackupRecord>> {
        let path = normalize_path(path);

        let modified = match modified_time(&path).await {
            Ok(modified) => modified,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let last_seen = self.watched.lock().await.get(&path).copied();
        if last_seen.is_some_and(|last| modified <= last) {
            debug!("Unchanged: {}", path.display());
            return Ok(None);
        }

        info!("File changed, creating backup: {}", path.display());
        let record = self.manager.create_backup(&path).await?;

        self.watched.lock().await.insert(path, modified);
        Ok(Some(record))
    }
}

async fn modified_time(path: &Path) -> BackupResult<SystemTime> {
    let metadata = tokio::fs::metadata(path)
        .await
        .map_err(|e| BackupError::from_io(path, "Failed to inspect", e))?;

    metadata
        .modified()
        .map_err(|e| BackupError::io(format!("No modification time for {}", path.display()), e))
}
