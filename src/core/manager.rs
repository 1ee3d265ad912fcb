use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::error::{BackupError, BackupResult};
use crate::platform::normalize_path;

/// Owns one managed root and every snapshot stored under it.
///
/// Managers hold no shared state beyond the directory itself, so several can
/// coexist in one process (one per test, per user, ...). All coordination between
/// concurrent callers happens through write-then-rename on the filesystem.
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    /// Create a manager for `root`. The directory is created on first backup.
    pub fn new(root: impl AsRef<Path>) -> Self {
        let root = normalize_path(root);
        debug!("Backup manager rooted at {}", root.display());
        Self { root }
    }

    /// Absolute path of the managed root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the managed root if it does not exist yet
    pub async fn ensure_root(&self) -> BackupResult<()> {
        tokio::fs::create_dir_all(&self.root).await.map_err(|e| {
            BackupError::io(format!("Failed to create backup directory {}", self.root.display()), e)
        })
    }
}
