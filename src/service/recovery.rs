use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::{Duration, SystemTime};
use tracing::{info, warn};

use crate::core::atomic::is_temp_file_name;
use crate::core::BackupManager;

/// Finds temporary files left behind by writers that died before their rename.
/// Published backups are never touched.
pub struct RecoveryManager {
    root: PathBuf,
}

impl RecoveryManager {
    pub fn new(manager: &BackupManager) -> Self {
        Self {
            root: manager.root().to_path_buf(),
        }
    }

    /// All temporary files currently in the managed root
    pub async fn detect_stale_temp_files(&self) -> Result<Vec<PathBuf>> {
        Ok(self
            .temp_files()
            .await?
            .into_iter()
            .map(|(path, _)| path)
            .collect())
    }

    /// Remove temporary files older than `min_age`; younger ones may belong to a live writer
    pub async fn sweep_stale_temp_files(&self, min_age: Duration) -> Result<Vec<PathBuf>> {
        let now = SystemTime::now();
        let mut removed = Vec::new();

        for (path, modified) in self.temp_files().await? {
            let age = modified
                .and_then(|m| now.duration_since(m).ok())
                .unwrap_or(Duration::ZERO);

            if age < min_age {
                continue;
            }

            match tokio::fs::remove_file(&path).await {
                Ok(()) => {
                    info!("Removed stale temporary file: {}", path.display());
                    removed.push(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }

    async fn temp_files(&self) -> Result<Vec<(PathBuf, Option<SystemTime>)>> {
        let mut found = Vec::new();

        if !tokio::fs::try_exists(&self.root).await.unwrap_or(false) {
            return Ok(found);
        }

        let mut entries = tokio::fs::read_dir(&self.root).await
            .with_context(|| format!("Failed to read backup directory {}", self.root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if is_temp_file_name(name) {
                    let modified = entry.metadata().await.ok().and_then(|m| m.modified().ok());
                    found.push((entry.path(), modified));
                }
            }
        }

        if !found.is_empty() {
            warn!("Found {} temporary files in {}", found.len(), self.root.display());
        }

        Ok(found)
    }
}
