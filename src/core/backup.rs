use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Error, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::atomic::{temp_path_for, StagedFile};
use crate::core::error::{BackupError, BackupResult};
use crate::core::manager::BackupManager;
use crate::core::models::BackupRecord;
use crate::core::naming::{next_timestamp, storage_file_name};
use crate::platform::normalize_path;

/// Attempts at finding a free storage name before giving up
const MAX_NAME_ATTEMPTS: usize = 16;

impl BackupManager {
    /// Snapshot `source_path` into the managed root.
    ///
    /// Every backup is gzip compressed regardless of type or size. The snapshot
    /// appears under its final name only once it is completely written.
    pub async fn create_backup(&self, source_path: impl AsRef<Path>) -> BackupResult<BackupRecord> {
        let source = normalize_path(source_path);

        let metadata = tokio::fs::metadata(&source)
            .await
            .map_err(|e| BackupError::from_io(&source, "Failed to inspect source", e))?;

        if !metadata.is_file() {
            return Err(BackupError::io(
                format!("Cannot back up {}", source.display()),
                Error::new(ErrorKind::InvalidInput, "not a regular file"),
            ));
        }

        let source_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                BackupError::io(
                    format!("Cannot back up {}", source.display()),
                    Error::new(ErrorKind::InvalidInput, "file name is not valid UTF-8"),
                )
            })?
            .to_string();

        self.ensure_root().await?;

        let content = tokio::fs::read(&source)
            .await
            .map_err(|e| BackupError::from_io(&source, "Failed to read source", e))?;

        let compressed = compress(&content)
            .map_err(|e| BackupError::io(format!("Failed to compress {}", source.display()), e))?;

        debug!(
            "Compressed {} from {} to {} bytes",
            source_name,
            content.len(),
            compressed.len()
        );

        let staged = StagedFile::write(temp_path_for(&self.root().join(&source_name)), &compressed)
            .await
            .map_err(|e| BackupError::io(format!("Failed to stage backup of {}", source_name), e))?;
        let stored_size = staged.len();

        let published = self.publish_under_fresh_name(&staged, &source_name).await;
        staged.discard().await;
        let (created_at, storage_path) = published?;

        info!("Created backup: {} -> {}", source.display(), storage_path.display());

        Ok(BackupRecord {
            source_name,
            created_at,
            storage_path,
            original_size: Some(content.len() as u64),
            stored_size,
        })
    }

    /// Link the staged snapshot under a new timestamped name, never replacing a taken one
    async fn publish_under_fresh_name(
        &self,
        staged: &StagedFile,
        source_name: &str,
    ) -> BackupResult<(chrono::DateTime<chrono::Utc>, PathBuf)> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let created_at = next_timestamp();
            let storage_path = self.root().join(storage_file_name(source_name, &created_at));

            match staged.publish_new(&storage_path).await {
                Ok(()) => return Ok((created_at, storage_path)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    debug!("Storage name taken, retrying: {}", storage_path.display())
                }
                Err(e) => {
                    return Err(BackupError::io(
                        format!("Failed to write backup {}", storage_path.display()),
                        e,
                    ));
                }
            }
        }

        Err(BackupError::io(
            format!("No free storage name for {}", source_name),
            Error::new(ErrorKind::AlreadyExists, "storage names exhausted"),
        ))
    }
}

/// Gzip `content` in memory
pub(crate) fn compress(content: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(content.len() / 2 + 64), Compression::default());
    encoder.write_all(content)?;
    encoder.finish()
}
