use std::io::SeekFrom;
use std::path::Path;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::core::atomic::is_temp_file_name;
use crate::core::error::{BackupError, BackupResult};
use crate::core::manager::BackupManager;
use crate::core::models::{BackupRecord, BackupStats};
use crate::core::naming::parse_storage_name;

/// Smallest possible gzip member: 10 byte header, empty body, 8 byte trailer
const GZIP_MIN_LEN: u64 = 18;

impl BackupManager {
    /// Backups of `source_name`, oldest first.
    ///
    /// Matching is on the base file name, so a full path is reduced to its last
    /// component. No match yields an empty list.
    pub async fn list_backups(&self, source_name: &str) -> BackupResult<Vec<BackupRecord>> {
        let wanted = Path::new(source_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(source_name);

        let records = self.scan(|name| name == wanted).await?;
        debug!("Found {} backups for {}", records.len(), wanted);
        Ok(records)
    }

    /// Every backup under the root, oldest first
    pub async fn list_all_backups(&self) -> BackupResult<Vec<BackupRecord>> {
        self.scan(|_| true).await
    }

    /// Most recent backup of `source_name`
    pub async fn latest_backup(&self, source_name: &str) -> BackupResult<Option<BackupRecord>> {
        Ok(self.list_backups(source_name).await?.pop())
    }

    /// Totals across the whole managed root
    pub async fn stats(&self) -> BackupResult<BackupStats> {
        let records = self.list_all_backups().await?;
        Ok(BackupStats::from_records(&records))
    }

    /// Rebuild records from file names and metadata; temporary files never match
    async fn scan<F>(&self, matches: F) -> BackupResult<Vec<BackupRecord>>
    where
        F: Fn(&str) -> bool,
    {
        let mut records = Vec::new();

        let mut entries = match tokio::fs::read_dir(self.root()).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
            Err(e) => {
                return Err(BackupError::io(
                    format!("Failed to read backup directory {}", self.root().display()),
                    e,
                ));
            }
        };

        while let Some(entry) = entries.next_entry().await.map_err(|e| {
            BackupError::io(format!("Failed to read backup directory {}", self.root().display()), e)
        })? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };

            if is_temp_file_name(name) {
                continue;
            }

            let Some(parsed) = parse_storage_name(name) else {
                continue;
            };

            if !matches(&parsed.source_name) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!("Cannot access backup metadata {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let storage_path = entry.path();
            let original_size = read_original_size(&storage_path, metadata.len()).await;

            records.push(BackupRecord {
                source_name: parsed.source_name,
                created_at: parsed.created_at,
                storage_path,
                original_size,
                stored_size: metadata.len(),
            });
        }

        records.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.source_name.cmp(&b.source_name))
        });

        Ok(records)
    }
}

/// Uncompressed length from the gzip ISIZE trailer (modulo 2^32)
async fn read_original_size(path: &Path, stored_size: u64) -> Option<u64> {
    if stored_size < GZIP_MIN_LEN {
        return None;
    }

    let mut file = tokio::fs::File::open(path).await.ok()?;
    file.seek(SeekFrom::End(-4)).await.ok()?;

    let mut trailer = [0u8; 4];
    file.read_exact(&mut trailer).await.ok()?;

    Some(u64::from(u32::from_le_bytes(trailer)))
}
