use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One immutable compressed snapshot under the managed root
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupRecord {
    /// Base file name of the file that was backed up
    pub source_name: String,

    /// Creation time, microsecond resolution
    pub created_at: DateTime<Utc>,

    /// Absolute path of the compressed snapshot; callers treat it as an opaque handle
    pub storage_path: PathBuf,

    /// Uncompressed size. Exact at creation; from the gzip trailer when listed
    pub original_size: Option<u64>,

    /// Size of the compressed snapshot on disk
    pub stored_size: u64,
}

impl BackupRecord {
    /// File name of the snapshot inside the managed root
    pub fn storage_name(&self) -> Option<&str> {
        self.storage_path.file_name().and_then(|n| n.to_str())
    }
}

/// Outcome of a successful restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RestoreReport {
    pub storage_path: PathBuf,
    pub target_path: PathBuf,
    pub bytes_restored: u64,
}

/// Summary of everything under a managed root
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupStats {
    pub total_backups: usize,
    pub total_stored_bytes: u64,
    /// Number of distinct source names
    pub sources: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

impl BackupStats {
    /// Summarize records ordered oldest first
    pub fn from_records(records: &[BackupRecord]) -> Self {
        let mut names: Vec<&str> = records.iter().map(|r| r.source_name.as_str()).collect();
        names.sort_unstable();
        names.dedup();

        Self {
            total_backups: records.len(),
            total_stored_bytes: records.iter().map(|r| r.stored_size).sum(),
            sources: names.len(),
            oldest: records.iter().map(|r| r.created_at).min(),
            newest: records.iter().map(|r| r.created_at).max(),
        }
    }
}
