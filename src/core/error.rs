//! Error types for backup, restore and listing.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for backup operations.
pub type BackupResult<T> = Result<T, BackupError>;

/// Errors surfaced by [`BackupManager`](crate::core::BackupManager) operations.
#[derive(Debug, Error)]
pub enum BackupError {
    /// Source file missing, or backup handle missing / not a backup file name.
    #[error("not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Permission failure, disk full, unreadable or unwritable path.
    #[error("{context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    /// A backup file exists but is not a complete gzip stream.
    #[error("corrupt backup {}: {source}", path.display())]
    Format {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn not_found(path: impl Into<PathBuf>) -> Self {
        Self::NotFound { path: path.into() }
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    pub fn format(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Format {
            path: path.into(),
            source,
        }
    }

    /// Map an I/O error on `path`, turning `ErrorKind::NotFound` into [`BackupError::NotFound`].
    pub(crate) fn from_io(path: &std::path::Path, context: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::not_found(path)
        } else {
            Self::io(format!("{} {}", context, path.display()), source)
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    pub fn is_format(&self) -> bool {
        matches!(self, Self::Format { .. })
    }
}
