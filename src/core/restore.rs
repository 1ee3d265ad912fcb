use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

use crate::core::atomic::write_atomic;
use crate::core::error::{BackupError, BackupResult};
use crate::core::manager::BackupManager;
use crate::core::models::RestoreReport;
use crate::core::naming::parse_storage_name;
use crate::platform::normalize_path;

impl BackupManager {
    /// Decompress a backup and write it to `target_path`.
    ///
    /// The target is replaced atomically: on any failure it keeps its previous
    /// content (or stays absent). The backup itself is only read, so it can be
    /// restored any number of times.
    ///
    /// Targets inside the managed root (or the backup itself) are refused, so a
    /// restore can never replace a stored snapshot.
    pub async fn restore_backup(
        &self,
        storage_path: impl AsRef<Path>,
        target_path: impl AsRef<Path>,
    ) -> BackupResult<RestoreReport> {
        let storage = normalize_path(storage_path);
        let target = normalize_path(target_path);

        if target.starts_with(self.root()) || target == storage {
            return Err(BackupError::io(
                format!("Cannot restore to {}", target.display()),
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "target is inside the backup directory",
                ),
            ));
        }

        let content = read_backup(&storage).await?;

        let parent = target.parent().ok_or_else(|| {
            BackupError::io(
                format!("Cannot restore to {}", target.display()),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "target has no parent directory"),
            )
        })?;

        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            BackupError::io(format!("Failed to create directory {}", parent.display()), e)
        })?;

        let bytes_restored = write_atomic(&target, &content).await.map_err(|e| {
            BackupError::io(format!("Failed to restore to {}", target.display()), e)
        })?;

        info!("Restored from backup: {} -> {}", storage.display(), target.display());

        Ok(RestoreReport {
            storage_path: storage,
            target_path: target,
            bytes_restored,
        })
    }

    /// Fully decode a backup without writing anything; returns the original length
    pub async fn verify_backup(&self, storage_path: impl AsRef<Path>) -> BackupResult<u64> {
        let storage = normalize_path(storage_path);
        let content = read_backup(&storage).await?;

        debug!("Verified backup {} ({} bytes)", storage.display(), content.len());
        Ok(content.len() as u64)
    }
}

/// Read and decompress a storage file.
///
/// Anything whose name is not a backup name is reported as not found; a backup
/// name with undecodable content is a format error.
async fn read_backup(storage: &Path) -> BackupResult<Vec<u8>> {
    let recognized = storage
        .file_name()
        .and_then(|n| n.to_str())
        .and_then(parse_storage_name)
        .is_some();

    if !recognized {
        debug!("Not a backup file name: {}", storage.display());
        return Err(BackupError::not_found(storage));
    }

    let metadata = tokio::fs::metadata(storage)
        .await
        .map_err(|e| BackupError::from_io(storage, "Failed to inspect backup", e))?;

    if !metadata.is_file() {
        return Err(BackupError::not_found(storage));
    }

    let compressed = tokio::fs::read(storage)
        .await
        .map_err(|e| BackupError::from_io(storage, "Failed to read backup", e))?;

    decompress(&compressed).map_err(|e| BackupError::format(storage, e))
}

/// Decode a complete gzip stream; truncation and checksum errors surface as `Err`
pub(crate) fn decompress(compressed: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut decoder = GzDecoder::new(compressed);
    let mut content = Vec::new();
    decoder.read_to_end(&mut content)?;
    Ok(content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::backup::compress;
    use std::path::PathBuf;
    use tempfile::tempdir;

    async fn backed_up(dir: &Path, name: &str, content: &[u8]) -> (BackupManager, PathBuf) {
        let manager = BackupManager::new(dir.join("backups"));
        let source = dir.join(name);
        std::fs::write(&source, content).unwrap();
        let record = manager.create_backup(&source).await.unwrap();
        (manager, record.storage_path)
    }

    #[test]
    fn test_decompress_rejects_garbage() {
        assert!(decompress(b"definitely not gzip").is_err());
    }

    #[test]
    fn test_decompress_rejects_truncated_trailer() {
        let compressed = compress(b"some playlist content").unwrap();
        assert!(decompress(&compressed[..compressed.len() - 4]).is_err());
    }

    #[test]
    fn test_decompress_rejects_bad_checksum() {
        let mut compressed = compress(b"some playlist content").unwrap();
        let crc_offset = compressed.len() - 8;
        compressed[crc_offset] ^= 0xff;
        assert!(decompress(&compressed).is_err());
    }

    #[tokio::test]
    async fn test_restore_overwrites_existing_target() {
        let dir = tempdir().unwrap();
        let (manager, storage) = backed_up(dir.path(), "test.txt", b"original content").await;

        let target = dir.path().join("test.txt");
        std::fs::write(&target, "modified content").unwrap();

        manager.restore_backup(&storage, &target).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "original content");
    }

    #[tokio::test]
    async fn test_restore_refuses_to_overwrite_another_backup() {
        let dir = tempdir().unwrap();
        let (manager, first) = backed_up(dir.path(), "notes.txt", b"first version").await;

        std::fs::write(dir.path().join("notes.txt"), "second version").unwrap();
        let second = manager
            .create_backup(dir.path().join("notes.txt"))
            .await
            .unwrap()
            .storage_path;
        let second_bytes = std::fs::read(&second).unwrap();

        let err = manager.restore_backup(&first, &second).await.unwrap_err();
        assert!(matches!(err, BackupError::Io { .. }), "Unexpected error: {}", err);

        assert_eq!(std::fs::read(&second).unwrap(), second_bytes);
        assert_eq!(manager.verify_backup(&second).await.unwrap(), 14);
    }

    #[tokio::test]
    async fn test_restore_refuses_targets_inside_backup_directory() {
        let dir = tempdir().unwrap();
        let (manager, storage) = backed_up(dir.path(), "notes.txt", b"content").await;
        let stored = std::fs::read(&storage).unwrap();

        let err = manager.restore_backup(&storage, &storage).await.unwrap_err();
        assert!(matches!(err, BackupError::Io { .. }), "Unexpected error: {}", err);
        assert_eq!(std::fs::read(&storage).unwrap(), stored);

        let inside = manager.root().join("plain.txt");
        assert!(manager.restore_backup(&storage, &inside).await.is_err());
        assert!(!inside.exists());
    }

    #[tokio::test]
    async fn test_restore_creates_missing_parent_directories() {
        let dir = tempdir().unwrap();
        let (manager, storage) = backed_up(dir.path(), "a.json", b"{}").await;

        let target = dir.path().join("restore").join("nested").join("a.json");
        let report = manager.restore_backup(&storage, &target).await.unwrap();

        assert_eq!(report.target_path, target);
        assert_eq!(std::fs::read(&target).unwrap(), b"{}");
    }

    #[tokio::test]
    async fn test_restore_missing_backup_is_not_found() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"));

        let missing = manager.root().join("notes_20240101000000000000.txt.gz");
        let err = manager
            .restore_backup(&missing, dir.path().join("out.txt"))
            .await
            .unwrap_err();

        assert!(err.is_not_found(), "Unexpected error: {}", err);
        assert!(!dir.path().join("out.txt").exists());
    }

    #[tokio::test]
    async fn test_restore_unrecognized_file_is_not_found() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"));

        let foreign = dir.path().join("random.txt");
        std::fs::write(&foreign, "plain").unwrap();

        let err = manager
            .restore_backup(&foreign, dir.path().join("out.txt"))
            .await
            .unwrap_err();
        assert!(err.is_not_found(), "Unexpected error: {}", err);
    }

    #[tokio::test]
    async fn test_restore_garbage_backup_is_format_error() {
        let dir = tempdir().unwrap();
        let manager = BackupManager::new(dir.path().join("backups"));
        manager.ensure_root().await.unwrap();

        let storage = manager.root().join("notes_20240101000000000000.txt.gz");
        std::fs::write(&storage, "not compressed at all").unwrap();

        let target = dir.path().join("out.txt");
        let err = manager.restore_backup(&storage, &target).await.unwrap_err();

        assert!(err.is_format(), "Unexpected error: {}", err);
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn test_repeated_restores_are_identical() {
        let dir = tempdir().unwrap();
        let (manager, storage) = backed_up(dir.path(), "b.m3u", b"#EXTM3U\n#EXTINF:-1,News\n").await;

        for i in 0..3 {
            let target = dir.path().join(format!("copy{}.m3u", i));
            manager.restore_backup(&storage, &target).await.unwrap();
            assert_eq!(std::fs::read(&target).unwrap(), b"#EXTM3U\n#EXTINF:-1,News\n");
        }
        assert!(storage.exists());
    }

    #[tokio::test]
    async fn test_verify_backup_reports_original_length() {
        let dir = tempdir().unwrap();
        let (manager, storage) = backed_up(dir.path(), "c.txt", b"twelve bytes").await;

        assert_eq!(manager.verify_backup(&storage).await.unwrap(), 12);

        let stored = std::fs::read(&storage).unwrap();
        std::fs::write(&storage, &stored[..stored.len() - 3]).unwrap();
        assert!(manager.verify_backup(&storage).await.unwrap_err().is_format());
    }
}
