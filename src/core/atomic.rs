use std::io::{Error, ErrorKind};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

/// Extension marking an in-flight temporary file
pub const TEMP_EXTENSION: &str = "snaphive-tmp";

static TEMP_SEQUENCE: AtomicU64 = AtomicU64::new(0);

/// Unique temporary sibling for `final_path`: `.<name>.<pid>-<seq>.snaphive-tmp`
pub(crate) fn temp_path_for(final_path: &Path) -> PathBuf {
    let name = final_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("snapshot");

    let sequence = TEMP_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    let temp_name = format!(".{}.{}-{}.{}", name, std::process::id(), sequence, TEMP_EXTENSION);

    final_path.with_file_name(temp_name)
}

/// Whether a directory entry name is one of our temporary files
pub fn is_temp_file_name(name: &str) -> bool {
    name.starts_with('.')
        && name
            .rsplit_once('.')
            .is_some_and(|(_, ext)| ext == TEMP_EXTENSION)
}

/// A fully written, fsynced and length-checked temporary file waiting to be published
#[derive(Debug)]
pub(crate) struct StagedFile {
    path: PathBuf,
    len: u64,
}

impl StagedFile {
    /// Write `bytes` to `temp_path`, which must not exist yet.
    ///
    /// The temporary file is removed if any step fails.
    pub(crate) async fn write(temp_path: PathBuf, bytes: &[u8]) -> std::io::Result<Self> {
        debug!("Writing {} bytes via {}", bytes.len(), temp_path.display());

        match write_synced(&temp_path, bytes).await {
            Ok(len) => Ok(Self { path: temp_path, len }),
            Err(e) => {
                remove_temp(&temp_path).await;
                Err(e)
            }
        }
    }

    pub(crate) fn len(&self) -> u64 {
        self.len
    }

    /// Publish under `final_path` without ever replacing an existing file.
    ///
    /// Fails with `ErrorKind::AlreadyExists` when the name is taken. The staged
    /// file stays in place either way, so another name can be tried; call
    /// [`StagedFile::discard`] once done.
    pub(crate) async fn publish_new(&self, final_path: &Path) -> std::io::Result<()> {
        match tokio::fs::hard_link(&self.path, final_path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(e),
            Err(e) => {
                // Filesystem without hard links
                debug!("Hard link unavailable ({}), falling back to rename", e);

                if tokio::fs::try_exists(final_path).await? {
                    return Err(Error::new(ErrorKind::AlreadyExists, "storage name taken"));
                }
                tokio::fs::rename(&self.path, final_path).await
            }
        }
    }

    /// Rename over `final_path`, replacing whatever is there
    pub(crate) async fn replace(self, final_path: &Path) -> std::io::Result<u64> {
        if let Err(e) = tokio::fs::rename(&self.path, final_path).await {
            remove_temp(&self.path).await;
            return Err(e);
        }
        Ok(self.len)
    }

    /// Remove the temporary name; a published hard link keeps the data
    pub(crate) async fn discard(self) {
        remove_temp(&self.path).await;
    }
}

/// Write `bytes` to `final_path` so that readers see either nothing or the whole file.
///
/// The data goes to a uniquely named temporary sibling, is fsynced, its length is
/// checked, and it is renamed over `final_path`. The temporary file is removed if
/// any step fails.
pub(crate) async fn write_atomic(final_path: &Path, bytes: &[u8]) -> std::io::Result<u64> {
    StagedFile::write(temp_path_for(final_path), bytes)
        .await?
        .replace(final_path)
        .await
}

async fn write_synced(temp_path: &Path, bytes: &[u8]) -> std::io::Result<u64> {
    // 1. Write to temporary file
    let mut temp_file = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(temp_path)
        .await?;

    temp_file.write_all(bytes).await?;
    temp_file.flush().await?;

    // 2. fsync temporary file
    temp_file.sync_all().await?;
    drop(temp_file);

    // 3. Verify length before publishing
    let written = tokio::fs::metadata(temp_path).await?.len();
    if written != bytes.len() as u64 {
        return Err(Error::other(format!(
            "short write: {} of {} bytes",
            written,
            bytes.len()
        )));
    }

    Ok(written)
}

async fn remove_temp(temp_path: &Path) {
    if let Err(e) = tokio::fs::remove_file(temp_path).await {
        if e.kind() != ErrorKind::NotFound {
            warn!("Failed to remove temporary file {}: {}", temp_path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_temp_names_are_unique_and_recognized() {
        let final_path = Path::new("/backups/notes_20240101000000000000.txt.gz");

        let first = temp_path_for(final_path);
        let second = temp_path_for(final_path);

        assert_ne!(first, second);
        assert_eq!(first.parent(), final_path.parent());

        let name = first.file_name().unwrap().to_str().unwrap();
        assert!(is_temp_file_name(name), "Not recognized: {}", name);
        assert!(!is_temp_file_name("notes_20240101000000000000.txt.gz"));
        assert!(!is_temp_file_name("visible.snaphive-tmp"));
    }

    #[tokio::test]
    async fn test_write_atomic_creates_file_and_leaves_no_temp() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.bin");

        let written = write_atomic(&target, b"payload").await.unwrap();

        assert_eq!(written, 7);
        assert_eq!(std::fs::read(&target).unwrap(), b"payload");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| is_temp_file_name(&e.file_name().to_string_lossy()))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_write_atomic_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("out.txt");
        std::fs::write(&target, "old content that is longer").unwrap();

        write_atomic(&target, b"new").await.unwrap();

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_publish_new_never_replaces_existing_file() {
        let dir = tempdir().unwrap();
        let taken = dir.path().join("notes_20240101000000000000.txt.gz");
        std::fs::write(&taken, "published by someone else").unwrap();

        let staged = StagedFile::write(temp_path_for(&taken), b"ours").await.unwrap();

        let err = staged.publish_new(&taken).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AlreadyExists);
        assert_eq!(std::fs::read_to_string(&taken).unwrap(), "published by someone else");

        let free = dir.path().join("notes_20240101000000000001.txt.gz");
        staged.publish_new(&free).await.unwrap();
        staged.discard().await;

        assert_eq!(std::fs::read(&free).unwrap(), b"ours");

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(
            names,
            vec![
                "notes_20240101000000000000.txt.gz".to_string(),
                "notes_20240101000000000001.txt.gz".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_write_atomic_missing_directory_fails_cleanly() {
        let dir = tempdir().unwrap();
        let target = dir.path().join("no_such_dir").join("out.txt");

        let result = write_atomic(&target, b"data").await;

        assert!(result.is_err());
        assert!(!target.exists());
    }
}
