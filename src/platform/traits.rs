use std::path::{Path, PathBuf};

/// Path normalization used to key every backup, restore and listing call
pub trait PathNormalizer {
    /// Turn a user supplied path into the absolute form used as its identity
    fn normalize(&self, path: &Path) -> PathBuf;
}
