pub mod atomic;
pub mod backup;
pub mod catalog;
pub mod error;
pub mod manager;
pub mod models;
pub mod naming;
pub mod restore;

pub use error::{BackupError, BackupResult};
pub use manager::BackupManager;
pub use models::{BackupRecord, BackupStats, RestoreReport};
pub use naming::{parse_storage_name, split_file_name, storage_file_name, ParsedStorageName};
