pub mod config;
pub mod core;
pub mod observability;
pub mod platform;
pub mod service;
pub mod watch;

pub use crate::core::{BackupError, BackupManager, BackupRecord, BackupResult, BackupStats, RestoreReport};
pub use platform::normalize_path;

pub use anyhow::{Context, Result};
