use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const DEFAULT_LOG_LEVEL: &str = "info";
const APP_DIR_NAME: &str = "snaphive";
const BACKUP_DIR_NAME: &str = "backups";

/// Temporary files younger than this are assumed to belong to a live writer
pub const DEFAULT_STALE_TEMP_AGE_SECS: u64 = 3600;
pub const DEFAULT_WATCH_DEBOUNCE_MS: u64 = 250;

#[inline]
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

#[inline]
fn default_stale_temp_age_secs() -> u64 {
    DEFAULT_STALE_TEMP_AGE_SECS
}

#[inline]
fn default_watch_debounce_ms() -> u64 {
    DEFAULT_WATCH_DEBOUNCE_MS
}

/// Platform local data directory, or `./backups` when there is none
pub fn default_backup_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR_NAME).join(BACKUP_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(BACKUP_DIR_NAME))
}

/// Backup vault configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Managed root holding every backup (defaults to the platform data directory)
    #[serde(default)]
    pub backup_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Optional log file directory (if None, only console logging)
    #[serde(default)]
    pub log_directory: Option<PathBuf>,

    /// Log file rotation strategy
    #[serde(default)]
    pub log_rotation: LogRotation,

    /// Minimum age before an orphaned temporary file is swept
    #[serde(default = "default_stale_temp_age_secs")]
    pub stale_temp_age_secs: u64,

    /// Delay before reacting to a change event while watching
    #[serde(default = "default_watch_debounce_ms")]
    pub watch_debounce_ms: u64,
}

impl VaultConfig {
    /// Managed root, with the default filled in
    pub fn backup_dir(&self) -> PathBuf {
        self.backup_dir.clone().unwrap_or_else(default_backup_dir)
    }

    pub fn stale_temp_age(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.stale_temp_age_secs)
    }

    pub fn watch_debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.watch_debounce_ms)
    }
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            backup_dir: None,
            log_level: default_log_level(),
            log_directory: None,
            log_rotation: LogRotation::default(),
            stale_temp_age_secs: DEFAULT_STALE_TEMP_AGE_SECS,
            watch_debounce_ms: DEFAULT_WATCH_DEBOUNCE_MS,
        }
    }
}

/// Log file rotation strategy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogRotation {
    /// Rotate daily
    #[default]
    Daily,
    /// Rotate hourly
    Hourly,
    /// Never rotate (single file)
    Never,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: VaultConfig = serde_json::from_str("{}").unwrap();

        assert_eq!(config.backup_dir, None);
        assert_eq!(config.backup_dir(), default_backup_dir());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_directory, None);
        assert_eq!(config.log_rotation, LogRotation::Daily);
        assert_eq!(config.stale_temp_age_secs, DEFAULT_STALE_TEMP_AGE_SECS);
        assert_eq!(config.watch_debounce_ms, DEFAULT_WATCH_DEBOUNCE_MS);
    }

    #[test]
    fn test_full_config_parses() {
        let json = r#"{
            "backup_dir": "~/.m3u_matrix/backups",
            "log_level": "debug",
            "log_directory": "./logs",
            "log_rotation": { "type": "hourly" },
            "stale_temp_age_secs": 60,
            "watch_debounce_ms": 10
        }"#;

        let config: VaultConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.backup_dir(), PathBuf::from("~/.m3u_matrix/backups"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_directory, Some(PathBuf::from("./logs")));
        assert_eq!(config.log_rotation, LogRotation::Hourly);
        assert_eq!(config.stale_temp_age(), std::time::Duration::from_secs(60));
        assert_eq!(config.watch_debounce(), std::time::Duration::from_millis(10));
    }

    #[test]
    fn test_unknown_rotation_is_rejected() {
        let json = r#"{ "log_rotation": { "type": "weekly" } }"#;
        assert!(serde_json::from_str::<VaultConfig>(json).is_err());
    }

    #[test]
    fn test_default_backup_dir_ends_with_app_dir() {
        assert!(default_backup_dir().ends_with(BACKUP_DIR_NAME));
    }
}
