pub mod models;

pub use models::{default_backup_dir, LogRotation, VaultConfig};

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a JSON file
pub async fn load_config(path: &Path) -> Result<VaultConfig> {
    let content = tokio::fs::read_to_string(path).await
        .with_context(|| format!("Failed to read config file {}", path.display()))?;

    let config: VaultConfig = serde_json::from_str(&content)
        .context("Failed to parse config file")?;

    Ok(config)
}
