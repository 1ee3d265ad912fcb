use anyhow::{anyhow, bail, Context, Result};
use snaphive::{
    config::{load_config, VaultConfig},
    observability::{init_logging, shutdown_logging},
    service::{setup_shutdown_handler, RecoveryManager},
    watch::{ChangeTracker, FileWatcher},
    BackupManager, BackupRecord,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const DEFAULT_CONFIG_FILE: &str = "snaphive_config.json";

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    let (config_path, command) = split_config_arg(&args)?;

    if command.is_empty() || matches!(command[0].as_str(), "--help" | "-h" | "help") {
        print_help();
        return Ok(());
    }

    let config = resolve_config(config_path).await?;

    init_logging(
        &config.log_level,
        config.log_directory.as_deref(),
        config.log_rotation,
    )?;

    let manager = BackupManager::new(config.backup_dir());
    debug!("Using backup directory: {}", manager.root().display());

    let result = run_command(&manager, &config, command).await;

    shutdown_logging();

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }

    Ok(())
}

/// Peel off a leading `--config <file>`
fn split_config_arg(args: &[String]) -> Result<(Option<PathBuf>, &[String])> {
    match args.first().map(String::as_str) {
        Some("--config") => match args.get(1) {
            Some(path) => Ok((Some(PathBuf::from(path)), &args[2..])),
            None => bail!("--config requires a file argument"),
        },
        _ => Ok((None, args)),
    }
}

async fn resolve_config(config_path: Option<PathBuf>) -> Result<VaultConfig> {
    match config_path {
        Some(path) => load_config(&path).await
            .context("Failed to load configuration"),
        None => {
            let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                load_config(&default_path).await
                    .context("Failed to load configuration")
            } else {
                Ok(VaultConfig::default())
            }
        }
    }
}

async fn run_command(manager: &BackupManager, config: &VaultConfig, command: &[String]) -> Result<()> {
    let name = command[0].as_str();
    let args = &command[1..];

    match (name, args) {
        ("backup", [source]) => {
            let record = manager.create_backup(source).await
                .map_err(|e| anyhow!("backup failed: {}", e))?;
            println!("{}", record.storage_path.display());
        }
        ("list", [source_name]) => {
            print_records(&manager.list_backups(source_name).await?, false)?;
        }
        ("list", [source_name, flag]) if flag == "--json" => {
            print_records(&manager.list_backups(source_name).await?, true)?;
        }
        ("latest", [source_name, target]) => {
            let record = manager.latest_backup(source_name).await
                .map_err(|e| anyhow!("restore failed: {}", e))?
                .ok_or_else(|| anyhow!("restore failed: no backups of {}", source_name))?;
            let report = manager.restore_backup(&record.storage_path, target).await
                .map_err(|e| anyhow!("restore failed: {}", e))?;
            println!("Restored {} bytes to {}", report.bytes_restored, report.target_path.display());
        }
        ("restore", [storage, target]) => {
            let report = manager.restore_backup(storage, target).await
                .map_err(|e| anyhow!("restore failed: {}", e))?;
            println!("Restored {} bytes to {}", report.bytes_restored, report.target_path.display());
        }
        ("verify", [storage]) => {
            let size = manager.verify_backup(storage).await
                .map_err(|e| anyhow!("verify failed: {}", e))?;
            println!("OK ({} bytes)", size);
        }
        ("stats", []) => {
            let stats = manager.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        ("sweep", []) => {
            let recovery = RecoveryManager::new(manager);
            let removed = recovery.sweep_stale_temp_files(config.stale_temp_age()).await?;
            println!("Removed {} stale temporary files", removed.len());
        }
        ("watch", files) if !files.is_empty() => {
            watch_files(manager.clone(), config, files).await?;
        }
        _ => bail!("Unknown command or wrong arguments: {}\nRun with --help for usage", command.join(" ")),
    }

    Ok(())
}

async fn watch_files(manager: BackupManager, config: &VaultConfig, files: &[String]) -> Result<()> {
    let tracker = Arc::new(ChangeTracker::new(Arc::new(manager)));

    for file in files {
        tracker.watch(file).await
            .with_context(|| format!("Cannot watch {}", file))?;
    }

    let cancellation = CancellationToken::new();
    setup_shutdown_handler(cancellation.clone()).await;

    let watcher = FileWatcher::new(tracker, config.watch_debounce(), cancellation).await?;

    info!("Watching {} files, press Ctrl+C to stop", files.len());
    watcher.run().await
}

fn print_records(records: &[BackupRecord], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(records)?);
        return Ok(());
    }

    for record in records {
        let original = record
            .original_size
            .map(|s| s.to_string())
            .unwrap_or_else(|| "?".to_string());

        println!(
            "{}  {:>10}  {:>10}  {}",
            record.created_at.format("%Y-%m-%d %H:%M:%S%.6f"),
            original,
            record.stored_size,
            record.storage_path.display()
        );
    }

    Ok(())
}

fn print_help() {
    println!("snaphive v{} - Versioned file backups", env!("CARGO_PKG_VERSION"));
    println!();
    println!("USAGE:");
    println!("  snaphive [--config FILE] <COMMAND>");
    println!();
    println!("COMMANDS:");
    println!("  backup <file>               Snapshot a file into the backup directory");
    println!("  list <name> [--json]        List backups of a file name, oldest first");
    println!("  latest <name> <target>      Restore the newest backup of <name> to <target>");
    println!("  restore <backup> <target>   Restore a specific backup to <target>");
    println!("  verify <backup>             Check that a backup decompresses cleanly");
    println!("  stats                       Summarize the backup directory");
    println!("  sweep                       Remove stale temporary files");
    println!("  watch <file>...             Back up files whenever they change");
    println!();
    println!("Without --config, {} is read from the working directory if present.", DEFAULT_CONFIG_FILE);
    println!();
    println!("EXAMPLE CONFIG:");
    println!("{}", get_example_config());
}

fn get_example_config() -> &'static str {
    r#"{
  "backup_dir": "~/.m3u_matrix/backups",
  "log_level": "info",
  "log_directory": "./logs",
  "log_rotation": {
    "type": "daily"
  },
  "stale_temp_age_secs": 3600,
  "watch_debounce_ms": 250
}"#
}
