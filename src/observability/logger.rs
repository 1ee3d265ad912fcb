use std::path::Path;
use std::sync::{Mutex, OnceLock};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::LogRotation;

const LOG_FILE_NAME: &str = "snaphive.log";

/// Must be kept alive until the process exits so buffered lines reach the file
static LOG_GUARD: OnceLock<Mutex<Option<tracing_appender::non_blocking::WorkerGuard>>> = OnceLock::new();

/// Install console logging plus an optional rolling log file.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, log_dir: Option<&Path>, rotation: LogRotation) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    // Console goes to stderr so command output on stdout stays clean
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true);

    let subscriber = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer);

    if let Some(dir) = log_dir {
        std::fs::create_dir_all(dir)?;

        let file_appender = match rotation {
            LogRotation::Daily => tracing_appender::rolling::daily(dir, LOG_FILE_NAME),
            LogRotation::Hourly => tracing_appender::rolling::hourly(dir, LOG_FILE_NAME),
            LogRotation::Never => tracing_appender::rolling::never(dir, LOG_FILE_NAME),
        };

        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        let file_layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .with_ansi(false); // No ANSI colors in file

        subscriber.with(file_layer).try_init()?;

        LOG_GUARD.set(Mutex::new(Some(guard)))
            .map_err(|_| anyhow::anyhow!("Logger already initialized"))?;
    } else {
        subscriber.try_init()?;
    }

    Ok(())
}

/// Flush and release the file appender
pub fn shutdown_logging() {
    if let Some(mutex) = LOG_GUARD.get() {
        if let Ok(mut guard_option) = mutex.lock() {
            drop(guard_option.take());
        }
    }
}
