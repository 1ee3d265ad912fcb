use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cancel `cancellation` on Ctrl+C (and SIGTERM on unix)
pub async fn setup_shutdown_handler(cancellation: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(windows)]
        {
            match signal::ctrl_c().await {
                Ok(()) => {
                    info!("Received shutdown signal (Ctrl+C)");
                    cancellation.cancel();
                }
                Err(e) => warn!("Failed to listen for shutdown signal: {}", e),
            }
        }

        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};

            let (mut sigterm, mut sigint) = match (
                signal(SignalKind::terminate()),
                signal(SignalKind::interrupt()),
            ) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    warn!("Failed to install signal handlers: {}", e);
                    return;
                }
            };

            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM");
                    cancellation.cancel();
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT");
                    cancellation.cancel();
                }
            }
        }
    });
}
