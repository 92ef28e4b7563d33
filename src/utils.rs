use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::logger::Logger;

/// Current UTC time as RFC 3339 with milliseconds, e.g. `2024-01-15T10:30:00.123Z`.
pub fn iso_timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Wait for Ctrl+C, SIGTERM, or cancellation of `shutdown`.
///
/// `shutdown` is cancelled by the panic handler, so an uncaught panic takes
/// the same graceful path as a signal.
///
/// # Panics
///
/// Panics if signal handlers cannot be installed. This is a critical
/// initialization failure that should halt the application.
pub async fn shutdown_signal(shutdown: CancellationToken) {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                error!("Failed to install Ctrl+C handler: {e}");
                panic!("Critical: cannot install Ctrl+C signal handler");
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {e}");
                panic!("Critical: cannot install SIGTERM signal handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            warn!("Received SIGINT, initiating graceful shutdown...");
        }
        _ = terminate => {
            warn!("Received SIGTERM, initiating graceful shutdown...");
        }
        _ = shutdown.cancelled() => {
            warn!("Shutdown requested, initiating graceful shutdown...");
        }
    }
}

/// Create the upload directory if needed and log what it holds.
///
/// # Errors
///
/// Returns the I/O error if the directory cannot be created or listed.
pub async fn prepare_upload_dir(dir: &Path, logger: &Logger) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await?;

    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut contents = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        contents.push(entry.file_name().to_string_lossy().into_owned());
    }
    contents.sort();

    logger.info(
        "Upload directory ready",
        Some(&json!({
            "path": dir.display().to_string(),
            "contents": contents,
        })),
    );
    Ok(())
}
