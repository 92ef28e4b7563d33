use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;

use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use api_server::{AppState, Config, Logger, build_router, metrics, utils};

#[tokio::main]
async fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .with_thread_ids(true)
        .init();

    info!("Starting API server v{}", env!("CARGO_PKG_VERSION"));

    match run().await {
        Ok(()) => ExitCode::from(exitcode::OK as u8),
        Err(exit_code) => ExitCode::from(exit_code as u8),
    }
}

/// Run the application, returning an exit code on error.
async fn run() -> Result<(), exitcode::ExitCode> {
    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Configuration error: {e}");
        exitcode::CONFIG
    })?;
    info!(
        host = %config.host,
        port = %config.port,
        environment = %config.environment,
        log_level = %config.log_level,
        "Configuration loaded"
    );

    let logger = Arc::new(Logger::new(&config.log_dir, config.is_development()));
    logger.info(
        "System information",
        Some(&json!({
            "version": env!("CARGO_PKG_VERSION"),
            "platform": std::env::consts::OS,
            "arch": std::env::consts::ARCH,
            "pid": std::process::id(),
            "environment": config.environment,
        })),
    );

    utils::prepare_upload_dir(&config.upload_dir, &logger)
        .await
        .map_err(|e| {
            error!("Failed to prepare upload directory {}: {e}", config.upload_dir.display());
            exitcode::CANTCREAT
        })?;

    match config.metrics_addr() {
        Some(addr) => metrics::try_init_metrics(addr),
        None => info!("Prometheus exporter disabled (METRICS_PORT=0)"),
    }

    // Build application state and router
    let addr_str = config.server_addr();
    let state = AppState::new(config, logger.clone());
    let app = build_router(state.clone(), None);

    // Start server
    let listener = TcpListener::bind(&addr_str).await.map_err(|e| {
        error!("Failed to bind to {addr_str}: {e}");
        exitcode::UNAVAILABLE
    })?;
    let local_addr = listener.local_addr().map_err(|e| {
        error!("Failed to read listener address: {e}");
        exitcode::OSERR
    })?;

    info!("Server listening on http://{local_addr}");
    info!("Endpoints:");
    info!("  GET  /health           - Health check");
    info!("  GET  /status           - System status");
    info!("  GET  /metrics          - Performance metrics");
    info!("  GET  /upload/{{path}}    - Uploaded files");
    logger.info(
        "Server started",
        Some(&json!({ "address": local_addr.to_string() })),
    );

    // Start server with graceful shutdown
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(utils::shutdown_signal(state.shutdown_token()))
    .await
    .map_err(|e| {
        error!("Server error: {e}");
        exitcode::SOFTWARE
    })?;

    info!("HTTP server stopped, flushing logs...");
    logger.info("Server shutting down", None);
    state.shutdown().await;

    info!("Server shutdown complete");
    Ok(())
}
