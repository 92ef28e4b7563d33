//! Shared application state for Axum handlers and middleware.
//!
//! Everything here is built once at startup and shared behind `Arc`s:
//!
//! - **Configuration**: runtime configuration access
//! - **Logger**: the file logger, passed explicitly instead of a global
//! - **Pipeline**: the ordered stages run in front of the router
//! - **Health**: the controller behind `/health`, `/status` and `/metrics`
//!
//! # Shutdown
//!
//! The `shutdown` token is cancelled by the panic handler and observed by
//! [`crate::utils::shutdown_signal`], so a caught panic drains the server
//! the same way SIGTERM does.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::logger::Logger;
use crate::pipeline::Pipeline;
use crate::services::HealthController;

/// Shared application state, cloned for each request.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<Config>,
    /// File logger
    pub logger: Arc<Logger>,
    /// Stages run before routing
    pub pipeline: Arc<Pipeline>,
    /// Health, status and metrics reporting
    pub health: Arc<HealthController>,
    /// Timestamp when the application started
    pub started_at: Instant,
    shutdown: CancellationToken,
}

impl AppState {
    /// Build state with the standard pipeline for `config`.
    pub fn new(config: Config, logger: Arc<Logger>) -> Self {
        let pipeline = Pipeline::standard(&config, logger.clone());
        Self::with_pipeline(config, logger, pipeline)
    }

    /// Build state around a custom pipeline.
    pub fn with_pipeline(config: Config, logger: Arc<Logger>, pipeline: Pipeline) -> Self {
        let started_at = Instant::now();
        let health = HealthController::new(
            config.environment.clone(),
            config.upload_dir.clone(),
            config.log_dir.clone(),
            started_at,
            logger.clone(),
        );

        Self {
            config: Arc::new(config),
            logger,
            pipeline: Arc::new(pipeline),
            health: Arc::new(health),
            started_at,
            shutdown: CancellationToken::new(),
        }
    }

    /// Time since the state was created.
    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Token cancelled when the server should stop.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Ask the server to shut down gracefully.
    pub fn request_shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Final cleanup after the server has stopped accepting connections.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        info!(uptime_secs = self.uptime().as_secs(), "Flushing log files");
        self.logger.flush();
    }
}
