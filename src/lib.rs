//! # API Server
//!
//! A small Axum HTTP server with:
//!
//! - **Health endpoints**: `/health`, `/status` and `/metrics`
//! - **Upload file server**: `GET /upload/<path>` with traversal-safe path resolution
//! - **Security monitoring**: data-driven detection rules, logged to a security file
//! - **Observability**: request IDs, response times, daily log files, Prometheus metrics
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum HTTP Server                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Middleware (Headers → Compression → Context → Timer →      │
//! │              Timeout → CORS → Catch Panic)                  │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Pipeline (Security Monitor → Request Log → Static Files)   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Handlers (health, status, metrics, /api, 404)              │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Services (HealthController) · Logger (daily files)         │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use api_server::{AppState, Config, Logger, build_router};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let logger = Arc::new(Logger::new(&config.log_dir, config.is_development()));
//!
//!     let state = AppState::new(config, logger);
//!     let app = build_router(state, None);
//!
//!     // Start the server...
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod logger;
pub mod metrics;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;
pub mod utils;

// Re-exports for convenience
pub use config::Config;
pub use error::{AppError, AppResult};
pub use logger::Logger;
pub use response::ResponseEnvelope;
pub use routes::build_router;
pub use state::AppState;
