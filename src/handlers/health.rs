//! Health, status and metrics endpoints.
//!
//! # Endpoints
//!
//! - `GET /health` - Liveness with uptime and environment
//! - `GET /status` - Upload/log directory probes plus process details
//! - `GET /metrics` - Memory, CPU and runtime figures
//!
//! # Health vs Status
//!
//! - **Health** (`/health`): 200 whenever the process can answer
//! - **Status** (`/status`): 500 with `"degraded"` if either directory probe fails

use axum::extract::State;
use tracing::instrument;

use crate::response::ResponseEnvelope;
use crate::state::AppState;

/// Liveness check.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-01-15T10:30:00.000Z",
///   "uptime": 3600.5,
///   "environment": "development"
/// }
/// ```
#[instrument(skip(state))]
pub async fn health_check(State(state): State<AppState>) -> ResponseEnvelope {
    state.health.health_check().await
}

/// Detailed system status.
///
/// # Response Body
///
/// ```json
/// {
///   "status": "healthy",
///   "timestamp": "2024-01-15T10:30:00.000Z",
///   "responseTime": 2,
///   "services": {
///     "uploads": { "status": "healthy", "uploadPath": "upload", "contents": 3 },
///     "logging": { "status": "healthy", "logFiles": 6, "recentLogs": ["2024-01-15.log"] }
///   },
///   "system": {
///     "version": "0.1.0",
///     "platform": "linux",
///     "uptime": 3601,
///     "environment": "development",
///     "memory": { "rss": 12.5, "virtual": 310.2, "systemTotal": 15872.0, "systemUsed": 6120.4 },
///     "pid": 4242
///   }
/// }
/// ```
#[instrument(skip(state))]
pub async fn system_status(State(state): State<AppState>) -> ResponseEnvelope {
    state.health.system_status().await
}

/// Performance metrics for this process.
#[instrument(skip(state))]
pub async fn performance_metrics(State(state): State<AppState>) -> ResponseEnvelope {
    state.health.performance_metrics().await
}
