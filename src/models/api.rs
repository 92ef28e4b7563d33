//! Response payloads for the health endpoints.
//!
//! Field names are camelCase on the wire.

use serde::Serialize;

/// `GET /health` success body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    /// RFC 3339 with milliseconds.
    pub timestamp: String,
    /// Seconds since startup.
    pub uptime: f64,
    pub environment: String,
}

/// Result of listing the upload directory.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadsStatus {
    /// `healthy`, or `unhealthy` when the directory cannot be listed.
    pub status: &'static str,
    pub upload_path: String,
    /// Number of entries in the directory.
    pub contents: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingStatus {
    pub status: &'static str,
    /// Number of `.log` files.
    pub log_files: usize,
    /// Up to five most recent `.log` file names, in sorted order.
    pub recent_logs: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServicesStatus {
    pub uploads: UploadsStatus,
    pub logging: LoggingStatus,
}

impl ServicesStatus {
    pub fn is_healthy(&self) -> bool {
        self.uploads.status == "healthy" && self.logging.status == "healthy"
    }
}

/// Process and host memory in megabytes, two decimals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryReport {
    pub rss: f64,
    #[serde(rename = "virtual")]
    pub virtual_memory: f64,
    pub system_total: f64,
    pub system_used: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemReport {
    pub version: &'static str,
    pub platform: &'static str,
    /// Whole seconds since startup.
    pub uptime: u64,
    pub environment: String,
    pub memory: MemoryReport,
    pub pid: u32,
}

/// `GET /status` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemStatusResponse {
    pub status: &'static str,
    pub timestamp: String,
    /// Milliseconds spent building the report.
    pub response_time: u64,
    pub services: ServicesStatus,
    pub system: SystemReport,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryUsage {
    /// Process resident memory, MB.
    pub used: f64,
    /// System memory, MB.
    pub total: f64,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    /// Percent of one core used by this process.
    pub process_usage: f32,
    /// Percent across all cores.
    pub system_usage: f32,
    pub cores: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RuntimeEnvironment {
    pub version: &'static str,
    pub platform: &'static str,
    pub arch: &'static str,
    pub pid: u32,
}

/// `GET /metrics` body.
#[derive(Debug, Clone, Serialize)]
pub struct PerformanceMetricsResponse {
    pub timestamp: String,
    pub uptime: f64,
    pub memory: MemoryUsage,
    pub cpu: CpuUsage,
    pub environment: RuntimeEnvironment,
}
