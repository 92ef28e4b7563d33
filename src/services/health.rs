//! Health, status and performance reporting.
//!
//! Every operation returns a [`ResponseEnvelope`]. Failures while building a
//! report are caught here, logged, and turned into a 500 envelope; they never
//! reach the transport layer as errors.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use sysinfo::{ProcessesToUpdate, System};
use tokio::sync::Mutex;
use tracing::instrument;

use crate::error::{AppError, AppResult};
use crate::logger::Logger;
use crate::models::{
    CpuUsage, HealthResponse, LoggingStatus, MemoryReport, MemoryUsage,
    PerformanceMetricsResponse, RuntimeEnvironment, ServicesStatus, SystemReport,
    SystemStatusResponse, UploadsStatus,
};
use crate::response::ResponseEnvelope;
use crate::utils::iso_timestamp;

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;
const RECENT_LOG_COUNT: usize = 5;
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Builds the payloads behind `/health`, `/status` and `/metrics`.
pub struct HealthController {
    environment: String,
    upload_dir: PathBuf,
    log_dir: PathBuf,
    started_at: Instant,
    logger: Arc<Logger>,
    system: Mutex<System>,
}

impl HealthController {
    pub fn new(
        environment: impl Into<String>,
        upload_dir: impl Into<PathBuf>,
        log_dir: impl Into<PathBuf>,
        started_at: Instant,
        logger: Arc<Logger>,
    ) -> Self {
        Self {
            environment: environment.into(),
            upload_dir: upload_dir.into(),
            log_dir: log_dir.into(),
            started_at,
            logger,
            system: Mutex::new(System::new()),
        }
    }

    /// Seconds since startup.
    pub fn uptime(&self) -> f64 {
        self.started_at.elapsed().as_secs_f64()
    }

    /// Liveness report; always 200 unless the payload cannot be built.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> ResponseEnvelope {
        let payload = HealthResponse {
            status: "healthy",
            timestamp: iso_timestamp(),
            uptime: self.uptime(),
            environment: self.environment.clone(),
        };

        match to_json(&payload) {
            Ok(data) => ResponseEnvelope::new(data, StatusCode::OK),
            Err(e) => {
                self.logger.log_error(&e, Some(&json!({ "operation": "health_check" })));
                ResponseEnvelope::new(
                    json!({
                        "status": "unhealthy",
                        "timestamp": iso_timestamp(),
                        "error": "Health check failed.",
                    }),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            }
        }
    }

    /// Directory probes plus process and host information.
    ///
    /// 200 when both directories can be listed, 500 `degraded` otherwise.
    #[instrument(skip(self))]
    pub async fn system_status(&self) -> ResponseEnvelope {
        let started = Instant::now();

        match self.build_system_status(started).await {
            Ok((healthy, data)) => {
                let status = if healthy {
                    StatusCode::OK
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                };
                ResponseEnvelope::new(data, status)
            }
            Err(e) => {
                self.logger.log_error(&e, Some(&json!({ "operation": "system_status" })));
                ResponseEnvelope::new(
                    json!({
                        "status": "error",
                        "timestamp": iso_timestamp(),
                        "error": "System status check failed",
                        "message": e.to_string(),
                    }),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            }
        }
    }

    /// Memory, CPU and runtime figures for this process.
    #[instrument(skip(self))]
    pub async fn performance_metrics(&self) -> ResponseEnvelope {
        match self.build_performance_metrics().await {
            Ok(data) => ResponseEnvelope::new(data, StatusCode::OK),
            Err(e) => {
                self.logger
                    .log_error(&e, Some(&json!({ "operation": "performance_metrics" })));
                ResponseEnvelope::new(
                    json!({
                        "status": "error",
                        "message": "Performance metrics failed",
                        "error": e.to_string(),
                    }),
                    StatusCode::INTERNAL_SERVER_ERROR,
                )
            }
        }
    }

    async fn build_system_status(&self, started: Instant) -> AppResult<(bool, Value)> {
        let uploads = probe_uploads(&self.upload_dir).await.unwrap_or_else(|e| {
            self.log_probe_failure("Upload directory check failed", &e);
            UploadsStatus {
                status: "unhealthy",
                upload_path: self.upload_dir.display().to_string(),
                contents: 0,
            }
        });
        let logging = probe_logs(&self.log_dir).await.unwrap_or_else(|e| {
            self.log_probe_failure("Log directory check failed", &e);
            LoggingStatus {
                status: "unhealthy",
                log_files: 0,
                recent_logs: Vec::new(),
            }
        });
        let services = ServicesStatus { uploads, logging };
        let healthy = services.is_healthy();

        let snapshot = self.sample_process(false).await?;
        let payload = SystemStatusResponse {
            status: if healthy { "healthy" } else { "degraded" },
            timestamp: iso_timestamp(),
            response_time: u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX),
            services,
            system: SystemReport {
                version: VERSION,
                platform: std::env::consts::OS,
                uptime: self.uptime().round() as u64,
                environment: self.environment.clone(),
                memory: MemoryReport {
                    rss: round_to(to_mb(snapshot.rss), 2),
                    virtual_memory: round_to(to_mb(snapshot.virtual_memory), 2),
                    system_total: round_to(to_mb(snapshot.system_total), 2),
                    system_used: round_to(to_mb(snapshot.system_used), 2),
                },
                pid: snapshot.pid,
            },
        };

        Ok((healthy, to_json(&payload)?))
    }

    async fn build_performance_metrics(&self) -> AppResult<Value> {
        let snapshot = self.sample_process(true).await?;
        let used = to_mb(snapshot.rss);
        let total = to_mb(snapshot.system_total);
        let percentage = if total > 0.0 {
            round_to(used / total * 100.0, 1)
        } else {
            0.0
        };

        let payload = PerformanceMetricsResponse {
            timestamp: iso_timestamp(),
            uptime: self.uptime(),
            memory: MemoryUsage {
                used: round_to(used, 2),
                total: round_to(total, 2),
                percentage,
            },
            cpu: CpuUsage {
                process_usage: snapshot.process_cpu,
                system_usage: snapshot.system_cpu,
                cores: snapshot.cores,
            },
            environment: RuntimeEnvironment {
                version: VERSION,
                platform: std::env::consts::OS,
                arch: std::env::consts::ARCH,
                pid: snapshot.pid,
            },
        };

        to_json(&payload)
    }

    /// The I/O error stays in the log; the report only says `unhealthy`.
    fn log_probe_failure(&self, message: &str, error: &std::io::Error) {
        self.logger.error(message, Some(&json!({ "error": error.to_string() })));
    }

    /// Refresh and read figures for the current process.
    async fn sample_process(&self, with_cpu: bool) -> AppResult<ProcessSnapshot> {
        let pid = sysinfo::get_current_pid().map_err(|e| AppError::Internal(e.to_string()))?;
        let mut system = self.system.lock().await;

        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        if with_cpu {
            system.refresh_cpu_usage();
        }

        let process = system
            .process(pid)
            .ok_or_else(|| AppError::Internal(format!("process {pid} not found")))?;

        let system_total = system.total_memory();
        Ok(ProcessSnapshot {
            pid: pid.as_u32(),
            // Clamped: a cgroup-limited total can read below RSS.
            rss: process.memory().min(system_total),
            virtual_memory: process.virtual_memory(),
            system_total,
            system_used: system.used_memory(),
            process_cpu: process.cpu_usage(),
            system_cpu: system.global_cpu_usage(),
            cores: match system.cpus().len() {
                0 => std::thread::available_parallelism().map_or(1, usize::from),
                n => n,
            },
        })
    }
}

struct ProcessSnapshot {
    pid: u32,
    rss: u64,
    virtual_memory: u64,
    system_total: u64,
    system_used: u64,
    process_cpu: f32,
    system_cpu: f32,
    cores: usize,
}

async fn probe_uploads(dir: &Path) -> std::io::Result<UploadsStatus> {
    let entries = list_dir(dir).await?;
    Ok(UploadsStatus {
        status: "healthy",
        upload_path: dir.display().to_string(),
        contents: entries.len(),
    })
}

async fn probe_logs(dir: &Path) -> std::io::Result<LoggingStatus> {
    let mut entries = list_dir(dir).await?;
    entries.retain(|name| name.ends_with(".log"));
    Ok(LoggingStatus {
        status: "healthy",
        log_files: entries.len(),
        recent_logs: recent_logs(entries),
    })
}

/// Last [`RECENT_LOG_COUNT`] `.log` names in sorted order.
fn recent_logs(mut names: Vec<String>) -> Vec<String> {
    names.retain(|name| name.ends_with(".log"));
    names.sort();
    let skip = names.len().saturating_sub(RECENT_LOG_COUNT);
    names.split_off(skip)
}

async fn list_dir(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut reader = tokio::fs::read_dir(dir).await?;
    let mut names = Vec::new();
    while let Some(entry) = reader.next_entry().await? {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

fn to_json<T: Serialize>(payload: &T) -> AppResult<Value> {
    Ok(serde_json::to_value(payload)?)
}

fn to_mb(bytes: u64) -> f64 {
    bytes as f64 / BYTES_PER_MB
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
