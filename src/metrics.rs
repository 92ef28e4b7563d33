//! Prometheus metrics for the HTTP server.
//!
//! The exporter is optional: it runs on its own listener when `METRICS_PORT`
//! is non-zero. Recording functions are no-ops until it is installed.
//!
//! # Available Metrics
//!
//! ## Counters
//! - `http_requests_total` - Completed requests (labels: method, status)
//! - `http_slow_requests_total` - Requests over the slow-response threshold
//! - `http_request_timeouts_total` - Requests answered with 408 by the timeout layer
//! - `security_events_total` - Security monitor findings (label: severity)
//! - `http_panics_total` - Handler panics caught by the server
//!
//! ## Histograms
//! - `http_request_duration_seconds` - Request duration (labels: method, status)

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::{error, info};

/// Metric names as constants for consistency.
pub mod names {
    pub const REQUESTS_TOTAL: &str = "http_requests_total";
    pub const SLOW_REQUESTS_TOTAL: &str = "http_slow_requests_total";
    pub const REQUEST_TIMEOUTS_TOTAL: &str = "http_request_timeouts_total";
    pub const SECURITY_EVENTS_TOTAL: &str = "security_events_total";
    pub const PANICS_TOTAL: &str = "http_panics_total";
    pub const REQUEST_DURATION_SECONDS: &str = "http_request_duration_seconds";
}

/// Install the Prometheus exporter on `metrics_addr` and describe all metrics.
///
/// # Errors
///
/// Returns a message if the exporter could not be installed (port in use,
/// or a recorder is already registered).
pub fn init_metrics(metrics_addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(metrics_addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {e}"))?;

    describe_counter!(names::REQUESTS_TOTAL, "Total number of completed HTTP requests");
    describe_counter!(
        names::SLOW_REQUESTS_TOTAL,
        "Requests slower than the slow-response threshold"
    );
    describe_counter!(
        names::REQUEST_TIMEOUTS_TOTAL,
        "Requests answered with 408 Request Timeout"
    );
    describe_counter!(
        names::SECURITY_EVENTS_TOTAL,
        "Suspicious request findings by severity"
    );
    describe_counter!(names::PANICS_TOTAL, "Handler panics caught by the server");
    describe_histogram!(
        names::REQUEST_DURATION_SECONDS,
        "HTTP request duration in seconds"
    );

    info!(addr = %metrics_addr, "Prometheus metrics endpoint started");
    Ok(())
}

/// Initialize metrics, logging failures instead of returning them.
pub fn try_init_metrics(metrics_addr: SocketAddr) {
    if let Err(e) = init_metrics(metrics_addr) {
        error!(error = %e, "Failed to initialize metrics, continuing without metrics");
    }
}

/// Record a completed request and its duration.
pub fn record_request_duration(method: &str, status: &str, duration_secs: f64) {
    counter!(names::REQUESTS_TOTAL, "method" => method.to_string(), "status" => status.to_string())
        .increment(1);
    histogram!(names::REQUEST_DURATION_SECONDS, "method" => method.to_string(), "status" => status.to_string())
        .record(duration_secs);
}

pub fn record_slow_request() {
    counter!(names::SLOW_REQUESTS_TOTAL).increment(1);
}

pub fn record_request_timeout() {
    counter!(names::REQUEST_TIMEOUTS_TOTAL).increment(1);
}

pub fn record_security_event(severity: &str) {
    counter!(names::SECURITY_EVENTS_TOTAL, "severity" => severity.to_string()).increment(1);
}

pub fn record_panic() {
    counter!(names::PANICS_TOTAL).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    // Recording without an installed exporter must be a silent no-op.

    #[test]
    fn test_record_request_duration() {
        record_request_duration("GET", "200", 0.01);
    }

    #[test]
    fn test_record_counters() {
        record_slow_request();
        record_request_timeout();
        record_security_event("HIGH");
        record_panic();
    }
}
