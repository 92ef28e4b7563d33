//! Response time measurement and slow-request reporting.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::{Request, State};
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;

use super::request_context::RequestContext;
use crate::logger::Logger;
use crate::metrics;

pub const RESPONSE_TIME_HEADER: &str = "x-response-time";

/// State for [`track_response_time`].
#[derive(Clone)]
pub struct ResponseTimer {
    slow_threshold: Duration,
    logger: Arc<Logger>,
}

impl ResponseTimer {
    pub fn new(slow_threshold: Duration, logger: Arc<Logger>) -> Self {
        Self {
            slow_threshold,
            logger,
        }
    }

    pub fn is_slow(&self, elapsed: Duration) -> bool {
        elapsed > self.slow_threshold
    }
}

/// Milliseconds with three decimals, e.g. `12.345ms`.
pub fn format_response_time(elapsed: Duration) -> String {
    format!("{:.3}ms", elapsed.as_secs_f64() * 1000.0)
}

/// Middleware stamping `X-Response-Time` and logging requests over the threshold.
///
/// Time is measured until the response head is produced.
pub async fn track_response_time(
    State(timer): State<ResponseTimer>,
    request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();
    let method = request.method().clone();
    let context = request.extensions().get::<RequestContext>().cloned();

    let mut response = next.run(request).await;
    let elapsed = started.elapsed();

    if let Ok(value) = HeaderValue::from_str(&format_response_time(elapsed)) {
        response.headers_mut().insert(RESPONSE_TIME_HEADER, value);
    }
    metrics::record_request_duration(
        method.as_str(),
        response.status().as_str(),
        elapsed.as_secs_f64(),
    );

    if timer.is_slow(elapsed) {
        metrics::record_slow_request();
        let meta = context.map(|c| c.to_value());
        timer
            .logger
            .log_performance("HTTP request", elapsed, meta.as_ref());
    }

    response
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::Router;
    use axum::body::Body;
    use axum::routing::get;
    use tempfile::TempDir;
    use tower::ServiceExt;

    #[test]
    fn test_format_response_time() {
        assert_eq!(format_response_time(Duration::from_micros(12_345)), "12.345ms");
        assert_eq!(format_response_time(Duration::ZERO), "0.000ms");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        let dir = TempDir::new().unwrap();
        let timer = ResponseTimer::new(
            Duration::from_millis(1000),
            Arc::new(Logger::new(dir.path(), false)),
        );

        assert!(!timer.is_slow(Duration::from_millis(1000)));
        assert!(timer.is_slow(Duration::from_millis(1001)));
    }

    #[tokio::test]
    async fn test_header_is_set() {
        let dir = TempDir::new().unwrap();
        let timer = ResponseTimer::new(
            Duration::from_secs(1),
            Arc::new(Logger::new(dir.path(), false)),
        );
        let app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(axum::middleware::from_fn_with_state(timer, track_response_time));

        let response = app
            .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let value = response.headers()[RESPONSE_TIME_HEADER].to_str().unwrap();
        assert!(value.ends_with("ms"), "unexpected header {value}");
    }
}
