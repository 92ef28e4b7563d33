//! Application routing configuration with middleware stack.
//!
//! # Middleware Stack (outermost first)
//!
//! ```text
//! Request
//!    │
//!    ▼
//! ┌──────────────────┐
//! │     Tracing      │ ← HTTP request/response spans
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Security Headers │ ← nosniff, SAMEORIGIN, HSTS, …
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Compression    │ ← gzip/deflate/br above threshold, x-no-compression opt-out
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │ Request Context  │ ← X-Request-ID, client IP, context in extensions
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │  Response Time   │ ← X-Response-Time, slow request log
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Timeout      │ ← 408 when the request runs too long
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │      CORS        │ ← Cross-origin headers, preflight
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │   Catch Panic    │ ← 500 and graceful shutdown on handler panic
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐
//! │     Pipeline     │ ← body limits, security monitor, request log, /upload files
//! └────────┬─────────┘
//!          ▼
//!   Router / 404 fallback
//! ```
//!
//! # Route Groups
//!
//! - `/health`, `/status`, `/metrics` - Health & monitoring
//! - `/upload/*` - Files from the upload directory (served by the pipeline)
//! - `/api/*` - Optional application router supplied by the caller

use std::any::Any;

use axum::Json;
use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use serde_json::json;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowHeaders, AllowMethods, Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::ErrorBody;
use crate::handlers;
use crate::logger::Logger;
use crate::metrics;
use crate::middleware::{
    RequestContextLayer, RequestTimeout, ResponseTimer, SecurityHeadersLayer, compression_layer,
    enforce_timeout, honor_no_compression, track_response_time,
};
use crate::pipeline;
use crate::state::AppState;

/// Prefix under which an application router is nested.
pub const API_PREFIX: &str = "/api";

/// Build the application router with all routes and middleware configured.
///
/// `api`, when given, is nested under `/api`. Without it every `/api`
/// request falls through to the 404 handler.
pub fn build_router(state: AppState, api: Option<Router<AppState>>) -> Router {
    let config = state.config.clone();

    // =========================================================================
    // Build Router with Routes
    // =========================================================================
    let mut router = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/status", get(handlers::system_status))
        .route("/metrics", get(handlers::performance_metrics));

    if let Some(api) = api {
        info!(prefix = API_PREFIX, "Application routes mounted");
        router = router.nest(API_PREFIX, api);
    }

    router = router.fallback(handlers::not_found);

    // =========================================================================
    // Apply Middleware Stack (order matters - applied bottom to top)
    // =========================================================================

    // 1. Pipeline: body buffering, security monitor, request log, static files
    router = router.layer(axum::middleware::from_fn_with_state(
        state.clone(),
        pipeline::dispatch,
    ));
    router = router.layer(DefaultBodyLimit::max(config.max_body_size()));
    info!(
        json_limit = config.json_limit,
        urlencoded_limit = config.urlencoded_limit,
        "Request body limits configured"
    );

    // 2. Panic handler
    router = router.layer(CatchPanicLayer::custom(panic_responder(&state)));

    // 3. CORS
    router = router.layer(build_cors_layer(&config.cors_origins));

    // 4. Timeout
    info!(timeout_ms = config.request_timeout.as_millis(), "Request timeout configured");
    router = router.layer(axum::middleware::from_fn_with_state(
        RequestTimeout::new(config.request_timeout, state.logger.clone()),
        enforce_timeout,
    ));

    // 5. Response time
    router = router.layer(axum::middleware::from_fn_with_state(
        ResponseTimer::new(config.slow_response_threshold, state.logger.clone()),
        track_response_time,
    ));

    // 6. Request context
    router = router.layer(RequestContextLayer::new());

    // 7. Compression, with the opt-out header stripped before it
    info!(
        threshold_bytes = config.compression_threshold,
        "Response compression enabled"
    );
    router = router.layer(compression_layer(config.compression_threshold));
    router = router.layer(axum::middleware::from_fn(honor_no_compression));

    // 8. Security headers
    router = router.layer(SecurityHeadersLayer::new());

    // 9. Tracing
    router = router.layer(TraceLayer::new_for_http());

    router.with_state(state)
}

/// Panic responder: log, start a graceful shutdown, answer 500.
fn panic_responder(
    state: &AppState,
) -> impl Fn(Box<dyn Any + Send + 'static>) -> Response + Clone + Send + Sync + 'static {
    let logger = state.logger.clone();
    let shutdown = state.shutdown_token();

    move |panic: Box<dyn Any + Send + 'static>| {
        report_panic(&logger, panic_message(&*panic));
        shutdown.cancel();

        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(
                ErrorBody::new("Internal server error")
                    .with_message("An internal error occurred."),
            ),
        )
            .into_response()
    }
}

fn report_panic(logger: &Logger, message: &str) {
    metrics::record_panic();
    logger.error("Uncaught panic:", Some(&json!({ "panic": message })));
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    }
}

/// Build CORS layer from configuration.
///
/// `*` allows any origin without credentials. An explicit list allows
/// credentials and mirrors the requested methods and headers.
fn build_cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_any = allowed_origins.iter().any(|o| o == "*");

    if allow_any {
        CorsLayer::new()
            .allow_origin(AnyOrigin)
            .allow_methods(AnyOrigin)
            .allow_headers(AnyOrigin)
    } else {
        let origins: Vec<_> = allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_credentials(true)
            .allow_methods(AllowMethods::mirror_request())
            .allow_headers(AllowHeaders::mirror_request())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::config::Config;
    use crate::logger::LogFile;
    use crate::middleware::REQUEST_ID_HEADER;
    use axum::body::Body;
    use axum::extract::Request;
    use axum::routing::post;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct Harness {
        dir: TempDir,
        state: AppState,
    }

    impl Harness {
        fn new() -> Self {
            Self::with_config(|_| {})
        }

        fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
            let dir = TempDir::new().unwrap();
            let mut config = Config {
                upload_dir: dir.path().join("upload"),
                log_dir: dir.path().join("logs"),
                ..Config::default()
            };
            tweak(&mut config);
            std::fs::create_dir_all(&config.upload_dir).unwrap();
            let logger = Arc::new(Logger::new(&config.log_dir, false));
            let state = AppState::new(config, logger);
            Self { dir, state }
        }

        fn app(&self) -> Router {
            let api = Router::new()
                .route("/echo", post(|body: String| async move { body }))
                .route("/slow", get(slow))
                .route("/boom", get(boom));
            build_router(self.state.clone(), Some(api))
        }

        fn log(&self, file: LogFile) -> String {
            let path = self
                .state
                .logger
                .file_path(file, chrono::Utc::now().date_naive());
            std::fs::read_to_string(path).unwrap_or_default()
        }
    }

    async fn slow() -> &'static str {
        tokio::time::sleep(Duration::from_secs(5)).await;
        "late"
    }

    async fn boom() -> &'static str {
        panic!("handler exploded")
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get_req(uri: &str) -> Request {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let harness = Harness::new();

        let response = harness.app().oneshot(get_req("/nope")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({"success": false, "error": "Route not found."})
        );
        assert!(harness.log(LogFile::General).contains("WARN: Route not found:"));
    }

    #[tokio::test]
    async fn test_api_without_router_is_404() {
        let harness = Harness::new();
        let app = build_router(harness.state.clone(), None);

        let response = app.oneshot(get_req("/api/anything")).await.unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_health_has_ambient_headers() {
        let harness = Harness::new();

        let response = harness.app().oneshot(get_req("/health")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert!(!headers[REQUEST_ID_HEADER].is_empty());
        assert!(headers.contains_key("x-response-time"));
        assert_eq!(headers["x-content-type-options"], "nosniff");
        assert_eq!(headers["x-frame-options"], "SAMEORIGIN");
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_request_ids_are_unique() {
        let harness = Harness::new();
        let app = harness.app();
        let mut seen = HashSet::new();

        for _ in 0..20 {
            let response = app.clone().oneshot(get_req("/health")).await.unwrap();
            let id = response.headers()[REQUEST_ID_HEADER]
                .to_str()
                .unwrap()
                .to_string();
            assert!(seen.insert(id), "duplicate request id");
        }
    }

    #[tokio::test]
    async fn test_sql_injection_body_is_logged_and_served() {
        let harness = Harness::new();

        let response = harness
            .app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"name":"'; DROP TABLE users;--"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let security = harness.log(LogFile::Security);
        assert!(security.contains("Security event: Suspicious request detected:"));
        assert!(security.contains("\"severity\":\"HIGH\""));
    }

    #[tokio::test]
    async fn test_encoded_form_injection_is_logged() {
        let harness = Harness::new();

        for body in ["user=x%27%3B--", "url=javascript%3Aalert%281%29"] {
            let response = harness
                .app()
                .oneshot(
                    Request::builder()
                        .method("POST")
                        .uri("/api/echo")
                        .header("content-type", "application/x-www-form-urlencoded")
                        .body(Body::from(body))
                        .unwrap(),
                )
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let security = harness.log(LogFile::Security);
        assert_eq!(security.matches("Suspicious request detected:").count(), 2);
        assert!(security.contains("\"severity\":\"HIGH\""));
        assert!(security.contains("x';--"));
    }

    #[tokio::test]
    async fn test_excessive_headers_logged_as_medium() {
        let harness = Harness::new();
        let mut builder = Request::builder().uri("/health");
        for i in 0..55 {
            builder = builder.header(format!("x-extra-{i}"), "1");
        }

        let response = harness
            .app()
            .oneshot(builder.body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let security = harness.log(LogFile::Security);
        assert!(security.contains("Excessive headers detected:"));
        assert!(security.contains("\"severity\":\"MEDIUM\""));
    }

    #[tokio::test]
    async fn test_benign_request_has_no_security_entry() {
        let harness = Harness::new();

        harness.app().oneshot(get_req("/health")).await.unwrap();

        assert!(harness.log(LogFile::Security).is_empty());
    }

    #[tokio::test]
    async fn test_slow_handler_times_out_once() {
        let harness = Harness::with_config(|c| c.request_timeout = Duration::from_millis(50));

        let response = harness.app().oneshot(get_req("/api/slow")).await.unwrap();

        assert_eq!(response.status(), StatusCode::REQUEST_TIMEOUT);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let body = json_body(response).await;
        assert_eq!(body["error"], "Request timeout");
        assert!(harness.log(LogFile::Error).contains("Request timeout"));
    }

    #[tokio::test]
    async fn test_upload_file_is_served() {
        let harness = Harness::new();
        std::fs::write(harness.dir.path().join("upload/logo.svg"), "<svg/>").unwrap();

        let response = harness
            .app()
            .oneshot(get_req("/upload/logo.svg"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "image/svg+xml");
        assert_eq!(response.headers()["cache-control"], "no-cache");
    }

    #[tokio::test]
    async fn test_upload_traversal_falls_through_to_404() {
        let harness = Harness::new();
        std::fs::write(harness.dir.path().join("secret.txt"), "secret").unwrap();

        let response = harness
            .app()
            .oneshot(get_req("/upload/../secret.txt"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_json_is_400() {
        let harness = Harness::new();

        let response = harness
            .app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/echo")
                    .header("content-type", "application/json")
                    .body(Body::from("{oops"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn test_oversized_body_is_413() {
        let harness = Harness::with_config(|c| c.json_limit = 16);

        let response = harness
            .app()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/echo")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"padding":"0123456789abcdef"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_panic_returns_500_and_requests_shutdown() {
        let harness = Harness::new();

        let response = harness.app().oneshot(get_req("/api/boom")).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(harness.state.is_shutting_down());
        assert!(harness.log(LogFile::Error).contains("Uncaught panic:"));
    }

    #[tokio::test]
    async fn test_cors_preflight_for_listed_origin() {
        let harness = Harness::new();

        let response = harness
            .app()
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/health")
                    .header("origin", "http://localhost:3001")
                    .header("access-control-request-method", "GET")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["access-control-allow-origin"],
            "http://localhost:3001"
        );
        assert_eq!(response.headers()["access-control-allow-credentials"], "true");
    }

    #[tokio::test]
    async fn test_unlisted_origin_served_without_cors_grant() {
        let harness = Harness::new();

        let response = harness
            .app()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .header("origin", "http://evil.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("access-control-allow-origin").is_none());
    }

    #[test]
    fn test_build_cors_layer_any() {
        let _layer = build_cors_layer(&["*".to_string()]);
    }

    #[test]
    fn test_panic_message_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(String::from("owned"));
        let borrowed: Box<dyn Any + Send> = Box::new("borrowed");
        let other: Box<dyn Any + Send> = Box::new(7_u8);

        assert_eq!(panic_message(&*owned), "owned");
        assert_eq!(panic_message(&*borrowed), "borrowed");
        assert_eq!(panic_message(&*other), "unknown panic payload");
    }
}
