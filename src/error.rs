use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error types with appropriate HTTP status codes.
///
/// Client-facing variants (`BadRequest`, `PayloadTooLarge`, `RequestTimeout`)
/// carry a message that is safe to return. Everything else
/// is answered with a generic message and logged server-side.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Payload too large: limit is {limit} bytes")]
    PayloadTooLarge { limit: usize },

    #[error("Request timeout")]
    RequestTimeout,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Error response body, shared with the route-not-found and timeout responses.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl AppError {
    /// HTTP status this error is answered with.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            AppError::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_)
            | AppError::ConfigError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn body(&self) -> ErrorBody {
        match self {
            AppError::BadRequest(msg) => ErrorBody::new("Bad request").with_message(msg.as_str()),
            AppError::PayloadTooLarge { .. } => ErrorBody::new("Payload too large")
                .with_message("The request body exceeds the configured limit."),
            AppError::RequestTimeout => ErrorBody::new("Request timeout")
                .with_message("The request took too long to process."),
            // Never expose internal details to clients
            AppError::Io(_)
            | AppError::Serialization(_)
            | AppError::Internal(_)
            | AppError::ConfigError(_) => ErrorBody::new("Internal server error")
                .with_message("An internal error occurred."),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        } else {
            tracing::debug!(error = %self, "Request rejected");
        }

        (status, axum::Json(self.body())).into_response()
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::BadRequest("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::PayloadTooLarge { limit: 1 }.status_code(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
        assert_eq!(
            AppError::RequestTimeout.status_code(),
            StatusCode::REQUEST_TIMEOUT
        );
        assert_eq!(
            AppError::Internal("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_timeout_body_matches_wire_format() {
        let body = serde_json::to_value(AppError::RequestTimeout.body()).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "success": false,
                "error": "Request timeout",
                "message": "The request took too long to process."
            })
        );
    }

    #[test]
    fn test_internal_error_hides_details() {
        let body = AppError::Internal("database password leaked".into()).body();

        assert_eq!(body.error, "Internal server error");
        assert!(!body.message.unwrap().contains("password"));
    }

    #[test]
    fn test_error_body_without_message_omits_field() {
        let body = serde_json::to_value(ErrorBody::new("Route not found.")).unwrap();

        assert_eq!(
            body,
            serde_json::json!({ "success": false, "error": "Route not found." })
        );
    }
}
