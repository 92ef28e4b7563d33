//! Response envelope handed from controllers to the transport layer.

use axum::Json;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::Value;

/// A JSON payload, a status code and optional extra headers.
///
/// Controllers build an envelope; the route handler sends it. Sending
/// consumes the envelope, so it is written at most once.
#[derive(Debug, Clone)]
pub struct ResponseEnvelope {
    data: Value,
    status: StatusCode,
    headers: Option<HeaderMap>,
}

impl ResponseEnvelope {
    pub fn new(data: Value, status: StatusCode) -> Self {
        Self {
            data,
            status,
            headers: None,
        }
    }

    /// Attach headers applied before the body is written.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = Some(headers);
        self
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> Option<&HeaderMap> {
        self.headers.as_ref()
    }

    /// Write headers, status and JSON body into a response.
    pub fn send(self) -> Response {
        let mut response = (self.status, Json(self.data)).into_response();
        if let Some(headers) = self.headers {
            response.headers_mut().extend(headers);
        }
        response
    }
}

impl IntoResponse for ResponseEnvelope {
    fn into_response(self) -> Response {
        self.send()
    }
}
