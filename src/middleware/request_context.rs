//! Request context middleware.
//!
//! Every inbound request gets a [`RequestContext`]: a request ID plus a
//! snapshot of the metadata that log entries are correlated by. The context
//! is stored in the request extensions for downstream middleware and
//! handlers, and the ID is echoed back in the `X-Request-ID` response header.
//!
//! Request IDs have the form `req_<unix millis>_<9 base36 chars>`. They are
//! for log correlation only; uniqueness is probabilistic, not guaranteed.

use std::task::{Context, Poll};

use axum::body::Body;
use axum::http::header::{HeaderValue, USER_AGENT};
use axum::http::{Request, Response};
use chrono::Utc;
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tower::{Layer, Service};
use tracing::{Span, trace};

use super::ip::extract_client_ip;
use crate::utils::iso_timestamp;

/// Header name for request ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Fallback header value when request ID parsing fails.
static UNKNOWN_REQUEST_ID: HeaderValue = HeaderValue::from_static("unknown");

const ID_ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const ID_SUFFIX_LEN: usize = 9;

/// Per-request metadata snapshot, immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    pub request_id: String,
    pub ip: String,
    pub user_agent: String,
    pub method: String,
    pub url: String,
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub timestamp: String,
}

impl RequestContext {
    /// Capture the context of an inbound request with a fresh request ID.
    pub fn capture<B>(req: &Request<B>) -> Self {
        let url = req
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| req.uri().path().to_string());

        Self {
            request_id: generate_request_id(),
            ip: extract_client_ip(req).into_owned(),
            user_agent: req
                .headers()
                .get(USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            method: req.method().to_string(),
            url,
            timestamp: iso_timestamp(),
        }
    }

    /// The context as a JSON object.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Merge the context fields into `extra`, context fields taking precedence.
    ///
    /// Non-object `extra` values are kept under a `details` key.
    pub fn merged_with(&self, extra: Value) -> Value {
        let mut fields = match extra {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                map.insert("details".to_string(), other);
                map
            }
        };

        if let Value::Object(context) = self.to_value() {
            fields.extend(context);
        }

        Value::Object(fields)
    }
}

/// Generate a request ID from the current time and a random base36 suffix.
pub fn generate_request_id() -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..ID_SUFFIX_LEN)
        .map(|_| {
            let idx = rng.random_range(0..ID_ALPHABET.len());
            char::from(ID_ALPHABET.get(idx).copied().unwrap_or(b'0'))
        })
        .collect();

    format!("req_{}_{suffix}", Utc::now().timestamp_millis())
}

/// Request context layer for Tower middleware stack.
#[derive(Clone, Default)]
pub struct RequestContextLayer;

impl RequestContextLayer {
    /// Create a new request context layer.
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for RequestContextLayer {
    type Service = RequestContextService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestContextService { inner }
    }
}

/// Request context service wrapper.
#[derive(Clone)]
pub struct RequestContextService<S> {
    inner: S,
}

impl<S> Service<Request<Body>> for RequestContextService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<Body>) -> Self::Future {
        let context = RequestContext::capture(&req);
        let header_value = context
            .request_id
            .parse()
            .unwrap_or_else(|_| UNKNOWN_REQUEST_ID.clone());

        Span::current().record("request_id", context.request_id.as_str());
        trace!(request_id = %context.request_id, "Request context created");

        req.extensions_mut().insert(context);

        // Take the service that was driven to readiness, leave a clone behind
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let mut response = inner.call(req).await?;
            response.headers_mut().insert(REQUEST_ID_HEADER, header_value);
            Ok(response)
        })
    }
}

/// Extension trait to read the request context from requests.
pub trait RequestContextExt {
    /// Get the context attached by [`RequestContextLayer`].
    fn context(&self) -> Option<&RequestContext>;
}

impl<B> RequestContextExt for Request<B> {
    fn context(&self) -> Option<&RequestContext> {
        self.extensions().get::<RequestContext>()
    }
}
