//! Request timeout enforcement.
//!
//! The downstream future is raced against a timer. A [`RequestCancellation`]
//! token is placed in the request extensions so handlers that spawn work
//! can stop it once the request has been given up on.
//!
//! # Ordering
//!
//! The race is polled with `biased`, handler first. If the handler is ready
//! on the same poll the timer fires, the handler's response wins. Otherwise
//! the token is cancelled, the handler future is dropped, and a single 408
//! is returned, so a request never produces two responses.
//!
//! The timer stops once the response head is produced; streaming the body
//! afterwards is not timed.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use super::request_context::RequestContext;
use crate::error::AppError;
use crate::logger::Logger;
use crate::metrics;

/// Cancellation token for the current request, stored in request extensions.
///
/// Cancelled when the request times out.
#[derive(Debug, Clone, Default)]
pub struct RequestCancellation(CancellationToken);

impl RequestCancellation {
    pub fn is_cancelled(&self) -> bool {
        self.0.is_cancelled()
    }

    /// Resolves once the request has timed out.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.0.cancelled()
    }

    pub fn token(&self) -> CancellationToken {
        self.0.clone()
    }
}

/// State for [`enforce_timeout`].
#[derive(Clone)]
pub struct RequestTimeout {
    limit: Duration,
    logger: Arc<Logger>,
}

impl RequestTimeout {
    pub fn new(limit: Duration, logger: Arc<Logger>) -> Self {
        Self { limit, logger }
    }

    pub fn limit(&self) -> Duration {
        self.limit
    }
}

/// Middleware answering 408 when the downstream service exceeds the limit.
pub async fn enforce_timeout(
    State(timeout): State<RequestTimeout>,
    mut request: Request,
    next: Next,
) -> Response {
    let cancellation = RequestCancellation::default();
    request.extensions_mut().insert(cancellation.clone());
    let context = request.extensions().get::<RequestContext>().cloned();

    tokio::select! {
        biased;

        response = next.run(request) => response,
        _ = tokio::time::sleep(timeout.limit) => {
            cancellation.0.cancel();
            metrics::record_request_timeout();

            let meta = context.map(|c| c.to_value());
            timeout.logger.log_error(&AppError::RequestTimeout, meta.as_ref());

            AppError::RequestTimeout.into_response()
        }
    }
}
