use axum::Json;
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::ErrorBody;
use crate::middleware::{RequestContext, RequestContextExt};
use crate::state::AppState;

/// Catch-all for requests no route or pipeline stage answered.
pub async fn not_found(State(state): State<AppState>, req: Request) -> Response {
    let context = req
        .context()
        .cloned()
        .unwrap_or_else(|| RequestContext::capture(&req));
    state
        .logger
        .warn("Route not found:", Some(&context.to_value()));

    (
        StatusCode::NOT_FOUND,
        Json(ErrorBody::new("Route not found.")),
    )
        .into_response()
}
