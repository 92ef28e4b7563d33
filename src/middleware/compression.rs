//! Response compression.
//!
//! Bodies at or above the configured threshold are compressed with whatever
//! the client accepts (gzip, deflate or br). A request carrying
//! `x-no-compression` opts out.

use axum::extract::Request;
use axum::http::header::ACCEPT_ENCODING;
use axum::middleware::Next;
use axum::response::Response;
use tower_http::compression::predicate::{And, DefaultPredicate, SizeAbove};
use tower_http::compression::{CompressionLayer, Predicate};

pub const NO_COMPRESSION_HEADER: &str = "x-no-compression";

/// Compression layer for responses of at least `threshold` bytes.
pub fn compression_layer(threshold: u16) -> CompressionLayer<And<DefaultPredicate, SizeAbove>> {
    CompressionLayer::new().compress_when(DefaultPredicate::new().and(SizeAbove::new(threshold)))
}

/// Drops `Accept-Encoding` when the client sent `x-no-compression`.
///
/// Must run outside [`compression_layer`].
pub async fn honor_no_compression(mut request: Request, next: Next) -> Response {
    if request.headers().contains_key(NO_COMPRESSION_HEADER) {
        request.headers_mut().remove(ACCEPT_ENCODING);
    }
    next.run(request).await
}
