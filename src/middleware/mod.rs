//! HTTP middleware wrapping every request.
//!
//! - **Request context**: request ID, client IP and timing captured once per request
//! - **Response time**: `X-Response-Time` header and slow-request reporting
//! - **Timeout**: a single 408 when the handler runs past the limit
//! - **Compression**: gzip/deflate/br above a size threshold, with an opt-out header
//! - **Security headers**: defaults added to every response
//!
//! # Architecture
//!
//! ```text
//! Request → Security headers → Compression → Request context → Response time → Timeout → Router
//!                  ↓                 ↓                ↓                  ↓              ↓
//!            nosniff, HSTS…    Content-Encoding   X-Request-ID     X-Response-Time     408
//! ```

pub mod compression;
pub mod ip;
pub mod request_context;
pub mod response_time;
pub mod security_headers;
pub mod timeout;

pub use compression::{NO_COMPRESSION_HEADER, compression_layer, honor_no_compression};
pub use ip::{UNKNOWN_IP, extract_client_ip};
pub use request_context::{
    REQUEST_ID_HEADER, RequestContext, RequestContextExt, RequestContextLayer,
    generate_request_id,
};
pub use response_time::{RESPONSE_TIME_HEADER, ResponseTimer, track_response_time};
pub use security_headers::{SecurityHeadersLayer, apply_security_headers};
pub use timeout::{RequestCancellation, RequestTimeout, enforce_timeout};
