//! Static file server for the upload directory.
//!
//! `GET /upload/<path>` streams `<upload_dir>/<path>` when it is a regular
//! file. The path is percent-decoded first, then traversal is handled
//! lexically: empty, `.` and `..` components are dropped before joining, so
//! the joined path never leaves the upload root. Symlinks inside the root
//! are followed as-is.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use super::{BoxFuture, InboundRequest, Outcome, Stage};
use crate::error::AppError;
use crate::logger::Logger;
use crate::middleware::RequestContext;

/// URL prefix served from the upload directory.
pub const UPLOAD_PREFIX: &str = "/upload";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Strip leading slashes and every `.`/`..` component from a request sub-path.
pub fn sanitize_upload_path(sub_path: &str) -> PathBuf {
    sub_path
        .split(['/', '\\'])
        .filter(|segment| !segment.is_empty() && *segment != "." && *segment != "..")
        .collect()
}

/// Join a sanitized sub-path onto the upload root.
pub fn resolve_upload_path(root: &Path, sub_path: &str) -> PathBuf {
    root.join(sanitize_upload_path(sub_path))
}

/// Content type for a file, chosen by extension.
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("svg") => "image/svg+xml",
        Some("txt") => "text/plain",
        _ => DEFAULT_CONTENT_TYPE,
    }
}

/// Sub-path below [`UPLOAD_PREFIX`], or `None` if the request is elsewhere.
fn upload_sub_path(path: &str) -> Option<&str> {
    let rest = path.strip_prefix(UPLOAD_PREFIX)?;
    (rest.is_empty() || rest.starts_with('/')).then_some(rest)
}

/// Pipeline stage serving files from the upload directory.
pub struct StaticFileStage {
    root: PathBuf,
    logger: Arc<Logger>,
}

impl StaticFileStage {
    pub fn new(root: PathBuf, logger: Arc<Logger>) -> Self {
        Self { root, logger }
    }

    async fn serve(&self, req: &InboundRequest, context: RequestContext) -> Outcome {
        if req.method != Method::GET && req.method != Method::HEAD {
            return Outcome::Continue(context);
        }
        let Some(sub_path) = upload_sub_path(req.path()) else {
            return Outcome::Continue(context);
        };

        let Ok(decoded) = urlencoding::decode(sub_path) else {
            return Outcome::Continue(context);
        };
        let target = resolve_upload_path(&self.root, &decoded);
        self.logger.info(
            &format!(
                "Static file request: {} {} -> {}",
                req.method,
                req.original_url(),
                target.display()
            ),
            None,
        );

        let metadata = match tokio::fs::metadata(&target).await {
            Ok(metadata) => metadata,
            Err(_) => {
                self.logger
                    .warn(&format!("File not found: {}", target.display()), None);
                return Outcome::Continue(context);
            }
        };
        if !metadata.is_file() {
            return Outcome::Continue(context);
        }

        self.logger.info(
            &format!(
                "File exists and will be served: {} ({} bytes)",
                target.display(),
                metadata.len()
            ),
            None,
        );

        let file = match File::open(&target).await {
            Ok(file) => file,
            Err(e) => {
                self.logger.log_error(
                    &e,
                    Some(&context.merged_with(json!({ "path": target.display().to_string() }))),
                );
                return Outcome::Respond(AppError::Io(e).into_response());
            }
        };

        let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
        *response.status_mut() = StatusCode::OK;
        let headers = response.headers_mut();
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_static(content_type_for(&target)),
        );
        headers.insert(CONTENT_LENGTH, HeaderValue::from(metadata.len()));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        Outcome::Respond(response)
    }
}

impl Stage for StaticFileStage {
    fn name(&self) -> &'static str {
        "static_files"
    }

    fn run<'a>(
        &'a self,
        req: &'a InboundRequest,
        context: RequestContext,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(self.serve(req, context))
    }
}
