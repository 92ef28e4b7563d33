//! Ordered request pipeline run in front of the router.
//!
//! Each [`Stage`] looks at a buffered snapshot of the request and either
//! passes the context on ([`Outcome::Continue`]) or answers the request
//! itself ([`Outcome::Respond`]). The dispatcher stops at the first
//! `Respond`; when every stage continues, the request is rebuilt from the
//! buffered body and handed to the router.
//!
//! ```text
//! Request ─► buffer body ─► SecurityMonitor ─► RequestLog ─► StaticFiles ─► Router
//!               │ 413/400                                       │ file
//!               ▼                                               ▼
//!            Response                                        Response
//! ```

mod inbound;
mod request_log;
mod security;
mod static_files;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::trace;

use crate::config::Config;
use crate::logger::Logger;
use crate::middleware::RequestContext;
use crate::state::AppState;

pub use inbound::InboundRequest;
pub use request_log::RequestLogStage;
pub use security::{
    DetectionRule, SecurityEvent, SecurityMonitor, SecurityMonitorStage, Severity, default_rules,
};
pub use static_files::{
    StaticFileStage, UPLOAD_PREFIX, content_type_for, resolve_upload_path, sanitize_upload_path,
};

/// Boxed future returned by pipeline stages.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Result of running a single stage.
#[derive(Debug)]
pub enum Outcome {
    /// Hand the (unchanged) context to the next stage.
    Continue(RequestContext),
    /// Stop the pipeline and send this response.
    Respond(Response),
}

/// A single step of the request pipeline.
pub trait Stage: Send + Sync {
    /// Short name used in trace output.
    fn name(&self) -> &'static str;

    fn run<'a>(&'a self, req: &'a InboundRequest, context: RequestContext)
    -> BoxFuture<'a, Outcome>;
}

/// Ordered list of stages.
pub struct Pipeline {
    stages: Vec<Box<dyn Stage>>,
}

impl Pipeline {
    pub fn new(stages: Vec<Box<dyn Stage>>) -> Self {
        Self { stages }
    }

    /// Security monitoring, request logging and the upload file server.
    pub fn standard(config: &Config, logger: Arc<Logger>) -> Self {
        Self::new(vec![
            Box::new(SecurityMonitorStage::new(
                SecurityMonitor::with_defaults(config.max_header_count),
                logger.clone(),
            )),
            Box::new(RequestLogStage::new(logger.clone())),
            Box::new(StaticFileStage::new(config.upload_dir.clone(), logger)),
        ])
    }

    /// Run the stages in order, stopping at the first `Respond`.
    pub async fn run(&self, req: &InboundRequest, mut context: RequestContext) -> Outcome {
        for stage in &self.stages {
            match stage.run(req, context).await {
                Outcome::Continue(next) => {
                    trace!(stage = stage.name(), "Stage continued");
                    context = next;
                }
                Outcome::Respond(response) => {
                    trace!(stage = stage.name(), "Stage responded");
                    return Outcome::Respond(response);
                }
            }
        }
        Outcome::Continue(context)
    }
}

/// Middleware entry point: buffer the body, run the pipeline, then route.
pub async fn dispatch(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let context = req
        .extensions()
        .get::<RequestContext>()
        .cloned()
        .unwrap_or_else(|| RequestContext::capture(&req));

    let (parts, body) = req.into_parts();
    let inbound = match InboundRequest::buffer(&parts, body, &state.config).await {
        Ok(inbound) => inbound,
        Err(e) => return e.into_response(),
    };

    match state.pipeline.run(&inbound, context).await {
        Outcome::Respond(response) => response,
        Outcome::Continue(_) => {
            let req = Request::from_parts(parts, Body::from(inbound.body.clone()));
            next.run(req).await
        }
    }
}
