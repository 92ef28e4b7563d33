use std::sync::Arc;

use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde_json::{Map, Value};

use super::{BoxFuture, InboundRequest, Outcome, Stage};
use crate::logger::Logger;
use crate::middleware::RequestContext;

/// Logs every request that reaches the pipeline at info level.
pub struct RequestLogStage {
    logger: Arc<Logger>,
}

impl RequestLogStage {
    pub fn new(logger: Arc<Logger>) -> Self {
        Self { logger }
    }
}

/// Log metadata for a request; empty body, params and query are left out.
pub(super) fn request_summary(req: &InboundRequest) -> Value {
    let mut fields = Map::new();
    let header = |name: &str| {
        req.header(name)
            .map(|v| Value::String(v.to_string()))
            .unwrap_or(Value::Null)
    };

    fields.insert("contentType".to_string(), header(CONTENT_TYPE.as_str()));
    fields.insert("contentLength".to_string(), header(CONTENT_LENGTH.as_str()));

    let non_empty_body = req.parsed_body.as_ref().filter(|body| match body {
        Value::Object(map) => !map.is_empty(),
        Value::Null => false,
        _ => true,
    });
    if let Some(body) = non_empty_body {
        fields.insert("body".to_string(), body.clone());
    }
    if !req.params.is_empty() {
        fields.insert("params".to_string(), Value::Object(req.params.clone()));
    }
    if !req.query.is_empty() {
        fields.insert("query".to_string(), Value::Object(req.query.clone()));
    }

    Value::Object(fields)
}

impl Stage for RequestLogStage {
    fn name(&self) -> &'static str {
        "request_log"
    }

    fn run<'a>(
        &'a self,
        req: &'a InboundRequest,
        context: RequestContext,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            let meta = context.merged_with(request_summary(req));
            self.logger.info("Incoming request:", Some(&meta));
            Outcome::Continue(context)
        })
    }
}
