//! Suspicious request detection.
//!
//! The URL, body, route params and query are concatenated and matched against
//! an ordered list of [`DetectionRule`]s. The first matching rule produces a
//! security event; a request with too many distinct headers produces a second,
//! independent event. Detection never blocks the request.

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Serialize;
use serde_json::{Value, json};

use super::{BoxFuture, InboundRequest, Outcome, Stage};
use crate::logger::Logger;
use crate::metrics;
use crate::middleware::RequestContext;

/// How serious a security event is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Built-in rules: (name, pattern, category). All are HIGH severity.
const DEFAULT_RULES: &[(&str, &str, &str)] = &[
    ("directory_traversal", r"\.\.", "path_traversal"),
    ("sql_union_select", r"(?i)union.*select", "sql_injection"),
    ("sql_select_from", r"(?i)select.*from", "sql_injection"),
    ("sql_drop_table", r"(?i)drop.*table", "sql_injection"),
    ("sql_delete_from", r"(?i)delete.*from", "sql_injection"),
    ("sql_insert_into", r"(?i)insert.*into", "sql_injection"),
    ("sql_update_set", r"(?i)update.*set", "sql_injection"),
    ("sql_comment", r";--", "sql_injection"),
    ("javascript_uri", r"(?i)javascript:", "script_injection"),
    ("event_handler", r"(?i)on\w+\s*=", "script_injection"),
];

/// A single content pattern to look for.
#[derive(Debug, Clone)]
pub struct DetectionRule {
    pub name: String,
    pub pattern: Regex,
    pub severity: Severity,
    pub category: String,
}

impl DetectionRule {
    /// Compile a rule.
    ///
    /// # Errors
    ///
    /// Returns the regex error if `pattern` does not compile.
    pub fn new(
        name: impl Into<String>,
        pattern: &str,
        severity: Severity,
        category: impl Into<String>,
    ) -> Result<Self, regex::Error> {
        Ok(Self {
            name: name.into(),
            pattern: Regex::new(pattern)?,
            severity,
            category: category.into(),
        })
    }
}

/// Compile the built-in rule set.
pub fn default_rules() -> Vec<DetectionRule> {
    DEFAULT_RULES
        .iter()
        .filter_map(|(name, pattern, category)| {
            DetectionRule::new(*name, pattern, Severity::High, *category)
                .inspect_err(|e| tracing::error!(rule = *name, error = %e, "Invalid detection rule"))
                .ok()
        })
        .collect()
}

/// A finding produced by [`SecurityMonitor::inspect`].
#[derive(Debug, Clone, PartialEq)]
pub struct SecurityEvent {
    pub message: &'static str,
    pub severity: Severity,
    pub details: Value,
}

/// Scans requests against detection rules and a header-count threshold.
#[derive(Debug, Clone)]
pub struct SecurityMonitor {
    rules: Vec<DetectionRule>,
    max_header_count: usize,
}

impl SecurityMonitor {
    pub fn new(rules: Vec<DetectionRule>, max_header_count: usize) -> Self {
        Self {
            rules,
            max_header_count,
        }
    }

    pub fn with_defaults(max_header_count: usize) -> Self {
        Self::new(default_rules(), max_header_count)
    }

    pub fn rules(&self) -> &[DetectionRule] {
        &self.rules
    }

    /// First rule matching `content`, in rule order.
    pub fn scan_content(&self, content: &str) -> Option<&DetectionRule> {
        self.rules.iter().find(|rule| rule.pattern.is_match(content))
    }

    /// Inspect a request and return every finding.
    pub fn inspect(&self, req: &InboundRequest) -> Vec<SecurityEvent> {
        let mut events = Vec::new();

        if let Some(rule) = self.scan_content(&scan_target(req)) {
            events.push(SecurityEvent {
                message: "Suspicious request detected:",
                severity: rule.severity,
                details: json!({
                    "rule": rule.name,
                    "category": rule.category,
                    "pattern": rule.pattern.as_str(),
                    "severity": rule.severity,
                    "requestBody": req.parsed_body,
                    "requestParams": req.params,
                    "requestQuery": req.query,
                }),
            });
        }

        let header_count = req.header_count();
        if header_count > self.max_header_count {
            events.push(SecurityEvent {
                message: "Excessive headers detected:",
                severity: Severity::Medium,
                details: json!({
                    "severity": Severity::Medium,
                    "headerCount": header_count,
                }),
            });
        }

        events
    }
}

/// `"<url> <body json> <params json> <query json>"`; an absent body is empty.
fn scan_target(req: &InboundRequest) -> String {
    let body = req
        .parsed_body
        .as_ref()
        .map(Value::to_string)
        .unwrap_or_default();
    let params = Value::Object(req.params.clone());
    let query = Value::Object(req.query.clone());

    format!("{} {body} {params} {query}", req.original_url())
}

/// Pipeline stage logging [`SecurityMonitor`] findings.
pub struct SecurityMonitorStage {
    monitor: SecurityMonitor,
    logger: Arc<Logger>,
}

impl SecurityMonitorStage {
    pub fn new(monitor: SecurityMonitor, logger: Arc<Logger>) -> Self {
        Self { monitor, logger }
    }
}

impl Stage for SecurityMonitorStage {
    fn name(&self) -> &'static str {
        "security_monitor"
    }

    fn run<'a>(
        &'a self,
        req: &'a InboundRequest,
        context: RequestContext,
    ) -> BoxFuture<'a, Outcome> {
        Box::pin(async move {
            for event in self.monitor.inspect(req) {
                metrics::record_security_event(event.severity.as_str());
                let details = context.merged_with(event.details);
                self.logger
                    .log_security_event(event.message, Some(&details));
            }
            Outcome::Continue(context)
        })
    }
}
