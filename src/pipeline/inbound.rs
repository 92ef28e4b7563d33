//! Buffered snapshot of an inbound request.

use axum::body::{Body, Bytes};
use axum::extract::Query;
use axum::http::header::{CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::request::Parts;
use axum::http::{HeaderMap, Method, Uri};
use serde_json::{Map, Value};

use crate::config::Config;
use crate::error::{AppError, AppResult};

/// Request metadata plus the fully buffered body.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Parsed JSON or form body; other content types keep the body as a string.
    pub parsed_body: Option<Value>,
    /// Route parameters; always empty ahead of routing.
    pub params: Map<String, Value>,
    pub query: Map<String, Value>,
}

impl InboundRequest {
    /// Buffer `body` under the limit for its content type and parse it.
    ///
    /// # Errors
    ///
    /// - `PayloadTooLarge` when the body exceeds the limit
    /// - `BadRequest` when a JSON body does not parse
    pub async fn buffer(parts: &Parts, body: Body, config: &Config) -> AppResult<Self> {
        let content_type = header_str(&parts.headers, CONTENT_TYPE.as_str()).unwrap_or_default();
        let limit = if is_json(content_type) {
            config.json_limit
        } else if is_form(content_type) {
            config.urlencoded_limit
        } else {
            config.max_body_size()
        };

        let declared = header_str(&parts.headers, CONTENT_LENGTH.as_str())
            .and_then(|v| v.trim().parse::<usize>().ok());
        if declared.is_some_and(|len| len > limit) {
            return Err(AppError::PayloadTooLarge { limit });
        }

        let body = axum::body::to_bytes(body, limit)
            .await
            .map_err(|_| AppError::PayloadTooLarge { limit })?;

        let parsed_body = if body.is_empty() {
            None
        } else if is_json(content_type) {
            let value: Value = serde_json::from_slice(&body)
                .map_err(|_| AppError::BadRequest("Malformed JSON in request body".to_string()))?;
            Some(value)
        } else {
            let raw = String::from_utf8_lossy(&body).into_owned();
            let form = if is_form(content_type) {
                parse_form(&raw)
            } else {
                None
            };
            Some(form.map_or(Value::String(raw), Value::Object))
        };

        Ok(Self {
            method: parts.method.clone(),
            uri: parts.uri.clone(),
            headers: parts.headers.clone(),
            body,
            parsed_body,
            params: Map::new(),
            query: parse_query(&parts.uri),
        })
    }

    /// A bodiless GET for `uri`.
    pub fn empty(uri: &str) -> Self {
        let uri: Uri = uri.parse().unwrap_or_else(|_| Uri::from_static("/"));
        Self {
            method: Method::GET,
            query: parse_query(&uri),
            uri,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            parsed_body: None,
            params: Map::new(),
        }
    }

    pub fn path(&self) -> &str {
        self.uri.path()
    }

    /// Path and query as received.
    pub fn original_url(&self) -> &str {
        self.uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or_else(|| self.uri.path())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        header_str(&self.headers, name)
    }

    /// Number of distinct header names.
    pub fn header_count(&self) -> usize {
        self.headers.keys_len()
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn is_json(content_type: &str) -> bool {
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || mime.ends_with("+json")
}

fn is_form(content_type: &str) -> bool {
    content_type
        .to_ascii_lowercase()
        .starts_with("application/x-www-form-urlencoded")
}

/// Decode the query string into a JSON object; repeated keys keep the last value.
fn parse_query(uri: &Uri) -> Map<String, Value> {
    Query::<Vec<(String, String)>>::try_from_uri(uri)
        .map(|Query(pairs)| {
            pairs
                .into_iter()
                .map(|(k, v)| (k, Value::String(v)))
                .collect()
        })
        .unwrap_or_default()
}

/// Decode an urlencoded form into a JSON object; repeated keys keep the last value.
///
/// `None` when a pair does not percent-decode to UTF-8.
fn parse_form(raw: &str) -> Option<Map<String, Value>> {
    let decode = |part: &str| {
        urlencoding::decode(&part.replace('+', " "))
            .ok()
            .map(|decoded| decoded.into_owned())
    };

    raw.split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            Some((decode(key)?, Value::String(decode(value)?)))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use axum::http::Request;
    use serde_json::json;

    fn split(req: Request<Body>) -> (Parts, Body) {
        req.into_parts()
    }

    #[tokio::test]
    async fn test_buffers_json_body() {
        let (parts, body) = split(
            Request::builder()
                .method("POST")
                .uri("/api/users?page=2")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"name":"alice"}"#))
                .unwrap(),
        );

        let inbound = InboundRequest::buffer(&parts, body, &Config::default())
            .await
            .unwrap();

        assert_eq!(inbound.parsed_body, Some(json!({"name": "alice"})));
        assert_eq!(inbound.query.get("page"), Some(&json!("2")));
        assert_eq!(inbound.original_url(), "/api/users?page=2");
        assert!(inbound.params.is_empty());
    }

    #[tokio::test]
    async fn test_form_body_decoded_to_object() {
        let (parts, body) = split(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("user=x%27%3B--&note=hello+world&flag"))
                .unwrap(),
        );

        let inbound = InboundRequest::buffer(&parts, body, &Config::default())
            .await
            .unwrap();

        assert_eq!(
            inbound.parsed_body,
            Some(json!({"user": "x';--", "note": "hello world", "flag": ""}))
        );
    }

    #[tokio::test]
    async fn test_undecodable_form_kept_as_string() {
        let (parts, body) = split(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/x-www-form-urlencoded")
                .body(Body::from("a=%FF%FE"))
                .unwrap(),
        );

        let inbound = InboundRequest::buffer(&parts, body, &Config::default())
            .await
            .unwrap();

        assert_eq!(inbound.parsed_body, Some(json!("a=%FF%FE")));
    }

    #[tokio::test]
    async fn test_plain_text_body_kept_as_string() {
        let (parts, body) = split(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "text/plain")
                .body(Body::from("a=1&b=2"))
                .unwrap(),
        );

        let inbound = InboundRequest::buffer(&parts, body, &Config::default())
            .await
            .unwrap();

        assert_eq!(inbound.parsed_body, Some(json!("a=1&b=2")));
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let (parts, body) = split(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json; charset=utf-8")
                .body(Body::from("{not json"))
                .unwrap(),
        );

        let err = InboundRequest::buffer(&parts, body, &Config::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_oversized_body_rejected() {
        let config = Config {
            json_limit: 8,
            ..Config::default()
        };
        let (parts, body) = split(
            Request::builder()
                .method("POST")
                .uri("/")
                .header("content-type", "application/json")
                .body(Body::from(r#"{"padding":"xxxxxxxx"}"#))
                .unwrap(),
        );

        let err = InboundRequest::buffer(&parts, body, &config).await.unwrap_err();

        assert!(matches!(err, AppError::PayloadTooLarge { limit: 8 }));
    }

    #[tokio::test]
    async fn test_empty_body_has_no_parsed_value() {
        let (parts, body) = split(Request::builder().uri("/health").body(Body::empty()).unwrap());

        let inbound = InboundRequest::buffer(&parts, body, &Config::default())
            .await
            .unwrap();

        assert!(inbound.parsed_body.is_none());
        assert!(inbound.query.is_empty());
    }

    #[test]
    fn test_header_count_counts_distinct_names() {
        let mut inbound = InboundRequest::empty("/");
        inbound.headers.append("x-a", "1".parse().unwrap());
        inbound.headers.append("x-a", "2".parse().unwrap());
        inbound.headers.append("x-b", "3".parse().unwrap());

        assert_eq!(inbound.header_count(), 2);
    }

    #[test]
    fn test_content_type_detection() {
        assert!(is_json("application/json"));
        assert!(is_json("application/vnd.api+json; charset=utf-8"));
        assert!(!is_json("text/plain"));
        assert!(is_form("application/x-www-form-urlencoded; charset=UTF-8"));
    }
}
