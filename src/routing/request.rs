use super::body::Body;
use super::pattern::{PathMatch, PathParams, normalize_path, split_segments};
use crate::error::Result;
use axum::body::Bytes;
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderName, HeaderValue};
use percent_encoding::percent_decode_str;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use strum_macros::EnumString;
use uuid::Uuid;

pub const TARGET_SERVICE_HEADER: &str = "x-target-service";
pub const TARGET_SERVICE_TAG_HEADER: &str = "x-target-service-tag";
pub const SOURCE_SERVICE_HEADER: &str = "x-source-service";

/// Request method. Unknown methods are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, EnumString)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Head,
    #[strum(default)]
    Other(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Head => "HEAD",
            Method::Other(other) => other,
        }
    }

    /// Parses a method name; unknown names are kept as [`Method::Other`].
    pub fn from_verbatim(method: &str) -> Self {
        method
            .parse()
            .unwrap_or_else(|_| Method::Other(method.to_string()))
    }

    /// Methods whose body is decoded.
    pub fn carries_body(&self) -> bool {
        matches!(self, Method::Post | Method::Put | Method::Delete)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inbound request as handed over by the host.
#[derive(Debug, Clone, Default)]
pub struct RawRequest {
    pub method: String,
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RawRequest {
    /// Create a raw request without headers or body.
    pub fn new(method: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Adds a header; invalid names or values are ignored.
    pub fn header(mut self, name: &str, value: &str) -> Self {
        insert_header(&mut self.headers, name, value);
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }
}

/// Normalized request.
///
/// Everything but the path bindings is fixed at construction; the router
/// replaces the bindings before every resolver call.
#[derive(Debug, Clone)]
pub struct Request {
    id: Uuid,
    method: Method,
    path: String,
    params: PathParams,
    rest: Vec<String>,
    query: HashMap<String, String>,
    body: Body,
    headers: HeaderMap,
    target_service: Option<String>,
    target_tag: Option<String>,
    source_service: Option<String>,
}

impl Request {
    /// A body-less request for `uri`.
    pub fn new(method: Method, uri: &str) -> Self {
        let (path, query) = parse_target(uri);
        Self {
            id: Uuid::new_v4(),
            method,
            path,
            params: PathParams::new(),
            rest: Vec::new(),
            query,
            body: Body::Empty,
            headers: HeaderMap::new(),
            target_service: None,
            target_tag: None,
            source_service: None,
        }
    }

    /// Normalizes a raw request. Fails only on a malformed body.
    pub fn from_raw(raw: RawRequest) -> Result<Self> {
        let method = Method::from_verbatim(raw.method.as_str());
        let content_type = raw
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);

        let body = match content_type {
            Some(content_type) if method.carries_body() && !raw.body.is_empty() => {
                Body::decode(&content_type, &raw.body)?
            }
            _ => Body::Empty,
        };

        let mut request = Self::new(method, &raw.uri);
        request.body = body;
        request.headers = raw.headers;
        request.refresh_routing_headers();
        Ok(request)
    }

    /// Adds a header, refreshing the routing headers.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        insert_header(&mut self.headers, name, value);
        self.refresh_routing_headers();
        self
    }

    /// Replaces the decoded body.
    pub fn with_body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Same request aimed at another path, e.g. for forwarding.
    pub fn with_path(mut self, path: &str) -> Self {
        self.path = normalize_path(path);
        self.params = PathParams::new();
        self.rest.clear();
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn segments(&self) -> Vec<&str> {
        split_segments(&self.path)
    }

    pub fn params(&self) -> &PathParams {
        &self.params
    }

    /// Value bound to capture `name` by the matched pattern.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name)
    }

    /// Segments matched by a trailing `...`.
    pub fn rest(&self) -> &[String] {
        &self.rest
    }

    pub fn query(&self) -> &HashMap<String, String> {
        &self.query
    }

    /// Query value of `name`; the last duplicate wins.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }

    pub fn body(&self) -> &Body {
        &self.body
    }

    /// Top-level field of a JSON or form body.
    pub fn body_param(&self, name: &str) -> Option<Value> {
        self.body.param(name)
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Header value, if present and valid UTF-8.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Module this request is addressed to (`X-Target-Service`).
    pub fn target_service(&self) -> Option<&str> {
        self.target_service.as_deref()
    }

    pub fn target_tag(&self) -> Option<&str> {
        self.target_tag.as_deref()
    }

    pub fn source_service(&self) -> Option<&str> {
        self.source_service.as_deref()
    }

    pub(crate) fn bind(&mut self, matched: PathMatch) {
        self.params = matched.params;
        self.rest = matched.rest;
    }

    pub(crate) fn clear_bindings(&mut self) {
        self.params = PathParams::new();
        self.rest.clear();
    }

    fn refresh_routing_headers(&mut self) {
        let read = |name: &str| {
            self.headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(str::trim)
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };
        self.target_service = read(TARGET_SERVICE_HEADER);
        self.target_tag = read(TARGET_SERVICE_TAG_HEADER);
        self.source_service = read(SOURCE_SERVICE_HEADER);
    }
}

/// Two requests are equal when they would route identically; the id is
/// ignored.
impl PartialEq for Request {
    fn eq(&self, other: &Self) -> bool {
        self.method == other.method
            && self.path == other.path
            && self.params == other.params
            && self.rest == other.rest
            && self.query == other.query
            && self.body == other.body
            && self.headers == other.headers
    }
}

fn insert_header(headers: &mut HeaderMap, name: &str, value: &str) {
    match (
        HeaderName::try_from(name),
        HeaderValue::try_from(value),
    ) {
        (Ok(name), Ok(value)) => {
            headers.insert(name, value);
        }
        _ => tracing::debug!(name, "Ignoring invalid header"),
    }
}

/// Decodes the URI and splits it into a normalized path and query map.
fn parse_target(uri: &str) -> (String, HashMap<String, String>) {
    let decoded = percent_decode_str(uri).decode_utf8_lossy();
    let without_fragment = decoded.split('#').next().unwrap_or_default();
    let (path, query) = without_fragment
        .split_once('?')
        .unwrap_or((without_fragment, ""));

    (normalize_path(path), parse_query(query))
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            let key = key.trim();
            (!key.is_empty()).then(|| (key.to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SwitchyardError;
    use serde_json::json;

    #[test]
    fn parses_methods() {
        assert_eq!(Method::from_verbatim("GET"), Method::Get);
        assert_eq!(Method::from_verbatim("DELETE"), Method::Delete);
        assert_eq!(Method::from_verbatim("PATCH"), Method::Other("PATCH".into()));
        assert_eq!(Method::from_verbatim("PATCH").to_string(), "PATCH");
    }

    #[test]
    fn normalizes_path_and_query() {
        let request = Request::new(Method::Get, "//shop//items/?page=2&sort= name &flag&=x&page=3#top");

        assert_eq!(request.path(), "/shop/items");
        assert_eq!(request.segments(), vec!["shop", "items"]);
        assert_eq!(request.query_param("page"), Some("3"));
        assert_eq!(request.query_param("sort"), Some("name"));
        assert_eq!(request.query_param("flag"), Some(""));
        assert_eq!(request.query().len(), 3);
    }

    #[test]
    fn empty_path_is_root() {
        assert_eq!(Request::new(Method::Get, "").path(), "/");
        assert_eq!(Request::new(Method::Get, "?a=1").path(), "/");
    }

    #[test]
    fn percent_decodes_the_uri() {
        let request = Request::new(Method::Get, "/caf%C3%A9/a%20b?q=x%20y");
        assert_eq!(request.path(), "/café/a b");
        assert_eq!(request.query_param("q"), Some("x y"));
    }

    #[test]
    fn decodes_body_for_body_methods_only() {
        let post = Request::from_raw(
            RawRequest::new("POST", "/items")
                .header("content-type", "application/json")
                .body(r#"{"name":"lamp"}"#),
        )
        .unwrap();
        assert_eq!(post.body_param("name"), Some(json!("lamp")));

        let get = Request::from_raw(
            RawRequest::new("GET", "/items")
                .header("content-type", "application/json")
                .body("{"),
        )
        .unwrap();
        assert!(get.body().is_empty());
    }

    #[test]
    fn body_without_content_type_is_ignored() {
        let request = Request::from_raw(RawRequest::new("PUT", "/items").body("data")).unwrap();
        assert!(request.body().is_empty());
    }

    #[test]
    fn malformed_json_fails_construction() {
        let result = Request::from_raw(
            RawRequest::new("PUT", "/items")
                .header("content-type", "application/json")
                .body("{\"name\":"),
        );
        assert!(matches!(result, Err(SwitchyardError::MalformedBody { .. })));
    }

    #[test]
    fn captures_routing_headers() {
        let request = Request::from_raw(
            RawRequest::new("GET", "/")
                .header("X-Target-Service", "catalog")
                .header("X-Target-Service-Tag", "v2")
                .header("X-Source-Service", "gateway"),
        )
        .unwrap();

        assert_eq!(request.target_service(), Some("catalog"));
        assert_eq!(request.target_tag(), Some("v2"));
        assert_eq!(request.source_service(), Some("gateway"));
        assert_eq!(request.header("x-target-service"), Some("catalog"));
    }

    #[test]
    fn equality_ignores_the_id() {
        let a = Request::new(Method::Get, "/a");
        let b = Request::new(Method::Get, "/a");
        assert_ne!(a.id(), b.id());
        assert_eq!(a, b);
        assert_ne!(a.clone().with_path("/b"), b);
    }
}
