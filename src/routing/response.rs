use super::redirect::Redirect;
use crate::config::Configuration;
use crate::error::Result;
use crate::network::{HeaderProvider, Headers, merge_headers};
use axum::http::StatusCode;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Configuration key holding extra `token -> media type` entries.
pub const MIME_TYPES_KEY: &str = "accepted_mime_types";

/// Response produced by a resolver.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    body: Option<String>,
    content_type: Option<String>,
    providers: Vec<Arc<dyn HeaderProvider>>,
}

impl Response {
    /// Create an empty response with `status`.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            body: None,
            content_type: None,
            providers: Vec::new(),
        }
    }

    /// Plain text response.
    pub fn text(status: StatusCode, body: impl Into<String>) -> Self {
        Self::new(status).with_body(body).with_type("text")
    }

    /// Serializes `value` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(status: StatusCode, value: &T) -> Result<Self> {
        Ok(Self::new(status)
            .with_body(serde_json::to_string(value)?)
            .with_type("json"))
    }

    pub fn not_found() -> Self {
        Self::new(StatusCode::NOT_FOUND)
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Content type as a mime table token (`json`, `html`, ...) or a full
    /// media type.
    pub fn with_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Adds a provider whose headers are merged into the dispatch.
    pub fn with_header_provider(mut self, provider: impl HeaderProvider + 'static) -> Self {
        self.providers.push(Arc::new(provider));
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Decodes the body as JSON.
    pub fn json_body<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(self.body.as_deref().unwrap_or_default())?)
    }
}

impl HeaderProvider for Response {
    fn headers(&self) -> Headers {
        merge_headers(self.providers.iter().map(|p| p.as_ref() as &dyn HeaderProvider))
    }
}

/// Final status, headers and body handed back to the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub status: StatusCode,
    pub headers: Headers,
    pub body: Option<String>,
}

impl Dispatch {
    /// Finalizes a resolver response: merges its headers, resolves the
    /// content type and turns an empty 200 into 204.
    pub fn from_response(response: Response, config: &Configuration) -> Result<Self> {
        let mut headers = response.headers();
        if let Some(token) = response.content_type() {
            match resolve_mime_type(token, config)? {
                Some(mime) => {
                    headers.insert("Content-Type".to_string(), mime);
                }
                None => tracing::debug!(token, "Unknown content type token"),
            }
        }

        let body = response.body.filter(|body| !body.is_empty());
        let status = if response.status == StatusCode::OK && body.is_none() {
            StatusCode::NO_CONTENT
        } else {
            response.status
        };

        Ok(Self {
            status,
            headers,
            body,
        })
    }

    /// Status and headers of `redirect`, without a body.
    pub fn from_redirect(redirect: &Redirect) -> Self {
        Self {
            status: redirect.status(),
            headers: redirect.headers(),
            body: None,
        }
    }

    pub fn not_found() -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            headers: Headers::new(),
            body: None,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }
}

fn default_mime_types() -> BTreeMap<String, String> {
    [
        ("json", "application/json"),
        ("html", "text/html"),
        ("text", "text/plain"),
        ("xml", "application/xml"),
        ("form", "application/x-www-form-urlencoded"),
    ]
    .into_iter()
    .map(|(token, mime)| (token.to_string(), mime.to_string()))
    .collect()
}

/// Maps a content type token to its media type. Configured entries override
/// the defaults; values containing `/` are already media types.
pub fn resolve_mime_type(token: &str, config: &Configuration) -> Result<Option<String>> {
    if token.contains('/') {
        return Ok(Some(token.to_string()));
    }

    let mut table = default_mime_types();
    if let Some(configured) = config.get_as::<BTreeMap<String, String>>(MIME_TYPES_KEY)? {
        table.extend(configured);
    }
    Ok(table.remove(token))
}
