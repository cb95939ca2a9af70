use crate::error::{Result, SwitchyardError};
use serde_json::Value;
use std::collections::HashMap;

pub const JSON_MEDIA_TYPE: &str = "application/json";
pub const FORM_MEDIA_TYPE: &str = "application/x-www-form-urlencoded";
pub const MULTIPART_MEDIA_TYPE: &str = "multipart/form-data";

/// Parsed request body.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum Body {
    #[default]
    Empty,
    Json(Value),
    Form(HashMap<String, String>),
    /// Any other content type, decoded lossily as UTF-8.
    Raw(String),
}

impl Body {
    /// Decodes `bytes` according to the `Content-Type` header value.
    pub fn decode(content_type: &str, bytes: &[u8]) -> Result<Self> {
        let (essence, params) = split_media_type(content_type);

        match essence.as_str() {
            JSON_MEDIA_TYPE => serde_json::from_slice(bytes)
                .map(Body::Json)
                .map_err(|e| SwitchyardError::malformed_body(JSON_MEDIA_TYPE, e.to_string())),
            FORM_MEDIA_TYPE => Ok(Body::Form(
                url::form_urlencoded::parse(bytes).into_owned().collect(),
            )),
            MULTIPART_MEDIA_TYPE => {
                let boundary = params
                    .iter()
                    .find(|(name, _)| name == "boundary")
                    .map(|(_, value)| value.as_str())
                    .filter(|boundary| !boundary.is_empty())
                    .ok_or_else(|| {
                        SwitchyardError::malformed_body(MULTIPART_MEDIA_TYPE, "missing boundary")
                    })?;
                Ok(Body::Form(multipart_fields(
                    &String::from_utf8_lossy(bytes),
                    boundary,
                )))
            }
            _ => Ok(Body::Raw(String::from_utf8_lossy(bytes).into_owned())),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Body::Empty)
    }

    /// Top-level field of a JSON object or form body.
    pub fn param(&self, name: &str) -> Option<Value> {
        match self {
            Body::Json(Value::Object(map)) => map.get(name).cloned(),
            Body::Form(fields) => fields.get(name).cloned().map(Value::String),
            _ => None,
        }
    }
}

/// `type/subtype; k=v` → lowercased essence and its parameters.
fn split_media_type(content_type: &str) -> (String, Vec<(String, String)>) {
    let mut parts = content_type.split(';');
    let essence = parts.next().unwrap_or_default().trim().to_ascii_lowercase();
    let params = parts
        .filter_map(|param| {
            let (name, value) = param.split_once('=')?;
            Some((
                name.trim().to_ascii_lowercase(),
                value.trim().trim_matches('"').to_string(),
            ))
        })
        .collect();
    (essence, params)
}

/// Text fields of a `multipart/form-data` body. File parts are skipped.
///
/// A delimiter is only recognized at the start of a line (RFC 2046), so a
/// value may contain the boundary string mid-line.
fn multipart_fields(body: &str, boundary: &str) -> HashMap<String, String> {
    let delimiter = format!("\r\n--{boundary}");
    let body = format!("\r\n{body}");
    let mut fields = HashMap::new();

    for part in body.split(delimiter.as_str()).skip(1) {
        if part.starts_with("--") {
            break;
        }
        let Some((padding, part)) = part.split_once("\r\n") else {
            continue;
        };
        if !padding.trim().is_empty() {
            continue;
        }
        let Some((head, value)) = part.split_once("\r\n\r\n") else {
            continue;
        };

        let Some(disposition) = head
            .lines()
            .find(|line| line.to_ascii_lowercase().starts_with("content-disposition:"))
        else {
            continue;
        };
        if disposition_param(disposition, "filename").is_some() {
            continue;
        }
        if let Some(name) = disposition_param(disposition, "name") {
            fields.insert(name, value.to_string());
        }
    }
    fields
}

fn disposition_param(disposition: &str, key: &str) -> Option<String> {
    disposition.split(';').skip(1).find_map(|param| {
        let (name, value) = param.split_once('=')?;
        (name.trim().eq_ignore_ascii_case(key)).then(|| value.trim().trim_matches('"').to_string())
    })
}
