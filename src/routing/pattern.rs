//! Route patterns.
//!
//! A pattern is a `/`-separated template. A segment starting with `$` captures
//! the request segment under the name that follows; a trailing `...` accepts
//! one or more additional segments.
//!
//! ```text
//! /items/$id            matches /items/42          → {id: "42"}
//! /books/psychology/... matches /books/psychology/a → rest ["a"]
//!                       not     /books/psychology
//! ```

use std::fmt;

pub const CAPTURE_PREFIX: char = '$';
pub const VARIADIC_TOKEN: &str = "...";

/// Splits a path into its non-empty segments.
pub fn split_segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Leading slash, no empty segments, no trailing slash (`/` for the root).
pub fn normalize_path(path: &str) -> String {
    format!("/{}", split_segments(path).join("/"))
}

/// Joins a namespace and a route into a normalized full path.
pub fn join_path(namespace: &str, route: &str) -> String {
    normalize_path(&format!("{namespace}/{route}"))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(String),
    Capture(String),
    Variadic,
}

impl Segment {
    fn parse(token: &str) -> Self {
        if token == VARIADIC_TOKEN {
            Segment::Variadic
        } else if let Some(name) = token.strip_prefix(CAPTURE_PREFIX) {
            Segment::Capture(name.to_string())
        } else {
            Segment::Literal(token.to_string())
        }
    }
}

/// Named path bindings collected from capture segments, in pattern order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathParams(Vec<(String, String)>);

impl PathParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value bound to `name`; the last binding wins on repeated names.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PathParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Result of a successful structural match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathMatch {
    pub params: PathParams,
    /// Segments consumed by a trailing `...`.
    pub rest: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    raw: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parse a route pattern such as `/items/$id` or `/books/...`.
    pub fn parse(pattern: &str) -> Self {
        let raw = normalize_path(pattern);
        let segments = split_segments(&raw).into_iter().map(Segment::parse).collect();
        Self { raw, segments }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the pattern belongs in the dynamic table.
    pub fn is_dynamic(&self) -> bool {
        self.raw.contains(CAPTURE_PREFIX) || self.raw.contains(VARIADIC_TOKEN)
    }

    pub fn is_variadic(&self) -> bool {
        matches!(self.segments.last(), Some(Segment::Variadic))
    }

    /// Segments before a trailing `...`.
    fn fixed(&self) -> &[Segment] {
        if self.is_variadic() {
            &self.segments[..self.segments.len() - 1]
        } else {
            &self.segments
        }
    }

    /// Matches already split request segments against this pattern.
    ///
    /// Only the first `segments().len()` request segments are compared, so
    /// a request may be longer than a pattern without `...`; with a trailing
    /// `...` it must be strictly longer than the fixed prefix and the extra
    /// segments become the tail. Literals compare exactly, captures bind, and
    /// a `...` that is not last matches any single segment without binding it.
    pub fn matches(&self, path: &[&str]) -> Option<PathMatch> {
        let fixed = self.fixed();
        let variadic = self.is_variadic();

        if path.len() < fixed.len() || (variadic && path.len() == fixed.len()) {
            return None;
        }

        let mut params = Vec::new();
        for (segment, value) in fixed.iter().zip(path) {
            match segment {
                Segment::Literal(literal) if literal != value => return None,
                Segment::Literal(_) | Segment::Variadic => {}
                Segment::Capture(name) => params.push((name.clone(), (*value).to_string())),
            }
        }

        let rest = if variadic {
            path[fixed.len()..].iter().map(|s| (*s).to_string()).collect()
        } else {
            Vec::new()
        };
        Some(PathMatch {
            params: PathParams(params),
            rest,
        })
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(pattern: &str, path: &str) -> Option<PathMatch> {
        Pattern::parse(pattern).matches(&split_segments(path))
    }

    #[test]
    fn normalizes_paths() {
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("modules//a/"), "/modules/a");
        assert_eq!(join_path("/", "/items"), "/items");
        assert_eq!(join_path("/modules", ""), "/modules");
        assert_eq!(join_path("/modules", "/$moduleName"), "/modules/$moduleName");
    }

    #[test]
    fn classifies_patterns() {
        assert!(!Pattern::parse("/modules").is_dynamic());
        assert!(Pattern::parse("/items/$id").is_dynamic());
        assert!(Pattern::parse("/books/...").is_dynamic());
        assert!(Pattern::parse("/books/...").is_variadic());
        assert_eq!(
            Pattern::parse("/a/$b/...").segments(),
            &[
                Segment::Literal("a".into()),
                Segment::Capture("b".into()),
                Segment::Variadic
            ]
        );
    }

    #[test]
    fn captures_only_named_segments() {
        let m = matches("/api/customers/$id", "/api/customers/5").unwrap();
        assert_eq!(m.params.get("id"), Some("5"));
        assert_eq!(m.params.len(), 1);
        assert!(m.params.get("api").is_none());
        assert!(m.rest.is_empty());
    }

    #[test]
    fn literal_mismatch_rejects() {
        assert!(matches("/items/$id", "/orders/42").is_none());
    }

    #[test]
    fn shorter_request_is_rejected() {
        assert!(matches("/items/$id", "/items").is_none());
        assert!(matches("/items/$id/reviews", "/items/42").is_none());
    }

    #[test]
    fn extra_request_segments_are_ignored() {
        let m = matches("/items/$id", "/items/42/extra").unwrap();
        assert_eq!(m.params.get("id"), Some("42"));
        assert_eq!(m.params.len(), 1);
        assert!(m.rest.is_empty());

        assert!(matches("/items/$id", "/orders/42/extra").is_none());
    }

    #[test]
    fn variadic_needs_an_extra_segment() {
        assert!(matches("/books/psychology/...", "/books").is_none());
        assert!(matches("/books/psychology/...", "/books/psychology").is_none());

        let m = matches("/books/psychology/...", "/books/psychology/freud/dreams").unwrap();
        assert!(m.params.is_empty());
        assert_eq!(m.rest, vec!["freud", "dreams"]);
    }

    #[test]
    fn variadic_with_capture() {
        let m = matches("/files/$bucket/...", "/files/media/a/b.png").unwrap();
        assert_eq!(m.params.get("bucket"), Some("media"));
        assert_eq!(m.rest, vec!["a", "b.png"]);
    }
}
