use super::{HeaderProvider, Headers};
use crate::routing::Request;
use chrono::{DateTime, Utc};
use strum_macros::Display;

/// Directives accepted in `Cache-Control`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum CacheRule {
    Public,
    Private,
    Immutable,
    NoTransform,
    OnlyIfCached,
    NoCache,
    NoStore,
    MustRevalidate,
}

/// `Cache-Control` / `Last-Modified` provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cache {
    lifetime: u64,
    rules: Vec<CacheRule>,
}

impl Default for Cache {
    fn default() -> Self {
        Self {
            lifetime: 60,
            rules: vec![CacheRule::Public],
        }
    }
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// `max-age` in seconds.
    pub fn lifetime(mut self, seconds: u64) -> Self {
        self.lifetime = seconds;
        self
    }

    pub fn rules(mut self, rules: impl IntoIterator<Item = CacheRule>) -> Self {
        self.rules = rules.into_iter().collect();
        self
    }

    /// Instructs clients and proxies to never reuse the resource.
    pub fn disable_cache(mut self) -> Self {
        self.lifetime = 0;
        self.rules = vec![
            CacheRule::NoCache,
            CacheRule::NoStore,
            CacheRule::MustRevalidate,
        ];
        self
    }

    /// Whether the client's `If-Modified-Since` copy is older than `lifetime` seconds.
    ///
    /// A missing or unparseable header is never stale.
    pub fn is_resource_stale(request: &Request, lifetime: u64) -> bool {
        Self::is_resource_stale_at(request, lifetime, Utc::now())
    }

    pub fn is_resource_stale_at(request: &Request, lifetime: u64, now: DateTime<Utc>) -> bool {
        let Some(modified) = request
            .header("if-modified-since")
            .and_then(|value| DateTime::parse_from_rfc2822(value).ok())
        else {
            return false;
        };
        let threshold = i64::try_from(lifetime)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| now.checked_sub_signed(lifetime));
        threshold.is_some_and(|threshold| modified.with_timezone(&Utc) < threshold)
    }

    fn headers_at(&self, now: DateTime<Utc>) -> Headers {
        let rules = self
            .rules
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");

        Headers::from([
            (
                "Last-Modified".to_string(),
                now.format("%a, %d %b %Y %H:%M:%S GMT").to_string(),
            ),
            (
                "Cache-Control".to_string(),
                format!("{rules}, max-age={}", self.lifetime),
            ),
        ])
    }
}

impl HeaderProvider for Cache {
    fn headers(&self) -> Headers {
        self.headers_at(Utc::now())
    }
}
