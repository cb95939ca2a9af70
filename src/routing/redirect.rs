use crate::network::{HeaderProvider, Headers};
use axum::http::StatusCode;

pub const ACCEL_REDIRECT_HEADER: &str = "X-Accel-Redirect";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    /// Served by the fronting proxy from another location (`X-Accel-Redirect`).
    Internal,
    Permanent,
    Temporary,
    /// Lets the proxy try the next upstream.
    NextUpstream,
}

impl RedirectKind {
    /// Status code sent for this kind of redirect.
    pub fn status(self) -> StatusCode {
        match self {
            RedirectKind::Internal => StatusCode::OK,
            RedirectKind::Permanent => StatusCode::MOVED_PERMANENTLY,
            RedirectKind::Temporary => StatusCode::FOUND,
            RedirectKind::NextUpstream => StatusCode::BAD_GATEWAY,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    kind: RedirectKind,
    location: String,
}

impl Redirect {
    pub fn new(kind: RedirectKind, location: impl Into<String>) -> Self {
        Self {
            kind,
            location: location.into(),
        }
    }

    /// Internal redirect served by the proxy (`X-Accel-Redirect`).
    pub fn internal(location: impl Into<String>) -> Self {
        Self::new(RedirectKind::Internal, location)
    }

    /// 301 with `Location`.
    pub fn permanent(location: impl Into<String>) -> Self {
        Self::new(RedirectKind::Permanent, location)
    }

    /// 302 with `Location`.
    pub fn temporary(location: impl Into<String>) -> Self {
        Self::new(RedirectKind::Temporary, location)
    }

    /// Hands the request to the next upstream (502).
    pub fn next_upstream() -> Self {
        Self::new(RedirectKind::NextUpstream, "")
    }

    pub fn kind(&self) -> RedirectKind {
        self.kind
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn status(&self) -> StatusCode {
        self.kind.status()
    }
}

impl HeaderProvider for Redirect {
    fn headers(&self) -> Headers {
        let name = match self.kind {
            RedirectKind::Internal => ACCEL_REDIRECT_HEADER,
            RedirectKind::Permanent | RedirectKind::Temporary => "Location",
            RedirectKind::NextUpstream => return Headers::new(),
        };
        Headers::from([(name.to_string(), self.location.clone())])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_map_to_status_and_header() {
        let internal = Redirect::internal("/protected/file.pdf");
        assert_eq!(internal.status(), StatusCode::OK);
        assert_eq!(internal.headers()[ACCEL_REDIRECT_HEADER], "/protected/file.pdf");

        let moved = Redirect::permanent("https://example.com/new");
        assert_eq!(moved.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(moved.headers()["Location"], "https://example.com/new");

        assert_eq!(Redirect::temporary("/login").status(), StatusCode::FOUND);

        let upstream = Redirect::next_upstream();
        assert_eq!(upstream.status(), StatusCode::BAD_GATEWAY);
        assert!(upstream.headers().is_empty());
    }
}
