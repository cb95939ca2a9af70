//! axum host adapter.
//!
//! Every inbound request lands in a single fallback handler, is turned into a
//! [`RawRequest`] and dispatched on the blocking pool.

use crate::error::SwitchyardError;
use crate::lifecycle::Bootstrap;
use crate::routing::{Dispatch, RawRequest};
use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

/// Largest request body read into memory.
pub const BODY_LIMIT: usize = 2 * 1024 * 1024;

impl IntoResponse for Dispatch {
    fn into_response(self) -> Response {
        let mut response = Body::from(self.body.unwrap_or_default()).into_response();
        *response.status_mut() = self.status;

        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value)) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().insert(name, value);
                }
                _ => tracing::warn!(header = %name, "Dropping invalid response header"),
            }
        }
        response
    }
}

/// Router serving every path through `bootstrap`.
pub fn app(bootstrap: Bootstrap) -> Router {
    Router::new()
        .fallback(dispatch)
        .with_state(Arc::new(bootstrap))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

async fn dispatch(State(bootstrap): State<Arc<Bootstrap>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, BODY_LIMIT).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!("Failed to read request body: {}", e);
            return (StatusCode::PAYLOAD_TOO_LARGE, e.to_string()).into_response();
        }
    };

    let raw = RawRequest {
        method: parts.method.to_string(),
        uri: parts.uri.to_string(),
        headers: parts.headers,
        body,
    };

    match tokio::task::spawn_blocking(move || bootstrap.dispatch(raw)).await {
        Ok(Ok(dispatch)) => dispatch.into_response(),
        Ok(Err(e)) => {
            tracing::warn!("Dispatch failed: {}", e);
            e.into_response()
        }
        Err(e) => {
            tracing::error!("Dispatch task panicked: {}", e);
            SwitchyardError::Internal(e.to_string()).into_response()
        }
    }
}
