use crate::config::ConfigError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, SwitchyardError>;

#[derive(Debug, Error)]
pub enum SwitchyardError {
    #[error("Module not found: {id}")]
    ModuleNotFound { id: String },

    #[error("Duplicate module id: {id}")]
    DuplicateModule { id: String },

    #[error("Malformed {content_type} body: {message}")]
    MalformedBody {
        content_type: String,
        message: String,
    },

    #[error("Request forwarded more than {limit} times")]
    ForwardLimit { limit: usize },

    #[error("Listener for '{event}' failed: {message}")]
    Listener { event: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SwitchyardError {
    /// Create a malformed body error
    pub fn malformed_body(content_type: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedBody {
            content_type: content_type.into(),
            message: message.into(),
        }
    }

    /// Create a listener failure error
    pub fn listener(event: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listener {
            event: event.into(),
            message: message.into(),
        }
    }

    /// HTTP status the host adapter answers with when this error escapes dispatch.
    pub fn status_code(&self) -> axum::http::StatusCode {
        use axum::http::StatusCode;

        match self {
            SwitchyardError::ModuleNotFound { .. } => StatusCode::NOT_FOUND,
            SwitchyardError::MalformedBody { .. } => StatusCode::BAD_REQUEST,
            SwitchyardError::DuplicateModule { .. }
            | SwitchyardError::ForwardLimit { .. }
            | SwitchyardError::Listener { .. }
            | SwitchyardError::Config(_)
            | SwitchyardError::Json(_)
            | SwitchyardError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl axum::response::IntoResponse for SwitchyardError {
    fn into_response(self) -> axum::response::Response {
        let status = self.status_code();
        let message = match &self {
            SwitchyardError::ModuleNotFound { .. } => String::new(),
            _ => self.to_string(),
        };
        (status, message).into_response()
    }
}
