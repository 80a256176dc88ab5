pub mod cloudflare;

use axum::{
    body::Bytes,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";
const UPSTREAM_ERROR_MESSAGE: &str = "Upstream request failed";

/// Failure envelope returned by every relay route: `{ success: false, error: {...} }`.
#[derive(Debug, Serialize)]
pub struct ErrorEnvelope {
    pub success: bool,
    pub error: Value,
}

impl ErrorEnvelope {
    pub fn new(error: Value) -> Self {
        Self {
            success: false,
            error,
        }
    }

    pub fn message(message: &str) -> Self {
        Self::new(json!({ "message": message }))
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("upstream responded with status {status}")]
    Upstream { status: StatusCode, body: Bytes },

    #[error("upstream request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),
}

impl RelayError {
    pub fn status(&self) -> StatusCode {
        match self {
            RelayError::Upstream { status, .. } => *status,
            RelayError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RelayError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        match self {
            RelayError::Upstream { body, .. } => ErrorEnvelope::new(upstream_details(body)),
            RelayError::Transport(_) => ErrorEnvelope::message(INTERNAL_ERROR_MESSAGE),
            RelayError::InvalidIdentifier(_) => ErrorEnvelope::message("Invalid identifier"),
        }
    }
}

impl IntoResponse for RelayError {
    fn into_response(self) -> Response {
        (self.status(), Json(self.envelope())).into_response()
    }
}

/// Keeps the upstream error body intact and makes sure it carries a `message`.
fn upstream_details(body: &[u8]) -> Value {
    let mut details = match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => map,
        _ => Map::new(),
    };

    let has_message = details
        .get("message")
        .and_then(Value::as_str)
        .is_some();

    if !has_message {
        let message = details
            .get("errors")
            .and_then(Value::as_array)
            .and_then(|errors| errors.first())
            .and_then(|e| e.get("message"))
            .and_then(Value::as_str)
            .unwrap_or(UPSTREAM_ERROR_MESSAGE)
            .to_string();
        details.insert("message".to_string(), Value::String(message));
    }

    Value::Object(details)
}

/// Upstream identifiers are opaque hex strings; anything else could rewrite the upstream path.
pub fn check_identifier(id: &str) -> Result<&str, RelayError> {
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

    if valid {
        Ok(id)
    } else {
        Err(RelayError::InvalidIdentifier(id.to_string()))
    }
}
