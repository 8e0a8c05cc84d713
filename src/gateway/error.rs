//! Gateway error type and failure normalization

use thiserror::Error;

/// Errors surfaced by the backend gateway. Everything the UI layer sees is
/// already normalized to a human-readable message; no structured backend
/// error codes propagate past this boundary.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// 401 anywhere: the session is assumed unrecoverable
    #[error("Session expired or unauthorized")]
    Unauthorized,

    /// Non-2xx, non-401 response with a normalized message
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error("Request timed out")]
    Timeout,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to decode response: {0}")]
    Decode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Default for backend operations a test double does not script
    #[error("Unsupported operation")]
    Unsupported,
}

impl GatewayError {
    /// Transient failures are swallowed by background polls and retried on
    /// the next tick; everything else is surfaced.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Timeout | GatewayError::Network(_))
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            GatewayError::Api { status, .. } => Some(*status),
            GatewayError::Unauthorized => Some(401),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            GatewayError::Timeout
        } else if e.is_decode() {
            GatewayError::Decode(e.to_string())
        } else {
            GatewayError::Network(e.to_string())
        }
    }
}

/// Normalize a non-2xx response body to a single message: structured JSON
/// `detail`, then nested `error.message`, then the raw body text, then a
/// generic fallback.
pub(crate) fn error_message(status: u16, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value.get("detail").and_then(|v| v.as_str()) {
            return detail.to_string();
        }
        if let Some(message) = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
        {
            return message.to_string();
        }
    }
    let trimmed = body.trim();
    if !trimmed.is_empty() {
        return trimmed.to_string();
    }
    format!("Request failed (status {})", status)
}
