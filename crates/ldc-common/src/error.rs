//! Error types for LDC
//!
//! The taxonomy follows how failures propagate through the pipeline:
//! validation problems are raised before any network call, auth failures
//! are fatal to the enclosing operation, and transport/destination failures
//! are captured into batch or job outcomes by the callers.

use thiserror::Error;

/// Result type alias for LDC operations
pub type Result<T> = std::result::Result<T, SyncError>;

/// Maximum number of response-body bytes kept for diagnostics.
pub const MAX_ERROR_BODY_LEN: usize = 500;

/// Main error type for LDC
#[derive(Error, Debug)]
pub enum SyncError {
    /// Bad shape or cardinality of caller input. Never retried.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity or token exchange failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Network, timeout or decoding failure of an HTTP call.
    #[error("Network error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer from a remote endpoint.
    #[error("HTTP {status}: {body}")]
    Destination { status: u16, body: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl SyncError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an authentication error
    pub fn auth(msg: impl Into<String>) -> Self {
        Self::Auth(msg.into())
    }

    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a destination error, truncating the body to [`MAX_ERROR_BODY_LEN`] bytes
    pub fn destination(status: u16, body: impl Into<String>) -> Self {
        Self::Destination {
            status,
            body: truncate_body(body.into()),
        }
    }

    /// True for errors that must be raised to the caller instead of reported.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// HTTP status of a destination error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Destination { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

fn truncate_body(mut body: String) -> String {
    if body.len() > MAX_ERROR_BODY_LEN {
        let mut cut = MAX_ERROR_BODY_LEN;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    body
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_error_display() {
        let err = SyncError::destination(500, "boom");
        assert_eq!(err.to_string(), "HTTP 500: boom");
        assert_eq!(err.status(), Some(500));
    }

    #[test]
    fn test_destination_body_truncated_on_char_boundary() {
        let body = "é".repeat(400);
        let err = SyncError::destination(502, body);
        match err {
            SyncError::Destination { body, .. } => {
                assert!(body.len() <= MAX_ERROR_BODY_LEN);
                assert!(body.chars().all(|c| c == 'é'));
            },
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_is_validation() {
        assert!(SyncError::validation("empty").is_validation());
        assert!(!SyncError::auth("denied").is_validation());
        assert!(SyncError::config("x").status().is_none());
    }
}
