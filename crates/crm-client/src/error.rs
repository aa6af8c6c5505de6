//! Failure taxonomy for API calls.
//!
//! Transient 429/5xx responses are retried inside the client and never
//! surface unless retries exhaust. Everything that does surface is one of
//! the variants below; per-record callers accumulate them, and only
//! [`ApiFailure::Unauthorized`] is fatal to a run.

use thiserror::Error;

/// A classified API call failure.
#[derive(Debug, Clone, Error)]
#[non_exhaustive]
pub enum ApiFailure {
    /// HTTP 429 persisted through every retry.
    #[error("rate limited after {attempts} attempts")]
    RateLimited {
        /// Total requests issued, initial attempt included.
        attempts: u32,
    },

    /// HTTP 5xx persisted through every retry.
    #[error("server error {status} after retries: {message}")]
    Server { status: u16, message: String },

    /// Non-retryable 4xx; the request itself is invalid.
    #[error("invalid request ({status}): {message}")]
    Invalid { status: u16, message: String },

    /// Authentication or authorization failure. Fatal to a run.
    #[error("unauthorized: credentials rejected by the API")]
    Unauthorized,

    /// Transport-level failure (connect, timeout, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not match the expected shape.
    #[error("decode error: {0}")]
    Decode(String),
}

impl ApiFailure {
    /// True for the only failure class that terminates a migration run.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

impl From<reqwest::Error> for ApiFailure {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl From<serde_json::Error> for ApiFailure {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Result type alias for API operations.
pub type Result<T> = std::result::Result<T, ApiFailure>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_unauthorized_is_fatal() {
        assert!(ApiFailure::Unauthorized.is_fatal());
        assert!(!ApiFailure::RateLimited { attempts: 4 }.is_fatal());
        assert!(
            !ApiFailure::Invalid {
                status: 422,
                message: "bad payload".to_string()
            }
            .is_fatal()
        );
    }
}
