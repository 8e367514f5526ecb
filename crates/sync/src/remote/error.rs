//! Remote backend errors.

use thiserror::Error;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Clone, Error)]
pub enum RemoteError {
    /// Transport failed (DNS, connection reset, TLS).
    #[error("network error: {0}")]
    Network(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// The backend rejected a delta, e.g. a stale product reference.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Missing or expired credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// The account's email has not been verified yet.
    #[error("email verification required")]
    VerificationRequired,

    /// Any other non-success status.
    #[error("unexpected response ({status}): {body}")]
    Response { status: u16, body: String },

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Endpoint URL could not be built.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}
