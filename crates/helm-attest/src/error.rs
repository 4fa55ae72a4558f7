//! Check-in error types.

/// Errors from a single check-in attempt.
#[derive(Debug, thiserror::Error)]
pub enum CheckInError {
    /// HTTP transport error.
    #[error("HTTP error calling {endpoint}: {source}")]
    Http {
        endpoint: String,
        source: reqwest::Error,
    },
    /// The attestation server returned a non-2xx status.
    #[error("attestation server {endpoint} returned {status}: {body}")]
    Rejected {
        endpoint: String,
        status: u16,
        body: String,
    },
    /// No response within the configured bound.
    #[error("check-in to {endpoint} timed out after {timeout_secs}s")]
    Timeout { endpoint: String, timeout_secs: u64 },
    /// The license id cannot be carried in an HTTP header.
    #[error("license id is not a valid bearer credential")]
    InvalidCredential,
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    ClientInit(#[source] reqwest::Error),
}

impl CheckInError {
    /// HTTP status for `Rejected`, `None` otherwise.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
