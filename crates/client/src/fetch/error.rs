//! Network collaborator error types.

use std::sync::Arc;

/// Errors from the network collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Network unreachable, DNS failure, connection reset...
    #[error("network error: {0}")]
    Unreachable(String),

    /// The fetch was cancelled because its deadline elapsed.
    #[error("fetch timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// The request could not be expressed on the wire.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The response body could not be read.
    #[error("failed to read response body: {0}")]
    Body(Arc<reqwest::Error>),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            FetchError::Timeout { after_ms: 0 }
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Unreachable(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = FetchError::Timeout { after_ms: 3000 };
        assert!(err.to_string().contains("3000ms"));

        let err = FetchError::Unreachable("connection refused".to_string());
        assert!(err.to_string().contains("connection refused"));
    }
}
