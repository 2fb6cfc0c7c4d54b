//! Error types for the embedding gateway.

use thiserror::Error;

/// Result type alias for embedding operations.
pub type Result<T> = std::result::Result<T, EmbeddingError>;

/// Errors that can occur while talking to an embedding provider.
#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// Provider not configured (missing API key, empty model name).
    #[error("embedding provider not configured: {0}")]
    ProviderNotConfigured(String),

    /// Provider answered with a non-success status.
    #[error("embedding request failed with status {status}: {body}")]
    ApiRequest { status: u16, body: String },

    /// Provider answered with a body we do not understand.
    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),

    /// Rate limit exceeded and retries exhausted.
    #[error("rate limit exceeded, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Provider returned a different number of vectors than texts submitted.
    #[error("embedding count mismatch: submitted {expected} texts, received {actual} vectors")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Transport-level HTTP error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl EmbeddingError {
    /// Whether a retry could plausibly succeed.
    ///
    /// Only transport failures, throttling and server-side errors qualify;
    /// malformed responses and count mismatches are never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ApiRequest { status, .. } => *status == 429 || *status >= 500,
            Self::RateLimited { .. } => true,
            Self::Http(err) => err.is_timeout() || err.is_connect() || err.is_request(),
            Self::ProviderNotConfigured(_)
            | Self::InvalidResponse(_)
            | Self::DimensionMismatch { .. }
            | Self::Serialization(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        let server_error = EmbeddingError::ApiRequest {
            status: 503,
            body: String::new(),
        };
        let bad_request = EmbeddingError::ApiRequest {
            status: 400,
            body: String::new(),
        };

        assert!(server_error.is_transient());
        assert!(!bad_request.is_transient());
        assert!(!EmbeddingError::InvalidResponse("shape".to_string()).is_transient());
        assert!(
            !EmbeddingError::DimensionMismatch {
                expected: 2,
                actual: 1
            }
            .is_transient()
        );
    }
}
