//! Error types for completion provider calls.
//!
//! [`ProviderError`] distinguishes failures worth retrying (rate limits,
//! network trouble, overloaded upstream) from permanent ones such as a bad
//! API key. The retry wrapper consults [`ProviderError::is_transient`].

use thiserror::Error;

/// Errors that can occur while asking a provider for a completion.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The server answered HTTP 429.
    /// `retry_after_ms` is taken from the `retry-after` header when present.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    /// Any other non-success HTTP status, with the response body as message.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Transport-level failure (DNS, refused connection, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// The body could not be decoded, or carried no text.
    #[error("invalid provider response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the same request may succeed if sent again later.
    pub fn is_transient(&self) -> bool {
        match self {
            ProviderError::RateLimited { .. } => true,
            ProviderError::ApiError { status, .. } => {
                matches!(status, 408 | 500..=599)
            }
            ProviderError::NetworkError(e) => !e.is_decode() && !e.is_builder(),
            ProviderError::InvalidResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limited_display() {
        let err = ProviderError::RateLimited {
            retry_after_ms: 5000,
        };
        assert_eq!(err.to_string(), "rate limited, retry after 5000ms");
    }

    #[test]
    fn api_error_display() {
        let err = ProviderError::ApiError {
            status: 401,
            message: "Invalid API key".into(),
        };
        assert_eq!(err.to_string(), "API error (status 401): Invalid API key");
    }

    #[test]
    fn transient_classification() {
        assert!(ProviderError::RateLimited { retry_after_ms: 1 }.is_transient());
        assert!(
            ProviderError::ApiError {
                status: 529,
                message: "overloaded".into()
            }
            .is_transient()
        );
        assert!(
            ProviderError::ApiError {
                status: 503,
                message: "unavailable".into()
            }
            .is_transient()
        );
        assert!(
            !ProviderError::ApiError {
                status: 401,
                message: "bad key".into()
            }
            .is_transient()
        );
        assert!(!ProviderError::InvalidResponse("empty".into()).is_transient());
    }

    #[test]
    fn error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<ProviderError>();
    }
}
