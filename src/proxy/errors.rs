// =================================================================
// proxy/errors.rs - Error Types
// =================================================================

use thiserror::Error;

/// Error types for proxy operations.
///
/// One sealed family so callers can match on the kind and decide whether
/// to retry, skip, or abort; the proxy itself never retries.
#[derive(Error, Debug)]
pub enum ProxyError {
    /// Catch-all for unclassified proxy failures (unsupported method,
    /// unknown endpoint, unclassified 4xx).
    #[error("API proxy error: {0}")]
    Api(String),

    /// Bad credentials, unmapped exchange type, or a signing failure.
    #[error("Authentication error: {0}")]
    Authentication(String),

    /// HTTP 429; the payload is the Retry-After hint in seconds.
    #[error("Rate limit exceeded, retry after {0} seconds")]
    RateLimit(String),

    /// Timeouts, connection failures, 5xx.
    #[error("Exchange connection error: {0}")]
    Connection(String),

    /// 200 status with an unparsable body.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProxyError {
    /// Check if the error is worth retrying from the caller's side.
    pub fn is_recoverable(&self) -> bool {
        match self {
            ProxyError::RateLimit(_) => true,
            ProxyError::Connection(_) => true,
            ProxyError::Api(_) => false,
            ProxyError::Authentication(_) => false,
            ProxyError::InvalidResponse(_) => false,
        }
    }

    /// Retry-After hint in seconds for rate-limit errors.
    pub fn retry_after_secs(&self) -> Option<u64> {
        match self {
            ProxyError::RateLimit(hint) => hint.parse().ok(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ProxyError {
    fn from(err: serde_json::Error) -> Self {
        ProxyError::InvalidResponse(format!("invalid JSON in response: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recoverable_kinds() {
        assert!(ProxyError::RateLimit("60".to_string()).is_recoverable());
        assert!(ProxyError::Connection("request timeout to binance".to_string()).is_recoverable());
        assert!(!ProxyError::Authentication("invalid API credentials".to_string()).is_recoverable());
        assert!(!ProxyError::Api("API endpoint not found".to_string()).is_recoverable());
        assert!(!ProxyError::InvalidResponse("invalid JSON in response: eof".to_string())
            .is_recoverable());
    }

    #[test]
    fn test_rate_limit_message_carries_hint() {
        let err = ProxyError::RateLimit("30".to_string());
        assert!(err.to_string().contains("30"));
        assert_eq!(err.retry_after_secs(), Some(30));
        assert_eq!(ProxyError::Api("x".to_string()).retry_after_secs(), None);
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err = ProxyError::from(json_err);
        assert!(matches!(err, ProxyError::InvalidResponse(_)));
        assert!(err.to_string().contains("invalid JSON in response"));
    }
}
