// =================================================================
// exchange/errors.rs - Error Types
// =================================================================

use thiserror::Error;

use crate::proxy::ProxyError;

/// Error types for exchange client operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("API proxy error: {0}")]
    Proxy(#[from] ProxyError),

    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Data parsing error: {0}")]
    ParseError(String),
}

impl ExchangeError {
    /// Check if error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            ExchangeError::Proxy(e) => e.is_recoverable(),
            ExchangeError::InvalidOrder(_) => false,
            ExchangeError::InvalidSymbol(_) => false,
            ExchangeError::ParseError(_) => false,
        }
    }
}
