// =================================================================
// proxy/config.rs - Exchange Configuration
// =================================================================

use std::collections::HashMap;
use std::fmt;

// Production and sandbox endpoints
const BINANCE_API_URL: &str = "https://api.binance.us";
const BINANCE_SANDBOX_URL: &str = "https://testnet.binance.vision";
const KRAKEN_API_URL: &str = "https://api.kraken.com";
const COINBASE_API_URL: &str = "https://api.coinbase.com";
const GEMINI_API_URL: &str = "https://api.gemini.com";
const GEMINI_SANDBOX_URL: &str = "https://api.sandbox.gemini.com";
const TEST_API_URL: &str = "https://test.example.com";

/// Supported exchange types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeType {
    Binance,
    Kraken,
    Coinbase,
    Gemini,
    Test,
}

impl fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExchangeType::Binance => "binance",
            ExchangeType::Kraken => "kraken",
            ExchangeType::Coinbase => "coinbase",
            ExchangeType::Gemini => "gemini",
            ExchangeType::Test => "test",
        };
        write!(f, "{}", name)
    }
}

/// Immutable configuration for one exchange endpoint and its credentials.
///
/// Owned by the `ApiProxy` that is constructed from it; auth handlers
/// capture the fields they need at construction time and never mutate them.
#[derive(Debug, Clone)]
pub struct ExchangeConfig {
    pub exchange_type: ExchangeType,
    pub api_url: String,
    pub api_key: String,
    pub api_secret: String,
    /// Exchange-specific extras, e.g. the Coinbase passphrase.
    pub extra_params: HashMap<String, String>,
}

impl ExchangeConfig {
    pub fn new(
        exchange_type: ExchangeType,
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
    ) -> Self {
        Self {
            exchange_type,
            api_url: api_url.into(),
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            extra_params: HashMap::new(),
        }
    }

    /// Binance US configuration; `sandbox` selects the spot testnet.
    pub fn binance(api_key: impl Into<String>, api_secret: impl Into<String>, sandbox: bool) -> Self {
        let url = if sandbox { BINANCE_SANDBOX_URL } else { BINANCE_API_URL };
        Self::new(ExchangeType::Binance, url, api_key, api_secret)
    }

    pub fn kraken(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self::new(ExchangeType::Kraken, KRAKEN_API_URL, api_key, api_secret)
    }

    /// Coinbase configuration; the passphrase travels in `extra_params`.
    pub fn coinbase(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        let mut config = Self::new(ExchangeType::Coinbase, COINBASE_API_URL, api_key, api_secret);
        config
            .extra_params
            .insert("passphrase".to_string(), passphrase.into());
        config
    }

    pub fn gemini(api_key: impl Into<String>, api_secret: impl Into<String>, sandbox: bool) -> Self {
        let url = if sandbox { GEMINI_SANDBOX_URL } else { GEMINI_API_URL };
        Self::new(ExchangeType::Gemini, url, api_key, api_secret)
    }

    /// Placeholder configuration for tests; has no auth handler mapping.
    pub fn test() -> Self {
        Self::new(ExchangeType::Test, TEST_API_URL, "test_key", "test_secret")
    }

    pub fn passphrase(&self) -> Option<&str> {
        self.extra_params.get("passphrase").map(String::as_str)
    }
}
