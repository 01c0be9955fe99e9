use config::{Config, ConfigError, Environment};
use serde::Deserialize;

/// API credentials for one exchange, loaded from the process environment
/// (e.g. `BINANCE__API_KEY` / `BINANCE__API_SECRET`).
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: Option<String>,
}

impl ExchangeCredentials {
    /// Empty credentials for public-only access.
    pub fn public() -> Self {
        Self {
            api_key: String::new(),
            api_secret: String::new(),
            passphrase: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct Settings {
    pub binance: Option<ExchangeCredentials>,
    pub kraken: Option<ExchangeCredentials>,
    pub coinbase: Option<ExchangeCredentials>,
    pub gemini: Option<ExchangeCredentials>,
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(Environment::default().separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Binance credentials, or empty ones for public endpoints.
    pub fn binance_or_public(&self) -> ExchangeCredentials {
        self.binance.clone().unwrap_or_else(ExchangeCredentials::public)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_public_credentials_are_empty() {
        let creds = ExchangeCredentials::public();
        assert!(creds.api_key.is_empty());
        assert!(creds.api_secret.is_empty());
        assert!(creds.passphrase.is_none());
    }

    #[test]
    fn test_missing_exchanges_default_to_public() {
        let settings = Settings::default();
        assert!(settings.binance.is_none());
        assert!(settings.binance_or_public().api_key.is_empty());
    }
}
