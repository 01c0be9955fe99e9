// =================================================================
// fees/collector.rs - Exchange Fee Collectors
// =================================================================

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::warn;

use crate::proxy::{ApiProxy, ExchangeConfig, Params, ProxyError};

const TICKER_PRICE_ENDPOINT: &str = "/api/v3/ticker/price";
const ACCOUNT_ENDPOINT: &str = "/api/v3/account";

/// Binance US default maker/taker commission, in basis points.
const DEFAULT_FEE_BPS: f64 = 10.0;

/// Standard interface for collecting fee data from one exchange.
#[async_trait]
pub trait FeeCollector: Send + Sync {
    /// Exchange name for logging and ratio bookkeeping
    fn name(&self) -> &str;

    /// Trading pair symbol in the exchange's format
    fn symbol(&self) -> &str;

    /// Current market price for the trading pair, in quote currency
    async fn current_price(&self) -> Result<f64, ProxyError>;

    /// Trading fee for a transaction of the given size (quote currency)
    async fn trading_fee(&self, transaction_amount: f64) -> Result<f64, ProxyError>;

    /// The exchange's fee structure and tiers
    fn fee_structure(&self) -> Value;

    /// Test the connection to the exchange API
    async fn validate_connection(&self) -> bool {
        match self.current_price().await {
            Ok(price) => price > 0.0,
            Err(e) => {
                warn!("{} connection validation failed: {}", self.name(), e);
                false
            }
        }
    }

    /// Minimum transaction amount for this exchange, in quote currency
    fn min_transaction_amount(&self) -> f64 {
        10.0
    }

    /// Maximum transaction amount for this exchange, in quote currency
    fn max_transaction_amount(&self) -> f64 {
        1_000_000.0
    }
}

/// Binance US fee collector
pub struct BinanceFeeCollector {
    proxy: ApiProxy,
    symbol: String,
}

impl BinanceFeeCollector {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        base_currency: &str,
        quote_currency: &str,
    ) -> Result<Self, ProxyError> {
        Self::with_config(
            ExchangeConfig::binance(api_key, api_secret, false),
            base_currency,
            quote_currency,
        )
    }

    pub fn with_config(
        config: ExchangeConfig,
        base_currency: &str,
        quote_currency: &str,
    ) -> Result<Self, ProxyError> {
        Ok(Self {
            proxy: ApiProxy::new(config)?,
            symbol: format!(
                "{}{}",
                base_currency.to_uppercase(),
                quote_currency.to_uppercase()
            ),
        })
    }

    /// Maker/taker commission from the account endpoint, in basis points.
    async fn account_commission_bps(&self) -> Result<(f64, f64), ProxyError> {
        let account = self
            .proxy
            .make_request("GET", ACCOUNT_ENDPOINT, None, None, true, None)
            .await?;

        let maker = account
            .get("makerCommission")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_FEE_BPS);
        let taker = account
            .get("takerCommission")
            .and_then(Value::as_f64)
            .unwrap_or(DEFAULT_FEE_BPS);
        Ok((maker, taker))
    }
}

#[async_trait]
impl FeeCollector for BinanceFeeCollector {
    fn name(&self) -> &str {
        "Binance"
    }

    fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn current_price(&self) -> Result<f64, ProxyError> {
        let mut params = Params::new();
        params.insert("symbol".to_string(), Value::String(self.symbol.clone()));

        let response = self
            .proxy
            .make_public_request("GET", TICKER_PRICE_ENDPOINT, Some(params), None)
            .await?;

        response
            .get("price")
            .and_then(Value::as_str)
            .and_then(|p| p.parse::<f64>().ok())
            .ok_or_else(|| {
                ProxyError::InvalidResponse("missing or invalid price in ticker response".to_string())
            })
    }

    /// Fee for one transaction, using the account's maker rate when the
    /// account endpoint is readable and the default rate otherwise.
    async fn trading_fee(&self, transaction_amount: f64) -> Result<f64, ProxyError> {
        let price = self.current_price().await?;
        let quantity = transaction_amount / price;

        let (maker_bps, _taker_bps) = match self.account_commission_bps().await {
            Ok(commission) => commission,
            Err(e) => {
                warn!("falling back to default Binance fees: {}", e);
                (DEFAULT_FEE_BPS, DEFAULT_FEE_BPS)
            }
        };

        let fee_rate = maker_bps / 10_000.0;
        let fee_in_base = quantity * fee_rate;
        Ok(fee_in_base * price)
    }

    fn fee_structure(&self) -> Value {
        json!({
            "exchange": "Binance",
            "symbol": self.symbol,
            "fee_type": "maker/taker",
            "default_maker_bps": DEFAULT_FEE_BPS,
            "default_taker_bps": DEFAULT_FEE_BPS,
            "source": "account makerCommission/takerCommission when available",
        })
    }
}
