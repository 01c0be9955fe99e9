// exchange/traits.rs

use async_trait::async_trait;
use serde_json::Value;

use super::errors::ExchangeError;
use super::types::{CandleStickData, OrderType, TradeDirection};

/// Main exchange interface that all live trading clients must follow
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Exchange name for logging
    fn name(&self) -> &str;

    /// Check whether the exchange API is reachable
    async fn connectivity_status(&self) -> bool;

    /// Retrieve the account status for the authenticated user
    async fn account_status(&self) -> Result<Value, ExchangeError>;

    /// Retrieve the latest candlestick for the trading pair
    async fn candle_stick_data(&self, interval_minutes: u32)
        -> Result<CandleStickData, ExchangeError>;

    /// Place a new order; `price` is required for limit orders
    async fn create_order(
        &self,
        direction: TradeDirection,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<Value, ExchangeError>;
}
