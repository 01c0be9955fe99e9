// =================================================================
// exchange/binance.rs - Binance Spot Client
// =================================================================

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info};

use super::errors::ExchangeError;
use super::traits::Exchange;
use super::types::{CandleStickData, OrderType, TradeDirection};
use super::utils::{adjust_price_to_tick, adjust_quantity_for_min_notional, validate_symbol};
use crate::proxy::{ApiProxy, ExchangeConfig, Params};

// Endpoints
const PING_ENDPOINT: &str = "/api/v3/ping";
const ACCOUNT_STATUS_ENDPOINT: &str = "/sapi/v3/accountStatus";
const KLINES_ENDPOINT: &str = "/api/v3/klines";
/// Orders go to the validation-only endpoint; swap for `/api/v3/order`
/// to hit the live matching engine.
const ORDER_TEST_ENDPOINT: &str = "/api/v3/order/test";

const DEFAULT_TIME_IN_FORCE: &str = "GTC";

/// Binance US spot trading client, built on the authenticated API proxy.
pub struct BinanceSpot {
    proxy: ApiProxy,
    currency_asset: String,
}

impl BinanceSpot {
    /// Create a client for one trading pair, e.g. currency "USD",
    /// asset "BTC" -> symbol "BTCUSD".
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        currency: &str,
        asset: &str,
    ) -> Result<Self, ExchangeError> {
        Self::with_config(ExchangeConfig::binance(api_key, api_secret, false), currency, asset)
    }

    /// Create a client over an explicit configuration (sandbox, tests).
    pub fn with_config(
        config: ExchangeConfig,
        currency: &str,
        asset: &str,
    ) -> Result<Self, ExchangeError> {
        let currency_asset = validate_symbol(&format!("{}{}", asset, currency))?;
        let proxy = ApiProxy::new(config)?;
        Ok(Self {
            proxy,
            currency_asset,
        })
    }

    pub fn currency_asset(&self) -> &str {
        &self.currency_asset
    }

    fn order_type_str(order_type: OrderType) -> &'static str {
        match order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLimit => "STOP_LOSS_LIMIT",
            OrderType::TakeProfitLimit => "TAKE_PROFIT_LIMIT",
            OrderType::LimitMaker => "LIMIT_MAKER",
        }
    }

    /// Validate and adjust an order, then lay out its request parameters.
    fn build_order_params(
        &self,
        direction: TradeDirection,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<Params, ExchangeError> {
        let (quantity, price) = if order_type == OrderType::Limit {
            let price = price.ok_or_else(|| {
                ExchangeError::InvalidOrder("price must be provided for limit orders".to_string())
            })?;
            let price = adjust_price_to_tick(&self.currency_asset, price);
            let quantity =
                adjust_quantity_for_min_notional(&self.currency_asset, quantity, price);
            debug!(
                "order validation: adjusted qty={}, price={}, notional={}",
                quantity,
                price,
                quantity * price
            );
            (quantity, Some(price))
        } else {
            (quantity, price)
        };

        let mut params = Params::new();
        params.insert(
            "symbol".to_string(),
            Value::String(self.currency_asset.clone()),
        );
        params.insert(
            "side".to_string(),
            Value::String(direction.as_str().to_string()),
        );
        params.insert(
            "type".to_string(),
            Value::String(Self::order_type_str(order_type).to_string()),
        );
        params.insert("quantity".to_string(), Value::from(quantity));

        if order_type == OrderType::Limit {
            if let Some(price) = price {
                params.insert("price".to_string(), Value::from(price));
                // Required for limit orders
                params.insert(
                    "timeInForce".to_string(),
                    Value::String(DEFAULT_TIME_IN_FORCE.to_string()),
                );
            }
        }

        Ok(params)
    }
}

#[async_trait]
impl Exchange for BinanceSpot {
    fn name(&self) -> &str {
        "binance"
    }

    async fn connectivity_status(&self) -> bool {
        match self
            .proxy
            .make_public_request("GET", PING_ENDPOINT, None, None)
            .await
        {
            Ok(Value::Object(map)) => map.is_empty(),
            _ => false,
        }
    }

    async fn account_status(&self) -> Result<Value, ExchangeError> {
        let response = self
            .proxy
            .make_request("GET", ACCOUNT_STATUS_ENDPOINT, None, None, true, None)
            .await?;
        info!("account status: {}", response);
        Ok(response)
    }

    async fn candle_stick_data(
        &self,
        interval_minutes: u32,
    ) -> Result<CandleStickData, ExchangeError> {
        let mut params = Params::new();
        params.insert(
            "symbol".to_string(),
            Value::String(self.currency_asset.clone()),
        );
        params.insert(
            "interval".to_string(),
            Value::String(format!("{}m", interval_minutes)),
        );
        params.insert("limit".to_string(), Value::from(1));

        let response = self
            .proxy
            .make_public_request("GET", KLINES_ENDPOINT, Some(params), None)
            .await?;
        let row = response
            .get(0)
            .ok_or_else(|| ExchangeError::ParseError("empty klines response".to_string()))?;
        CandleStickData::from_row(row)
    }

    async fn create_order(
        &self,
        direction: TradeDirection,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
    ) -> Result<Value, ExchangeError> {
        let params = self.build_order_params(direction, order_type, quantity, price)?;

        let result = self
            .proxy
            .make_request("POST", ORDER_TEST_ENDPOINT, Some(params), None, true, None)
            .await?;
        info!("POST {}: {}", ORDER_TEST_ENDPOINT, result);
        Ok(result)
    }
}
