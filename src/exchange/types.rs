// =================================================================
// exchange/types.rs - Data Structures
// =================================================================

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;

use super::errors::ExchangeError;

/// Order types supported by the Binance API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
    TakeProfitLimit,
    LimitMaker,
}

/// Possible trade directions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "BUY",
            TradeDirection::Sell => "SELL",
        }
    }
}

/// One candlestick (K-line) row as returned by the klines endpoint.
///
/// Prices and volumes arrive as strings and are parsed into `Decimal`
/// for precision; timestamps stay as epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandleStickData {
    pub open_time: i64,
    pub open_price: Decimal,
    pub high_price: Decimal,
    pub low_price: Decimal,
    pub close_price: Decimal,
    pub volume: Decimal,
    pub close_time: i64,
    pub quote_asset_volume: Decimal,
    pub num_trades: u64,
    pub taker_buy_base_asset_volume: Decimal,
    pub taker_buy_quote_asset_volume: Decimal,
}

impl CandleStickData {
    /// Parse one kline row from the JSON array form
    /// `[openTime, "open", "high", "low", "close", "volume", closeTime,
    /// "quoteVolume", trades, "takerBase", "takerQuote", ...]`.
    pub fn from_row(row: &Value) -> Result<Self, ExchangeError> {
        Ok(Self {
            open_time: int_at(row, 0)?,
            open_price: decimal_at(row, 1)?,
            high_price: decimal_at(row, 2)?,
            low_price: decimal_at(row, 3)?,
            close_price: decimal_at(row, 4)?,
            volume: decimal_at(row, 5)?,
            close_time: int_at(row, 6)?,
            quote_asset_volume: decimal_at(row, 7)?,
            num_trades: int_at(row, 8)? as u64,
            taker_buy_base_asset_volume: decimal_at(row, 9)?,
            taker_buy_quote_asset_volume: decimal_at(row, 10)?,
        })
    }

    pub fn open_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.open_time)
    }

    pub fn close_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.close_time)
    }
}

fn int_at(row: &Value, index: usize) -> Result<i64, ExchangeError> {
    row.get(index).and_then(Value::as_i64).ok_or_else(|| {
        ExchangeError::ParseError(format!("kline field {} is not an integer", index))
    })
}

fn decimal_at(row: &Value, index: usize) -> Result<Decimal, ExchangeError> {
    let field = row
        .get(index)
        .and_then(Value::as_str)
        .ok_or_else(|| ExchangeError::ParseError(format!("kline field {} is missing", index)))?;
    Decimal::from_str(field).map_err(|e| {
        ExchangeError::ParseError(format!("invalid kline field {} '{}': {}", index, field, e))
    })
}
