// =================================================================
// exchange/utils.rs - Utility Functions
// =================================================================

use super::errors::ExchangeError;

/// Minimum notional value accepted for an order, in quote currency.
const MIN_NOTIONAL_USD: f64 = 10.0;

/// Validate symbol format for the spot API
pub fn validate_symbol(symbol: &str) -> Result<String, ExchangeError> {
    if symbol.is_empty() {
        return Err(ExchangeError::InvalidSymbol(
            "Symbol cannot be empty".to_string(),
        ));
    }

    let symbol = symbol.to_uppercase();

    // Basic validation: should be alphanumeric and reasonable length
    if !symbol.chars().all(char::is_alphanumeric) {
        return Err(ExchangeError::InvalidSymbol(format!(
            "Symbol '{}' contains invalid characters",
            symbol
        )));
    }

    if symbol.len() < 3 || symbol.len() > 20 {
        return Err(ExchangeError::InvalidSymbol(format!(
            "Symbol '{}' has invalid length",
            symbol
        )));
    }

    Ok(symbol)
}

/// Snap a price to the symbol's tick size.
pub fn adjust_price_to_tick(symbol: &str, price: f64) -> f64 {
    let (tick_size, decimals) = if symbol.contains("DOGE") {
        (0.00001, 5)
    } else if symbol.contains("BTC") {
        (0.01, 2)
    } else {
        (0.0001, 4)
    };

    round_dp((price / tick_size).round() * tick_size, decimals)
}

/// Bump a quantity up to the exchange's minimum notional value.
pub fn adjust_quantity_for_min_notional(symbol: &str, quantity: f64, price: f64) -> f64 {
    let notional_value = quantity * price;
    if notional_value >= MIN_NOTIONAL_USD {
        return quantity;
    }

    if symbol.contains("DOGE") {
        // DOGE trades in whole units
        ((MIN_NOTIONAL_USD / price) as i64 + 1).max(1) as f64
    } else if symbol.contains("BTC") {
        round_dp((MIN_NOTIONAL_USD / price).max(0.0001), 4)
    } else {
        quantity
    }
}

fn round_dp(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
