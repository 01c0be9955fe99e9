// fees/mod.rs
pub mod collector;
pub mod ratio;

// Re-export main interfaces for easy access
pub use collector::{BinanceFeeCollector, FeeCollector};
pub use ratio::{FeePoint, RatioCalculator, RatioPoint};

/// Smallest transaction size of the sweep, in quote currency.
const SWEEP_START_USD: f64 = 1000.0;
/// Largest transaction size of the sweep.
const SWEEP_MAX_USD: f64 = 1_000_000.0;
/// Absolute floor on a transaction size.
const SWEEP_FLOOR_USD: f64 = 10.0;

/// Generate the exponential transaction-size sweep for one collection
/// epoch: $1000 doubling up to $1M, floored at max(0.001 x price, $10).
pub fn transaction_sizes(coin_price: f64) -> Vec<f64> {
    let mut sizes = Vec::new();
    let mut current = SWEEP_START_USD;
    while current <= SWEEP_MAX_USD {
        sizes.push(current);
        current *= 2.0;
    }

    let min_allowed = (0.001 * coin_price).max(SWEEP_FLOOR_USD);
    sizes.retain(|size| *size >= min_allowed);

    // Extremely expensive coins can push the floor past the whole base
    // sweep; rebuild from the floor instead.
    if sizes.is_empty() {
        let mut current = min_allowed;
        while current <= SWEEP_MAX_USD {
            sizes.push((current * 100.0).round() / 100.0);
            current *= 2.0;
        }
    }

    sizes
}
