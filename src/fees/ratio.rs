// =================================================================
// fees/ratio.rs - Fee Ratio Calculation
// =================================================================

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Ratios kept per exchange before the oldest are discarded.
const MAX_HISTORY_PER_EXCHANGE: usize = 1000;
/// Ratios with |value| beyond this bound are treated as outliers.
const RATIO_OUTLIER_BOUND: f64 = 1000.0;
/// Ratios considered when averaging recent history.
const DEFAULT_LOOKBACK: usize = 50;

/// Single fee data point
#[derive(Debug, Clone)]
pub struct FeePoint {
    pub transaction_size: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
}

/// Single ratio calculation result over two adjacent fee points
#[derive(Debug, Clone)]
pub struct RatioPoint {
    /// Transaction size difference (larger minus smaller)
    pub t_ratio: f64,
    /// Fee difference between the two sizes
    pub fee_ratio: f64,
    /// t_ratio / fee_ratio
    pub ratio: f64,
    pub timestamp: DateTime<Utc>,
    pub exchange: String,
    pub t1: f64,
    pub t2: f64,
    pub fee1: f64,
    pub fee2: f64,
}

/// Calculates fee ratios over collected fee points and predicts fees
/// from their running averages.
#[derive(Debug, Default)]
pub struct RatioCalculator {
    ratio_history: HashMap<String, Vec<RatioPoint>>,
}

impl RatioCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate consecutive-difference ratios within one epoch.
    ///
    /// Fee points are sorted by transaction size ascending; for each
    /// adjacent pair the ratio is `Δsize / Δfee`. Pairs with a zero fee
    /// delta are skipped.
    pub fn calculate_ratios(&self, fee_points: &[FeePoint], exchange: &str) -> Vec<RatioPoint> {
        if fee_points.len() < 2 {
            warn!(
                "need at least 2 fee points to calculate ratios for {}",
                exchange
            );
            return Vec::new();
        }

        let mut sorted_points: Vec<&FeePoint> = fee_points.iter().collect();
        sorted_points.sort_by(|a, b| {
            a.transaction_size
                .partial_cmp(&b.transaction_size)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut ratios = Vec::new();
        for pair in sorted_points.windows(2) {
            let (smaller, larger) = (pair[0], pair[1]);

            let t_ratio = larger.transaction_size - smaller.transaction_size;
            let fee_ratio = larger.fee - smaller.fee;
            if fee_ratio == 0.0 {
                warn!(
                    "{}: zero fee difference between {} and {}",
                    exchange, smaller.transaction_size, larger.transaction_size
                );
                continue;
            }

            let ratio = t_ratio / fee_ratio;
            debug!(
                "{}: {} -> {} fee {} -> {} ratio {:.2}",
                exchange,
                smaller.transaction_size,
                larger.transaction_size,
                smaller.fee,
                larger.fee,
                ratio
            );

            ratios.push(RatioPoint {
                t_ratio,
                fee_ratio,
                ratio,
                timestamp: larger.timestamp.max(smaller.timestamp),
                exchange: exchange.to_string(),
                t1: larger.transaction_size,
                t2: smaller.transaction_size,
                fee1: larger.fee,
                fee2: smaller.fee,
            });
        }

        ratios
    }

    /// Average ratio for an epoch, outliers filtered.
    ///
    /// Returns the average and the number of ratios it covers.
    pub fn epoch_average(ratios: &[RatioPoint]) -> (f64, usize) {
        let filtered: Vec<f64> = ratios
            .iter()
            .map(|r| r.ratio)
            .filter(|r| r.abs() <= RATIO_OUTLIER_BOUND)
            .collect();

        if filtered.is_empty() {
            return (0.0, 0);
        }

        let average = filtered.iter().sum::<f64>() / filtered.len() as f64;
        (average, filtered.len())
    }

    /// Predict the fee for a transaction amount from a ratio average.
    ///
    /// Since ratio = size / fee, the predicted fee is size / ratio.
    pub fn predict_fee(transaction_amount: f64, ratio_average: f64) -> f64 {
        if ratio_average == 0.0 {
            warn!("cannot predict fee with zero ratio average");
            return 0.0;
        }
        transaction_amount / ratio_average
    }

    /// Append ratios to an exchange's bounded history.
    pub fn store_ratios(&mut self, exchange: &str, ratios: Vec<RatioPoint>) {
        let history = self.ratio_history.entry(exchange.to_string()).or_default();
        history.extend(ratios);

        if history.len() > MAX_HISTORY_PER_EXCHANGE {
            let excess = history.len() - MAX_HISTORY_PER_EXCHANGE;
            history.drain(..excess);
        }
    }

    /// Average over an exchange's most recent ratios.
    pub fn recent_average(&self, exchange: &str, lookback: Option<usize>) -> f64 {
        let lookback = lookback.unwrap_or(DEFAULT_LOOKBACK);
        let Some(history) = self.ratio_history.get(exchange) else {
            return 0.0;
        };

        let start = history.len().saturating_sub(lookback);
        let (average, _) = Self::epoch_average(&history[start..]);
        average
    }

    /// Average over the most recent ratios of every tracked exchange.
    pub fn cross_exchange_average(&self, lookback: Option<usize>) -> f64 {
        let lookback = lookback.unwrap_or(DEFAULT_LOOKBACK);
        let recent: Vec<RatioPoint> = self
            .ratio_history
            .values()
            .flat_map(|history| {
                let start = history.len().saturating_sub(lookback);
                history[start..].iter().cloned()
            })
            .collect();

        let (average, _) = Self::epoch_average(&recent);
        average
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fee_point(size: f64, fee: f64) -> FeePoint {
        FeePoint {
            transaction_size: size,
            fee,
            timestamp: Utc::now(),
            exchange: "binance".to_string(),
        }
    }

    fn ratio_point(ratio: f64) -> RatioPoint {
        RatioPoint {
            t_ratio: 0.0,
            fee_ratio: 0.0,
            ratio,
            timestamp: Utc::now(),
            exchange: "binance".to_string(),
            t1: 0.0,
            t2: 0.0,
            fee1: 0.0,
            fee2: 0.0,
        }
    }

    #[test]
    fn test_consecutive_ratios() {
        let calculator = RatioCalculator::new();
        // Points deliberately unsorted; 0.1% fee -> ratio 1000 everywhere
        let points = vec![
            fee_point(4000.0, 4.0),
            fee_point(1000.0, 1.0),
            fee_point(2000.0, 2.0),
        ];

        let ratios = calculator.calculate_ratios(&points, "binance");

        assert_eq!(ratios.len(), 2);
        assert_eq!(ratios[0].t2, 1000.0);
        assert_eq!(ratios[0].t1, 2000.0);
        assert_eq!(ratios[0].ratio, 1000.0);
        assert_eq!(ratios[1].t2, 2000.0);
        assert_eq!(ratios[1].t1, 4000.0);
    }

    #[test]
    fn test_zero_fee_delta_skipped() {
        let calculator = RatioCalculator::new();
        let points = vec![
            fee_point(1000.0, 1.0),
            fee_point(2000.0, 1.0),
            fee_point(4000.0, 4.0),
        ];

        let ratios = calculator.calculate_ratios(&points, "binance");
        assert_eq!(ratios.len(), 1);
        assert_eq!(ratios[0].t2, 2000.0);
    }

    #[test]
    fn test_too_few_points() {
        let calculator = RatioCalculator::new();
        assert!(calculator
            .calculate_ratios(&[fee_point(1000.0, 1.0)], "binance")
            .is_empty());
    }

    #[test]
    fn test_epoch_average_filters_outliers() {
        let ratios = vec![ratio_point(900.0), ratio_point(1100.0), ratio_point(700.0)];
        let (average, count) = RatioCalculator::epoch_average(&ratios);

        // 1100 is beyond the outlier bound
        assert_eq!(count, 2);
        assert_eq!(average, 800.0);
    }

    #[test]
    fn test_epoch_average_empty() {
        assert_eq!(RatioCalculator::epoch_average(&[]), (0.0, 0));
        // Everything filtered out
        let (average, count) = RatioCalculator::epoch_average(&[ratio_point(5000.0)]);
        assert_eq!((average, count), (0.0, 0));
    }

    #[test]
    fn test_fee_prediction_round_trip() {
        // At 0.1% fees the ratio is 1000, so a $10_000 transaction
        // predicts a $10 fee.
        assert_eq!(RatioCalculator::predict_fee(10_000.0, 1000.0), 10.0);
        assert_eq!(RatioCalculator::predict_fee(10_000.0, 0.0), 0.0);
    }

    #[test]
    fn test_history_is_bounded() {
        let mut calculator = RatioCalculator::new();
        let ratios: Vec<RatioPoint> = (0..1200).map(|i| ratio_point(i as f64)).collect();
        calculator.store_ratios("binance", ratios);

        let history = calculator.ratio_history.get("binance").unwrap();
        assert_eq!(history.len(), MAX_HISTORY_PER_EXCHANGE);
        // Oldest entries were discarded
        assert_eq!(history[0].ratio, 200.0);
    }

    #[test]
    fn test_recent_average_lookback() {
        let mut calculator = RatioCalculator::new();
        calculator.store_ratios(
            "binance",
            vec![ratio_point(100.0), ratio_point(200.0), ratio_point(300.0)],
        );

        assert_eq!(calculator.recent_average("binance", Some(2)), 250.0);
        assert_eq!(calculator.recent_average("binance", None), 200.0);
        assert_eq!(calculator.recent_average("kraken", None), 0.0);
    }

    #[test]
    fn test_cross_exchange_average() {
        let mut calculator = RatioCalculator::new();
        calculator.store_ratios("binance", vec![ratio_point(100.0)]);
        calculator.store_ratios("kraken", vec![ratio_point(300.0)]);

        assert_eq!(calculator.cross_exchange_average(None), 200.0);
    }
}
