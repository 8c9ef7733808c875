//! Candle (OHLCV) data types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One minute-candle of a market.
///
/// Prices and volume are `f64`: candles only feed indicator math, never money
/// arithmetic.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Market code, e.g. `KRW-BTC`
    pub symbol: String,
    /// Candle open time (UTC)
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    /// Traded base volume
    pub volume: f64,
}

impl Candle {
    /// Create a new candle.
    pub fn new(
        symbol: impl Into<String>,
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Close minus open.
    #[inline]
    pub fn body(&self) -> f64 {
        self.close - self.open
    }

    /// Check if this is a bullish (green) candle.
    #[inline]
    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    /// Check if this is a bearish (red) candle.
    #[inline]
    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// Column views over a chronologically ordered candle slice.
pub trait CandleSlice {
    fn closes(&self) -> Vec<f64>;
    fn highs(&self) -> Vec<f64>;
    fn lows(&self) -> Vec<f64>;
    fn volumes(&self) -> Vec<f64>;
}

impl CandleSlice for [Candle] {
    fn closes(&self) -> Vec<f64> {
        self.iter().map(|c| c.close).collect()
    }

    fn highs(&self) -> Vec<f64> {
        self.iter().map(|c| c.high).collect()
    }

    fn lows(&self) -> Vec<f64> {
        self.iter().map(|c| c.low).collect()
    }

    fn volumes(&self) -> Vec<f64> {
        self.iter().map(|c| c.volume).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candle_direction() {
        let up = Candle::new("KRW-BTC", Utc::now(), 100.0, 110.0, 95.0, 105.0, 1.0);
        assert!(up.is_bullish());
        assert!((up.body() - 5.0).abs() < f64::EPSILON);

        let down = Candle::new("KRW-BTC", Utc::now(), 100.0, 101.0, 90.0, 92.0, 1.0);
        assert!(down.is_bearish());
    }

    #[test]
    fn test_candle_columns() {
        let candles = vec![
            Candle::new("KRW-ETH", Utc::now(), 1.0, 2.0, 0.5, 1.5, 10.0),
            Candle::new("KRW-ETH", Utc::now(), 1.5, 3.0, 1.0, 2.5, 20.0),
        ];
        assert_eq!(candles.closes(), vec![1.5, 2.5]);
        assert_eq!(candles.volumes(), vec![10.0, 20.0]);
        assert_eq!(candles.highs(), vec![2.0, 3.0]);
        assert_eq!(candles.lows(), vec![0.5, 1.0]);
    }
}
