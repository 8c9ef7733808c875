//! MACD histogram scoring strategy.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{MultiOutputIndicator, Strategy, StrategyConfig},
    types::{Candle, CandleSlice, IndicatorValues, StrategyKind},
};
use trading_indicators::Macd;

/// Configuration for the MACD strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    /// Histogram, as a fraction of price, that maps to `tanh(1)`
    pub sensitivity: f64,
}

impl Default for MacdConfig {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            sensitivity: 0.001,
        }
    }
}

impl StrategyConfig for MacdConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.fast_period >= self.slow_period {
            return Err(StrategyError::InvalidConfig(
                "MACD fast period must be less than slow period".into(),
            ));
        }
        if self.sensitivity <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "MACD sensitivity must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MacdData {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
    pub prev_histogram: f64,
    pub close: f64,
}

impl From<MacdData> for IndicatorValues {
    fn from(data: MacdData) -> Self {
        IndicatorValues::Macd {
            macd: data.macd,
            signal: data.signal,
            histogram: data.histogram,
            prev_histogram: data.prev_histogram,
            close: data.close,
        }
    }
}

/// Scores the MACD histogram relative to price, scaled by how fast the
/// histogram is growing or shrinking.
pub struct MacdStrategy {
    config: MacdConfig,
    macd: Macd,
}

impl MacdStrategy {
    pub fn new(config: MacdConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let macd = Macd::new(config.fast_period, config.slow_period, config.signal_period)?;
        Ok(Self { config, macd })
    }
}

/// `|current| / |prior|` clamped to [0.5, 1.5]; neutral when there is no prior.
pub(crate) fn trend_strength(current: f64, prior: f64) -> f64 {
    if prior == 0.0 {
        1.0
    } else {
        (current.abs() / prior.abs()).clamp(0.5, 1.5)
    }
}

impl Strategy for MacdStrategy {
    type Data = MacdData;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Macd
    }

    fn lookback(&self) -> usize {
        self.macd.period()
    }

    fn fetch_data(&self, candles: &[Candle]) -> Result<MacdData, StrategyError> {
        self.ensure_history(candles)?;
        let outputs = self.macd.calculate(&candles.closes());
        let close = candles.last().map(|c| c.close).unwrap_or_default();
        match outputs.as_slice() {
            [.., prev, last] => Ok(MacdData {
                macd: last.macd,
                signal: last.signal,
                histogram: last.histogram,
                prev_histogram: prev.histogram,
                close,
            }),
            _ => Err(StrategyError::NoData("macd".into())),
        }
    }

    fn score(&self, data: &MacdData) -> f64 {
        if data.close <= 0.0 {
            return 0.0;
        }
        let base = (data.histogram / (data.close * self.config.sensitivity)).tanh();
        (base * trend_strength(data.histogram, data.prev_histogram)).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trading_core::traits::DynStrategy;

    fn strategy() -> MacdStrategy {
        MacdStrategy::new(MacdConfig::default()).unwrap()
    }

    fn data(histogram: f64, prev_histogram: f64) -> MacdData {
        MacdData {
            macd: 0.0,
            signal: 0.0,
            histogram,
            prev_histogram,
            close: 1000.0,
        }
    }

    #[test]
    fn test_growing_histogram_is_amplified() {
        let s = strategy();
        // hist = 0.1% of price -> tanh(1), growth capped at 1.5
        let score = s.score(&data(1.0, 0.25));
        assert!((score - (1.0_f64.tanh() * 1.5).min(1.0)).abs() < 1e-9);
    }

    #[test]
    fn test_shrinking_histogram_is_damped() {
        let s = strategy();
        let score = s.score(&data(-0.5, -2.0));
        assert!((score - (-0.5_f64).tanh() * 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_no_prior_histogram() {
        let s = strategy();
        assert!((s.score(&data(0.5, 0.0)) - 0.5_f64.tanh()).abs() < 1e-9);
        assert_eq!(trend_strength(3.0, 0.0), 1.0);
    }

    #[test]
    fn test_accelerating_uptrend_scores_positive() {
        let s = strategy();
        let candles: Vec<Candle> = (0..s.lookback() + 5)
            .map(|i| {
                let close = 100.0 + 0.05 * (i * i) as f64;
                Candle::new("KRW-BTC", Utc::now(), close, close, close, close, 1.0)
            })
            .collect();

        let eval = s.evaluate(&candles).unwrap();
        assert!(eval.score > 0.0);
    }

    #[test]
    fn test_short_history() {
        let s = strategy();
        assert!(matches!(
            s.fetch_data(&[]),
            Err(StrategyError::InsufficientData { .. })
        ));
    }
}
