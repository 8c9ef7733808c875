//! RSI scoring strategy.
//!
//! Oversold readings score toward +1 and overbought readings toward -1, with
//! a small momentum term from the change against the previous reading.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{Indicator, Strategy, StrategyConfig},
    types::{Candle, CandleSlice, IndicatorValues, StrategyKind},
};
use trading_indicators::Rsi;

/// Configuration for the RSI strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
    /// RSI calculation period
    pub period: usize,
    /// Readings below this favor buying
    pub oversold: f64,
    /// Readings above this favor selling
    pub overbought: f64,
    /// Weight of the momentum term
    pub momentum_weight: f64,
    /// RSI points that saturate the momentum term
    pub momentum_scale: f64,
}

impl Default for RsiConfig {
    fn default() -> Self {
        Self {
            period: 14,
            oversold: 30.0,
            overbought: 70.0,
            momentum_weight: 0.2,
            momentum_scale: 10.0,
        }
    }
}

impl StrategyConfig for RsiConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidConfig(
                "RSI period must be at least 2".into(),
            ));
        }
        if self.overbought <= self.oversold {
            return Err(StrategyError::InvalidConfig(
                "Overbought must be greater than oversold".into(),
            ));
        }
        if self.overbought > 100.0 || self.oversold < 0.0 {
            return Err(StrategyError::InvalidConfig(
                "RSI thresholds must be between 0 and 100".into(),
            ));
        }
        if self.momentum_scale <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "RSI momentum scale must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Latest and previous RSI readings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RsiData {
    pub rsi: f64,
    pub prev_rsi: f64,
}

impl From<RsiData> for IndicatorValues {
    fn from(data: RsiData) -> Self {
        IndicatorValues::Rsi {
            rsi: data.rsi,
            prev_rsi: data.prev_rsi,
        }
    }
}

/// RSI scoring strategy.
pub struct RsiStrategy {
    config: RsiConfig,
    rsi: Rsi,
}

impl RsiStrategy {
    /// Create a new RSI strategy.
    pub fn new(config: RsiConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let rsi = Rsi::new(config.period)?;
        Ok(Self { config, rsi })
    }
}

impl Strategy for RsiStrategy {
    type Data = RsiData;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Rsi
    }

    fn lookback(&self) -> usize {
        // One extra close for the previous reading.
        self.rsi.period() + 1
    }

    fn fetch_data(&self, candles: &[Candle]) -> Result<RsiData, StrategyError> {
        self.ensure_history(candles)?;
        let values = self.rsi.calculate(&candles.closes());
        match values.as_slice() {
            [.., prev_rsi, rsi] => Ok(RsiData {
                rsi: *rsi,
                prev_rsi: *prev_rsi,
            }),
            _ => Err(StrategyError::NoData("rsi".into())),
        }
    }

    fn score(&self, data: &RsiData) -> f64 {
        let c = &self.config;
        let base = if data.rsi < c.oversold {
            ((c.oversold - data.rsi) / 10.0).tanh()
        } else if data.rsi > c.overbought {
            -((data.rsi - c.overbought) / 10.0).tanh()
        } else {
            0.0
        };
        let momentum = c.momentum_weight * ((data.rsi - data.prev_rsi) / c.momentum_scale).tanh();
        (base + momentum).clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use trading_core::traits::DynStrategy;

    fn strategy() -> RsiStrategy {
        RsiStrategy::new(RsiConfig::default()).unwrap()
    }

    #[test]
    fn test_oversold_base_score() {
        let s = strategy();
        // No momentum: score is the base alone.
        let score = s.score(&RsiData { rsi: 25.0, prev_rsi: 25.0 });
        assert!((score - 0.5_f64.tanh()).abs() < 1e-9);
        assert!((score - 0.4621).abs() < 1e-4);
    }

    #[test]
    fn test_momentum_added_after_base() {
        let s = strategy();
        let score = s.score(&RsiData { rsi: 25.0, prev_rsi: 20.0 });
        let expected = 0.5_f64.tanh() + 0.2 * 0.5_f64.tanh();
        assert!((score - expected).abs() < 1e-9);
    }

    #[test]
    fn test_overbought_scores_negative() {
        let s = strategy();
        let score = s.score(&RsiData { rsi: 85.0, prev_rsi: 85.0 });
        assert!((score + 1.5_f64.tanh()).abs() < 1e-9);
    }

    #[test]
    fn test_score_clamped() {
        let s = RsiStrategy::new(RsiConfig {
            momentum_weight: 5.0,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(s.score(&RsiData { rsi: 0.0, prev_rsi: -50.0 }), 1.0);
    }

    #[test]
    fn test_fetch_from_falling_candles() {
        let s = strategy();
        let candles: Vec<Candle> = (0..s.lookback())
            .map(|i| {
                let close = 100.0 - i as f64;
                Candle::new("KRW-BTC", Utc::now(), close + 1.0, close + 1.0, close, close, 1.0)
            })
            .collect();

        let eval = s.evaluate(&candles).unwrap();
        assert!(eval.score > 0.0);
        assert!(matches!(eval.values, IndicatorValues::Rsi { rsi, .. } if rsi < 1e-9));
    }

    #[test]
    fn test_invalid_config() {
        let config = RsiConfig {
            oversold: 80.0,
            overbought: 20.0,
            ..Default::default()
        };
        assert!(RsiStrategy::new(config).is_err());
    }
}
