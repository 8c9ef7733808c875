//! Bollinger Band position scoring strategy.
//!
//! Price near the upper band scores toward -1, near the lower band toward +1.
//! Breakouts past the breakout lines are pinned to the extremes instead of
//! following the smooth curve.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{MultiOutputIndicator, Strategy, StrategyConfig},
    types::{Candle, CandleSlice, IndicatorValues, StrategyKind},
};
use trading_indicators::BollingerBands;

/// Configuration for the Bollinger strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerConfig {
    pub period: usize,
    pub std_dev_multiplier: f64,
    /// Fraction of the upper band at or above which the score is -1
    pub upper_breakout: f64,
    /// Multiple of the lower band at or below which the score is +1
    pub lower_breakout: f64,
    /// Steepness of the smooth score
    pub steepness: f64,
}

impl Default for BollingerConfig {
    fn default() -> Self {
        Self {
            period: 20,
            std_dev_multiplier: 2.0,
            upper_breakout: 0.98,
            lower_breakout: 1.02,
            steepness: 1.5,
        }
    }
}

impl StrategyConfig for BollingerConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.period < 2 {
            return Err(StrategyError::InvalidConfig(
                "Bollinger period must be at least 2".into(),
            ));
        }
        if self.std_dev_multiplier <= 0.0 || self.steepness <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Bollinger multiplier and steepness must be positive".into(),
            ));
        }
        if self.upper_breakout <= 0.0 || self.lower_breakout <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Bollinger breakout factors must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerData {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub close: f64,
}

impl From<BollingerData> for IndicatorValues {
    fn from(data: BollingerData) -> Self {
        IndicatorValues::Bollinger {
            upper: data.upper,
            middle: data.middle,
            lower: data.lower,
            close: data.close,
        }
    }
}

pub struct BollingerStrategy {
    config: BollingerConfig,
    bands: BollingerBands,
}

impl BollingerStrategy {
    pub fn new(config: BollingerConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let bands = BollingerBands::new(config.period, config.std_dev_multiplier)?;
        Ok(Self { config, bands })
    }
}

impl Strategy for BollingerStrategy {
    type Data = BollingerData;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Bollinger
    }

    fn lookback(&self) -> usize {
        self.bands.period()
    }

    fn fetch_data(&self, candles: &[Candle]) -> Result<BollingerData, StrategyError> {
        self.ensure_history(candles)?;
        let closes = candles.closes();
        let bands = self
            .bands
            .calculate(&closes)
            .pop()
            .ok_or_else(|| StrategyError::NoData("bollinger".into()))?;
        Ok(BollingerData {
            upper: bands.upper,
            middle: bands.middle,
            lower: bands.lower,
            close: closes[closes.len() - 1],
        })
    }

    fn score(&self, data: &BollingerData) -> f64 {
        // Upper breakout is checked first and wins on very narrow bands.
        if data.close >= data.upper * self.config.upper_breakout {
            return -1.0;
        }
        if data.close <= data.lower * self.config.lower_breakout {
            return 1.0;
        }
        let half_width = (data.upper - data.lower) / 2.0;
        if half_width <= 0.0 {
            return 0.0;
        }
        -(self.config.steepness * (data.close - data.middle) / half_width).tanh()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strategy() -> BollingerStrategy {
        BollingerStrategy::new(BollingerConfig::default()).unwrap()
    }

    fn bands(close: f64) -> BollingerData {
        BollingerData {
            upper: 120.0,
            middle: 100.0,
            lower: 80.0,
            close,
        }
    }

    #[test]
    fn test_upper_breakout_forces_sell() {
        let s = strategy();
        assert_eq!(s.score(&bands(120.0 * 0.99)), -1.0);
        // Regardless of band geometry
        let skewed = BollingerData {
            upper: 50.0,
            middle: 10.0,
            lower: 1.0,
            close: 49.5,
        };
        assert_eq!(s.score(&skewed), -1.0);
    }

    #[test]
    fn test_lower_breakout_forces_buy() {
        let s = strategy();
        assert_eq!(s.score(&bands(80.0 * 1.01)), 1.0);
    }

    #[test]
    fn test_smooth_region() {
        let s = strategy();
        assert_eq!(s.score(&bands(100.0)), 0.0);

        let score = s.score(&bands(110.0));
        assert!((score + 0.75_f64.tanh()).abs() < 1e-9);

        let score = s.score(&bands(90.0));
        assert!((score - 0.75_f64.tanh()).abs() < 1e-9);
    }

    #[test]
    fn test_collapsed_bands() {
        let s = BollingerStrategy::new(BollingerConfig {
            upper_breakout: 1.5,
            lower_breakout: 0.5,
            ..Default::default()
        })
        .unwrap();
        let flat = BollingerData {
            upper: 100.0,
            middle: 100.0,
            lower: 100.0,
            close: 100.0,
        };
        assert_eq!(s.score(&flat), 0.0);
    }
}
