//! Moving Average Crossover scoring strategy.
//!
//! Scores the relative spread between a short and a long moving average,
//! amplified while the spread widens and damped while it narrows.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{Indicator, Strategy, StrategyConfig},
    types::{Candle, CandleSlice, IndicatorValues, StrategyKind},
};
use trading_indicators::{Ema, Sma};

use crate::macd::trend_strength;

/// Configuration for the MA Crossover strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MACrossoverConfig {
    /// Short moving average period
    pub short_period: usize,
    /// Long moving average period
    pub long_period: usize,
    /// Use EMA instead of SMA
    pub use_ema: bool,
    /// Relative spread that maps to `tanh(1)`
    pub sensitivity: f64,
}

impl Default for MACrossoverConfig {
    fn default() -> Self {
        Self {
            short_period: 5,
            long_period: 20,
            use_ema: false,
            sensitivity: 0.01,
        }
    }
}

impl StrategyConfig for MACrossoverConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.short_period >= self.long_period {
            return Err(StrategyError::InvalidConfig(
                "Short period must be less than long period".into(),
            ));
        }
        if self.short_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Short period must be greater than 0".into(),
            ));
        }
        if self.sensitivity <= 0.0 {
            return Err(StrategyError::InvalidConfig(
                "Crossover sensitivity must be positive".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MACrossoverData {
    pub short_ma: f64,
    pub long_ma: f64,
    pub prev_short_ma: f64,
    pub prev_long_ma: f64,
}

impl From<MACrossoverData> for IndicatorValues {
    fn from(data: MACrossoverData) -> Self {
        IndicatorValues::MovingAverage {
            short_ma: data.short_ma,
            long_ma: data.long_ma,
            prev_short_ma: data.prev_short_ma,
            prev_long_ma: data.prev_long_ma,
        }
    }
}

enum MovingAverage {
    Simple(Sma),
    Exponential(Ema),
}

impl MovingAverage {
    fn new(period: usize, use_ema: bool) -> Result<Self, StrategyError> {
        Ok(if use_ema {
            MovingAverage::Exponential(Ema::new(period)?)
        } else {
            MovingAverage::Simple(Sma::new(period)?)
        })
    }

    /// Last two values, previous first.
    fn last_two(&self, closes: &[f64]) -> Option<(f64, f64)> {
        let values = match self {
            MovingAverage::Simple(sma) => sma.calculate(closes),
            MovingAverage::Exponential(ema) => ema.calculate(closes),
        };
        match values.as_slice() {
            [.., prev, last] => Some((*prev, *last)),
            _ => None,
        }
    }
}

/// Moving Average Crossover scoring strategy.
pub struct MACrossoverStrategy {
    config: MACrossoverConfig,
    short: MovingAverage,
    long: MovingAverage,
}

impl MACrossoverStrategy {
    /// Create a new MA Crossover strategy.
    pub fn new(config: MACrossoverConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            short: MovingAverage::new(config.short_period, config.use_ema)?,
            long: MovingAverage::new(config.long_period, config.use_ema)?,
            config,
        })
    }

    fn spread(short: f64, long: f64) -> f64 {
        if long == 0.0 {
            0.0
        } else {
            (short - long) / long
        }
    }
}

impl Strategy for MACrossoverStrategy {
    type Data = MACrossoverData;

    fn kind(&self) -> StrategyKind {
        StrategyKind::MaCrossover
    }

    fn lookback(&self) -> usize {
        self.config.long_period + 1
    }

    fn fetch_data(&self, candles: &[Candle]) -> Result<MACrossoverData, StrategyError> {
        self.ensure_history(candles)?;
        let closes = candles.closes();
        let (prev_short_ma, short_ma) = self
            .short
            .last_two(&closes)
            .ok_or_else(|| StrategyError::NoData("ma_crossover".into()))?;
        let (prev_long_ma, long_ma) = self
            .long
            .last_two(&closes)
            .ok_or_else(|| StrategyError::NoData("ma_crossover".into()))?;
        Ok(MACrossoverData {
            short_ma,
            long_ma,
            prev_short_ma,
            prev_long_ma,
        })
    }

    fn score(&self, data: &MACrossoverData) -> f64 {
        let spread = Self::spread(data.short_ma, data.long_ma);
        let prev_spread = Self::spread(data.prev_short_ma, data.prev_long_ma);
        let base = (spread / self.config.sensitivity).tanh();
        (base * trend_strength(spread, prev_spread)).clamp(-1.0, 1.0)
    }
}
