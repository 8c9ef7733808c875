//! Volume spike scoring strategy.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig},
    types::{Candle, IndicatorValues, StrategyKind},
};
use trading_indicators::{VolumeRatio, VolumeRatioOutput};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Candles in the averaging window
    pub period: usize,
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self { period: 20 }
    }
}

impl StrategyConfig for VolumeConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Volume period must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeData {
    pub volume: f64,
    pub average_volume: f64,
    pub ratio: f64,
    /// Sign of the latest candle body
    pub direction: f64,
}

impl From<VolumeRatioOutput> for VolumeData {
    fn from(out: VolumeRatioOutput) -> Self {
        Self {
            volume: out.volume,
            average_volume: out.average_volume,
            ratio: out.ratio,
            direction: out.direction,
        }
    }
}

impl From<VolumeData> for IndicatorValues {
    fn from(data: VolumeData) -> Self {
        IndicatorValues::Volume {
            volume: data.volume,
            average_volume: data.average_volume,
            ratio: data.ratio,
            direction: data.direction,
        }
    }
}

/// Above-average volume confirms the direction of the latest candle.
pub struct VolumeStrategy {
    ratio: VolumeRatio,
}

impl VolumeStrategy {
    pub fn new(config: VolumeConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        Ok(Self {
            ratio: VolumeRatio::new(config.period)?,
        })
    }
}

impl Strategy for VolumeStrategy {
    type Data = VolumeData;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Volume
    }

    fn lookback(&self) -> usize {
        self.ratio.period()
    }

    fn fetch_data(&self, candles: &[Candle]) -> Result<VolumeData, StrategyError> {
        Ok(self.ratio.calculate_candles(candles)?.into())
    }

    fn score(&self, data: &VolumeData) -> f64 {
        if data.ratio <= 1.0 {
            return 0.0;
        }
        (data.direction * (data.ratio - 1.0).tanh()).clamp(-1.0, 1.0)
    }
}
