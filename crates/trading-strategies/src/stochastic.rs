//! Stochastic oscillator scoring strategy.

use serde::{Deserialize, Serialize};
use trading_core::{
    error::StrategyError,
    traits::{Strategy, StrategyConfig},
    types::{Candle, IndicatorValues, StrategyKind},
};
use trading_indicators::Stochastic;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticConfig {
    pub k_period: usize,
    pub d_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Weight of the %K / %D crossover term
    pub cross_weight: f64,
}

impl Default for StochasticConfig {
    fn default() -> Self {
        Self {
            k_period: 14,
            d_period: 3,
            oversold: 20.0,
            overbought: 80.0,
            cross_weight: 0.2,
        }
    }
}

impl StrategyConfig for StochasticConfig {
    fn validate(&self) -> Result<(), StrategyError> {
        if self.k_period == 0 || self.d_period == 0 {
            return Err(StrategyError::InvalidConfig(
                "Stochastic periods must be positive".into(),
            ));
        }
        if self.overbought <= self.oversold {
            return Err(StrategyError::InvalidConfig(
                "Overbought must be greater than oversold".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StochasticData {
    pub k: f64,
    pub d: f64,
}

impl From<StochasticData> for IndicatorValues {
    fn from(data: StochasticData) -> Self {
        IndicatorValues::Stochastic {
            k: data.k,
            d: data.d,
        }
    }
}

pub struct StochasticStrategy {
    config: StochasticConfig,
    stochastic: Stochastic,
}

impl StochasticStrategy {
    pub fn new(config: StochasticConfig) -> Result<Self, StrategyError> {
        config.validate()?;
        let stochastic = Stochastic::new(config.k_period, config.d_period)?;
        Ok(Self { config, stochastic })
    }
}

impl Strategy for StochasticStrategy {
    type Data = StochasticData;

    fn kind(&self) -> StrategyKind {
        StrategyKind::Stochastic
    }

    fn lookback(&self) -> usize {
        self.stochastic.period()
    }

    fn fetch_data(&self, candles: &[Candle]) -> Result<StochasticData, StrategyError> {
        self.ensure_history(candles)?;
        self.stochastic
            .calculate_candles(candles)
            .pop()
            .map(|out| StochasticData { k: out.k, d: out.d })
            .ok_or_else(|| StrategyError::NoData("stochastic".into()))
    }

    fn score(&self, data: &StochasticData) -> f64 {
        let c = &self.config;
        let base = if data.k < c.oversold {
            ((c.oversold - data.k) / 10.0).tanh()
        } else if data.k > c.overbought {
            -((data.k - c.overbought) / 10.0).tanh()
        } else {
            0.0
        };
        let cross = c.cross_weight * ((data.k - data.d) / 10.0).tanh();
        (base + cross).clamp(-1.0, 1.0)
    }
}
