//! Scoring strategies and the weighted ensemble.
//!
//! Each strategy maps candle-derived indicator values to a score in [-1, 1]:
//! - RSI oversold/overbought distance with momentum
//! - MACD histogram strength
//! - Bollinger Band position with breakout clamps
//! - Stochastic oscillator extremes and crossover
//! - Moving average spread and trend
//! - Volume spikes
//!
//! Strategies are built by name through [`StrategyRegistry`] and combined by
//! [`StrategyEnsemble`].

mod bollinger;
mod ensemble;
mod ma_crossover;
mod macd;
mod registry;
mod rsi;
mod stochastic;
mod volume;

pub use bollinger::{BollingerConfig, BollingerData, BollingerStrategy};
pub use ensemble::{
    combine, EnsembleOutcome, EnsembleSpec, MemberSpec, StrategyEnsemble, StrategyOutcome,
    VotePolicy,
};
pub use ma_crossover::{MACrossoverConfig, MACrossoverData, MACrossoverStrategy};
pub use macd::{MacdConfig, MacdData, MacdStrategy};
pub use registry::{StrategyInfo, StrategyRegistry};
pub use rsi::{RsiConfig, RsiData, RsiStrategy};
pub use stochastic::{StochasticConfig, StochasticData, StochasticStrategy};
pub use volume::{VolumeConfig, VolumeData, VolumeStrategy};
