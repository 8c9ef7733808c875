//! Technical indicators.
//!
//! This crate provides the indicators behind the scoring strategies:
//! - Moving averages (SMA, EMA)
//! - Momentum indicators (RSI, MACD, Stochastic)
//! - Volatility indicators (Bollinger Bands, Standard Deviation)
//! - Volume ratio against the trailing average
//!
//! Constructors validate their parameters and return an [`IndicatorError`]
//! instead of panicking, since periods come from runtime configuration.
//!
//! [`IndicatorError`]: trading_core::error::IndicatorError

pub mod momentum;
pub mod moving_average;
pub mod volatility;
pub mod volume;

pub use momentum::{Macd, MacdOutput, Rsi, Stochastic, StochasticOutput};
pub use moving_average::{Ema, Sma};
pub use volatility::{BollingerBands, BollingerOutput, StdDev};
pub use volume::{VolumeRatio, VolumeRatioOutput};

use trading_core::error::IndicatorError;

pub(crate) fn require_period(name: &str, period: usize, min: usize) -> Result<(), IndicatorError> {
    if period < min {
        return Err(IndicatorError::InvalidParameter(format!(
            "{name} period must be at least {min}, got {period}"
        )));
    }
    Ok(())
}
