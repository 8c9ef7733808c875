//! Volatility indicators.

use serde::{Deserialize, Serialize};
use trading_core::error::IndicatorError;
use trading_core::traits::{Indicator, MultiOutputIndicator};

use crate::require_period;

/// Population standard deviation over a sliding window.
#[derive(Debug, Clone)]
pub struct StdDev {
    period: usize,
}

impl StdDev {
    /// Create a new standard deviation indicator.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        require_period("StdDev", period, 2)?;
        Ok(Self { period })
    }

    fn mean_and_std(window: &[f64]) -> (f64, f64) {
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let variance = window.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
        (mean, variance.sqrt())
    }
}

impl Indicator for StdDev {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        data.windows(self.period)
            .map(|w| Self::mean_and_std(w).1)
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "StdDev"
    }
}

/// Bollinger Bands output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerOutput {
    /// Upper band
    pub upper: f64,
    /// Middle band (SMA)
    pub middle: f64,
    /// Lower band
    pub lower: f64,
}

impl BollingerOutput {
    /// Distance between the middle and either outer band.
    pub fn half_width(&self) -> f64 {
        (self.upper - self.lower) / 2.0
    }

    /// %B: 0 at the lower band, 1 at the upper band.
    pub fn percent_b(&self, price: f64) -> f64 {
        if self.upper == self.lower {
            0.5
        } else {
            (price - self.lower) / (self.upper - self.lower)
        }
    }
}

/// Bollinger Bands.
///
/// Consists of a middle band (SMA) with upper and lower bands
/// at a specified number of standard deviations.
#[derive(Debug, Clone)]
pub struct BollingerBands {
    period: usize,
    std_dev_multiplier: f64,
}

impl BollingerBands {
    /// Create Bollinger Bands, 20 / 2.0 being the usual choice.
    pub fn new(period: usize, std_dev_multiplier: f64) -> Result<Self, IndicatorError> {
        require_period("Bollinger", period, 2)?;
        if std_dev_multiplier <= 0.0 {
            return Err(IndicatorError::InvalidParameter(format!(
                "Bollinger multiplier must be positive, got {std_dev_multiplier}"
            )));
        }
        Ok(Self {
            period,
            std_dev_multiplier,
        })
    }
}

impl MultiOutputIndicator for BollingerBands {
    type Outputs = BollingerOutput;

    fn calculate(&self, data: &[f64]) -> Vec<BollingerOutput> {
        data.windows(self.period)
            .map(|window| {
                let (mean, std_dev) = StdDev::mean_and_std(window);
                BollingerOutput {
                    upper: mean + self.std_dev_multiplier * std_dev,
                    middle: mean,
                    lower: mean - self.std_dev_multiplier * std_dev,
                }
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period
    }

    fn name(&self) -> &str {
        "Bollinger Bands"
    }
}
