//! Momentum indicators.

use serde::{Deserialize, Serialize};
use trading_core::error::IndicatorError;
use trading_core::traits::{Indicator, MultiOutputIndicator};
use trading_core::types::Candle;

use crate::moving_average::Ema;
use crate::require_period;

/// Relative Strength Index (RSI).
///
/// Measures the speed and magnitude of recent price changes
/// to evaluate overbought or oversold conditions.
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
}

impl Rsi {
    /// Create a new RSI indicator.
    ///
    /// Common periods are 14 (default) or 9.
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        require_period("RSI", period, 1)?;
        Ok(Self { period })
    }

    /// Wilder's smoothing: `avg = (prev_avg * (period - 1) + value) / period`.
    fn wilder_smooth(values: &[f64], period: usize) -> Vec<f64> {
        if values.len() < period {
            return vec![];
        }

        let mut result = Vec::with_capacity(values.len() - period + 1);
        let period_f64 = period as f64;

        let mut avg: f64 = values[..period].iter().sum::<f64>() / period_f64;
        result.push(avg);

        for &value in &values[period..] {
            avg = (avg * (period_f64 - 1.0) + value) / period_f64;
            result.push(avg);
        }

        result
    }
}

impl Indicator for Rsi {
    type Output = f64;

    fn calculate(&self, data: &[f64]) -> Vec<f64> {
        if data.len() <= self.period {
            return vec![];
        }

        let (gains, losses): (Vec<f64>, Vec<f64>) = data
            .windows(2)
            .map(|w| {
                let change = w[1] - w[0];
                (change.max(0.0), (-change).max(0.0))
            })
            .unzip();

        let avg_gains = Self::wilder_smooth(&gains, self.period);
        let avg_losses = Self::wilder_smooth(&losses, self.period);

        avg_gains
            .iter()
            .zip(avg_losses.iter())
            .map(|(&gain, &loss)| match (gain == 0.0, loss == 0.0) {
                // Flat window
                (true, true) => 50.0,
                (_, true) => 100.0,
                _ => 100.0 - (100.0 / (1.0 + gain / loss)),
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.period + 1
    }

    fn name(&self) -> &str {
        "RSI"
    }
}

/// MACD (Moving Average Convergence Divergence) output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdOutput {
    /// MACD line (fast EMA - slow EMA)
    pub macd: f64,
    /// Signal line (EMA of MACD)
    pub signal: f64,
    /// Histogram (MACD - Signal)
    pub histogram: f64,
}

/// MACD indicator.
#[derive(Debug, Clone)]
pub struct Macd {
    fast: Ema,
    slow: Ema,
    signal: Ema,
}

impl Macd {
    /// Create a MACD with custom periods; `fast` must be shorter than `slow`.
    pub fn new(fast: usize, slow: usize, signal: usize) -> Result<Self, IndicatorError> {
        if fast >= slow {
            return Err(IndicatorError::InvalidParameter(format!(
                "MACD fast period {fast} must be less than slow period {slow}"
            )));
        }
        Ok(Self {
            fast: Ema::new(fast)?,
            slow: Ema::new(slow)?,
            signal: Ema::new(signal)?,
        })
    }
}

impl MultiOutputIndicator for Macd {
    type Outputs = MacdOutput;

    fn calculate(&self, data: &[f64]) -> Vec<MacdOutput> {
        let fast_ema = self.fast.calculate(data);
        let slow_ema = self.slow.calculate(data);
        if slow_ema.is_empty() {
            return vec![];
        }

        // Fast EMA starts earlier; align both on the last value.
        let offset = fast_ema.len() - slow_ema.len();
        let macd_line: Vec<f64> = fast_ema[offset..]
            .iter()
            .zip(slow_ema.iter())
            .map(|(f, s)| f - s)
            .collect();

        let signal_line = self.signal.calculate(&macd_line);
        if signal_line.is_empty() {
            return vec![];
        }

        let offset = macd_line.len() - signal_line.len();
        macd_line[offset..]
            .iter()
            .zip(signal_line.iter())
            .map(|(&macd, &signal)| MacdOutput {
                macd,
                signal,
                histogram: macd - signal,
            })
            .collect()
    }

    fn period(&self) -> usize {
        self.slow.period() + self.signal.period()
    }

    fn name(&self) -> &str {
        "MACD"
    }
}

/// Stochastic oscillator output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticOutput {
    /// %K (fast stochastic)
    pub k: f64,
    /// %D (SMA of %K)
    pub d: f64,
}

/// Stochastic oscillator.
///
/// Compares closing price to the high-low range over a period.
#[derive(Debug, Clone)]
pub struct Stochastic {
    k_period: usize,
    d_period: usize,
}

impl Stochastic {
    /// Create with custom periods, 14 / 3 being the usual choice.
    pub fn new(k_period: usize, d_period: usize) -> Result<Self, IndicatorError> {
        require_period("Stochastic %K", k_period, 1)?;
        require_period("Stochastic %D", d_period, 1)?;
        Ok(Self { k_period, d_period })
    }

    /// Minimum number of candles for one output.
    pub fn period(&self) -> usize {
        self.k_period + self.d_period - 1
    }

    /// Calculate stochastic from OHLC data.
    pub fn calculate_ohlc(
        &self,
        high: &[f64],
        low: &[f64],
        close: &[f64],
    ) -> Vec<StochasticOutput> {
        let len = high.len().min(low.len()).min(close.len());
        if len < self.period() {
            return vec![];
        }

        let k_values: Vec<f64> = ((self.k_period - 1)..len)
            .map(|i| {
                let start = i + 1 - self.k_period;
                let highest = high[start..=i].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                let lowest = low[start..=i].iter().cloned().fold(f64::INFINITY, f64::min);
                let range = highest - lowest;
                if range == 0.0 {
                    50.0
                } else {
                    ((close[i] - lowest) / range) * 100.0
                }
            })
            .collect();

        let d_period_f64 = self.d_period as f64;
        k_values
            .windows(self.d_period)
            .map(|w| StochasticOutput {
                k: w[w.len() - 1],
                d: w.iter().sum::<f64>() / d_period_f64,
            })
            .collect()
    }

    /// Calculate stochastic from candles, oldest first.
    pub fn calculate_candles(&self, candles: &[Candle]) -> Vec<StochasticOutput> {
        let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let close: Vec<f64> = candles.iter().map(|c| c.close).collect();
        self.calculate_ohlc(&high, &low, &close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_rsi_bounds() {
        let rsi = Rsi::new(14).unwrap();
        let data: Vec<f64> = (0..30)
            .map(|i| 100.0 + (i as f64 * 0.5).sin() * 5.0)
            .collect();

        let result = rsi.calculate(&data);
        assert_eq!(result.len(), 30 - 14);
        for value in &result {
            assert!(*value >= 0.0 && *value <= 100.0);
        }
    }

    #[test]
    fn test_rsi_extremes() {
        let rsi = Rsi::new(5).unwrap();
        let up = rsi.calculate(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        assert!((up[0] - 100.0).abs() < 1e-10);

        let down = rsi.calculate(&[7.0, 6.0, 5.0, 4.0, 3.0, 2.0, 1.0]);
        assert!(down[0].abs() < 1e-10);

        let flat = rsi.calculate(&[3.0; 7]);
        assert!((flat[0] - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_macd_uptrend() {
        let macd = Macd::new(12, 26, 9).unwrap();
        let data: Vec<f64> = (0..50).map(|i| 100.0 + i as f64).collect();
        let result = macd.calculate(&data);

        assert_eq!(result.len(), 50 - 26 + 1 - 9 + 1);
        assert!(result.last().unwrap().macd > 0.0);
    }

    #[test]
    fn test_macd_rejects_inverted_periods() {
        assert!(Macd::new(26, 12, 9).is_err());
    }

    #[test]
    fn test_stochastic_at_high() {
        let stoch = Stochastic::new(5, 3).unwrap();
        let high = vec![10.0, 11.0, 12.0, 13.0, 14.0, 15.0, 16.0, 17.0];
        let low = vec![5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0];
        let close = high.clone();

        let result = stoch.calculate_ohlc(&high, &low, &close);
        assert_eq!(result.len(), 8 - 7 + 1);
        assert!((result.last().unwrap().k - 100.0).abs() < 1e-10);
        assert!((result.last().unwrap().d - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_stochastic_from_candles() {
        let stoch = Stochastic::new(3, 2).unwrap();
        let candles: Vec<Candle> = [(10.0, 8.0, 8.0), (11.0, 8.0, 9.0), (12.0, 8.0, 8.0), (12.0, 9.0, 9.0)]
            .iter()
            .map(|&(h, l, c)| Candle::new("KRW-BTC", Utc::now(), c, h, l, c, 1.0))
            .collect();

        let result = stoch.calculate_candles(&candles);
        assert_eq!(result.len(), 1);
        // last window: high 12, low 8, close 9
        assert!((result[0].k - 25.0).abs() < 1e-10);
    }
}
