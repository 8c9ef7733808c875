//! Volume indicators.

use serde::{Deserialize, Serialize};
use trading_core::error::IndicatorError;
use trading_core::types::Candle;

use crate::require_period;

/// Latest volume against the mean of the preceding window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeRatioOutput {
    /// Volume of the latest candle
    pub volume: f64,
    /// Mean volume of the `period` candles before it
    pub average_volume: f64,
    /// `volume / average_volume`, 1.0 when the average is zero
    pub ratio: f64,
    /// Sign of the latest candle body: 1, -1 or 0
    pub direction: f64,
}

/// Volume spike detector.
#[derive(Debug, Clone)]
pub struct VolumeRatio {
    period: usize,
}

impl VolumeRatio {
    pub fn new(period: usize) -> Result<Self, IndicatorError> {
        require_period("Volume", period, 1)?;
        Ok(Self { period })
    }

    /// Candles needed: the averaging window plus the latest candle.
    pub fn period(&self) -> usize {
        self.period + 1
    }

    /// Ratio for the last candle, oldest first input.
    pub fn calculate_candles(&self, candles: &[Candle]) -> Result<VolumeRatioOutput, IndicatorError> {
        let Some((last, rest)) = candles.split_last() else {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: 0,
            });
        };
        if rest.len() < self.period {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: candles.len(),
            });
        }

        let window = &rest[rest.len() - self.period..];
        let average_volume = window.iter().map(|c| c.volume).sum::<f64>() / self.period as f64;
        let ratio = if average_volume > 0.0 {
            last.volume / average_volume
        } else {
            1.0
        };
        let direction = if last.is_bullish() {
            1.0
        } else if last.is_bearish() {
            -1.0
        } else {
            0.0
        };

        Ok(VolumeRatioOutput {
            volume: last.volume,
            average_volume,
            ratio,
            direction,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn candle(open: f64, close: f64, volume: f64) -> Candle {
        Candle::new("KRW-BTC", Utc::now(), open, open.max(close), open.min(close), close, volume)
    }

    #[test]
    fn test_volume_spike() {
        let vr = VolumeRatio::new(3).unwrap();
        let candles = vec![
            candle(1.0, 1.0, 99.0),
            candle(1.0, 1.1, 10.0),
            candle(1.1, 1.0, 20.0),
            candle(1.0, 1.0, 30.0),
            candle(1.0, 0.9, 60.0),
        ];

        let out = vr.calculate_candles(&candles).unwrap();
        assert!((out.average_volume - 20.0).abs() < 1e-10);
        assert!((out.ratio - 3.0).abs() < 1e-10);
        assert_eq!(out.direction, -1.0);
    }

    #[test]
    fn test_zero_average() {
        let vr = VolumeRatio::new(1).unwrap();
        let out = vr
            .calculate_candles(&[candle(1.0, 1.0, 0.0), candle(1.0, 2.0, 5.0)])
            .unwrap();
        assert_eq!(out.ratio, 1.0);
        assert_eq!(out.direction, 1.0);
    }

    #[test]
    fn test_insufficient_history() {
        let vr = VolumeRatio::new(3).unwrap();
        assert!(vr.calculate_candles(&[candle(1.0, 1.0, 1.0)]).is_err());
        assert!(vr.calculate_candles(&[]).is_err());
    }
}
