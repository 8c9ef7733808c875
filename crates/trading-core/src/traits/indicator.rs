//! Indicator trait definitions.

use crate::error::IndicatorError;

/// Trait for technical indicators.
///
/// Indicators process price data and produce derived values
/// useful for trading decisions.
pub trait Indicator: Send + Sync {
    /// The output type of the indicator.
    type Output;

    /// Calculate indicator values for the given data.
    ///
    /// # Arguments
    /// * `data` - Input data (typically closes, oldest first)
    ///
    /// # Returns
    /// One value per complete window, empty when `data` is too short
    fn calculate(&self, data: &[f64]) -> Vec<Self::Output>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }

    /// Most recent value, validating the input length first.
    fn latest(&self, data: &[f64]) -> Result<Self::Output, IndicatorError> {
        self.validate_data(data)?;
        self.calculate(data)
            .pop()
            .ok_or(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            })
    }
}

/// Multi-output indicator (e.g., Bollinger Bands, MACD).
///
/// Outputs are aligned with the tail of the input: the last output belongs to
/// the last input value.
pub trait MultiOutputIndicator: Send + Sync {
    /// The output type containing multiple values.
    type Outputs;

    /// Calculate indicator values for the given data.
    fn calculate(&self, data: &[f64]) -> Vec<Self::Outputs>;

    /// Get the minimum data points required.
    fn period(&self) -> usize;

    /// Get the name of the indicator.
    fn name(&self) -> &str;

    /// Validate that there's enough data.
    fn validate_data(&self, data: &[f64]) -> Result<(), IndicatorError> {
        if data.len() < self.period() {
            return Err(IndicatorError::InsufficientData {
                required: self.period(),
                available: data.len(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Close-to-close change over `lag` candles.
    struct Change {
        lag: usize,
    }

    impl Indicator for Change {
        type Output = f64;

        fn calculate(&self, data: &[f64]) -> Vec<f64> {
            data.windows(self.lag + 1)
                .map(|w| w[self.lag] - w[0])
                .collect()
        }

        fn period(&self) -> usize {
            self.lag + 1
        }

        fn name(&self) -> &str {
            "change"
        }
    }

    #[test]
    fn test_short_input_is_rejected() {
        let change = Change { lag: 3 };
        assert!(matches!(
            change.validate_data(&[1.0, 2.0]),
            Err(IndicatorError::InsufficientData {
                required: 4,
                available: 2
            })
        ));
        assert!(change.latest(&[1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn test_latest_is_the_tail_window() {
        let change = Change { lag: 1 };
        let closes = [10.0, 12.0, 11.0, 15.0];
        assert_eq!(change.calculate(&closes), vec![2.0, -1.0, 4.0]);
        assert_eq!(change.latest(&closes).unwrap(), 4.0);
    }
}
