//! Strategy trait definitions.
//!
//! A strategy is a pair of capabilities: derive indicator values from candle
//! history (`fetch_data`) and map them to a normalized score (`score`).
//! Persisting the result is the ensemble's job, which keeps strategies pure.

use crate::error::StrategyError;
use crate::types::{Candle, IndicatorValues, StrategyKind};

/// Configuration trait for strategies.
pub trait StrategyConfig: Send + Sync + Clone + 'static {
    /// Validate the configuration.
    fn validate(&self) -> Result<(), StrategyError>;
}

/// Core strategy trait.
pub trait Strategy: Send + Sync {
    /// Indicator values this strategy scores.
    type Data: Into<IndicatorValues>;

    /// Which strategy this is.
    fn kind(&self) -> StrategyKind;

    /// Number of candles `fetch_data` needs.
    fn lookback(&self) -> usize;

    /// Derive indicator values from candles, oldest first.
    fn fetch_data(&self, candles: &[Candle]) -> Result<Self::Data, StrategyError>;

    /// Score indicator values into [-1, 1].
    ///
    /// Positive scores favor buying, negative scores favor selling.
    fn score(&self, data: &Self::Data) -> f64;

    /// Check that the candle history is long enough.
    fn ensure_history(&self, candles: &[Candle]) -> Result<(), StrategyError> {
        if candles.len() < self.lookback() {
            return Err(StrategyError::InsufficientData {
                required: self.lookback(),
                available: candles.len(),
            });
        }
        Ok(())
    }
}

/// Values and clamped score of one strategy evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation {
    pub values: IndicatorValues,
    pub score: f64,
}

/// Object-safe view of a [`Strategy`], used by registries and ensembles.
pub trait DynStrategy: Send + Sync {
    fn strategy_kind(&self) -> StrategyKind;

    /// Candles needed for one evaluation.
    fn history_len(&self) -> usize;

    /// Fetch, score and clamp.
    fn evaluate(&self, candles: &[Candle]) -> Result<Evaluation, StrategyError>;
}

impl<S: Strategy> DynStrategy for S {
    fn strategy_kind(&self) -> StrategyKind {
        self.kind()
    }

    fn history_len(&self) -> usize {
        self.lookback()
    }

    fn evaluate(&self, candles: &[Candle]) -> Result<Evaluation, StrategyError> {
        let data = self.fetch_data(candles)?;
        let score = clamp_score(self.score(&data));
        Ok(Evaluation {
            values: data.into(),
            score,
        })
    }
}

/// Clamp a score into [-1, 1], mapping NaN to neutral.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(-1.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    struct Stretch {
        factor: f64,
    }

    struct Last(f64);

    impl From<Last> for IndicatorValues {
        fn from(last: Last) -> Self {
            IndicatorValues::Stochastic { k: last.0, d: last.0 }
        }
    }

    impl Strategy for Stretch {
        type Data = Last;

        fn kind(&self) -> StrategyKind {
            StrategyKind::Stochastic
        }

        fn lookback(&self) -> usize {
            2
        }

        fn fetch_data(&self, candles: &[Candle]) -> Result<Last, StrategyError> {
            self.ensure_history(candles)?;
            Ok(Last(candles[candles.len() - 1].close))
        }

        fn score(&self, data: &Last) -> f64 {
            data.0 * self.factor
        }
    }

    fn candles(n: usize) -> Vec<Candle> {
        (0..n)
            .map(|i| Candle::new("KRW-BTC", Utc::now(), 1.0, 1.0, 1.0, i as f64, 1.0))
            .collect()
    }

    #[test]
    fn test_evaluate_clamps() {
        let strategy = Stretch { factor: 10.0 };
        let eval = strategy.evaluate(&candles(3)).unwrap();
        assert_eq!(eval.score, 1.0);
        assert_eq!(eval.values, IndicatorValues::Stochastic { k: 2.0, d: 2.0 });
    }

    #[test]
    fn test_short_history_fails() {
        let strategy = Stretch { factor: 1.0 };
        let err = strategy.evaluate(&candles(1)).unwrap_err();
        assert!(matches!(
            err,
            StrategyError::InsufficientData { required: 2, available: 1 }
        ));
    }

    #[test]
    fn test_clamp_score_nan() {
        assert_eq!(clamp_score(f64::NAN), 0.0);
        assert_eq!(clamp_score(-3.0), -1.0);
    }
}
