//! Decisions, signal runs and per-strategy results.

use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::order::Side;

/// Quantized outcome of an analysis cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Decision {
    Buy,
    Sell,
    Hold,
}

impl Decision {
    /// Quantize a score: `>= buy_threshold` is BUY, `<= sell_threshold` is SELL.
    pub fn from_score(score: f64, buy_threshold: f64, sell_threshold: f64) -> Self {
        if score >= buy_threshold {
            Decision::Buy
        } else if score <= sell_threshold {
            Decision::Sell
        } else {
            Decision::Hold
        }
    }

    /// Order side for an actionable decision.
    pub fn side(&self) -> Option<Side> {
        match self {
            Decision::Buy => Some(Side::Buy),
            Decision::Sell => Some(Side::Sell),
            Decision::Hold => None,
        }
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::Buy => write!(f, "BUY"),
            Decision::Sell => write!(f, "SELL"),
            Decision::Hold => write!(f, "HOLD"),
        }
    }
}

/// The scoring strategies known to the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    Rsi,
    Macd,
    Bollinger,
    Stochastic,
    MaCrossover,
    Volume,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 6] = [
        StrategyKind::Rsi,
        StrategyKind::Macd,
        StrategyKind::Bollinger,
        StrategyKind::Stochastic,
        StrategyKind::MaCrossover,
        StrategyKind::Volume,
    ];

    /// Registry name.
    pub fn name(&self) -> &'static str {
        match self {
            StrategyKind::Rsi => "rsi",
            StrategyKind::Macd => "macd",
            StrategyKind::Bollinger => "bollinger",
            StrategyKind::Stochastic => "stochastic",
            StrategyKind::MaCrossover => "ma_crossover",
            StrategyKind::Volume => "volume",
        }
    }
}

impl std::fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StrategyKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown strategy: {s}"))
    }
}

/// Raw indicator values behind a strategy score, one variant per strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum IndicatorValues {
    Rsi {
        rsi: f64,
        prev_rsi: f64,
    },
    Macd {
        macd: f64,
        signal: f64,
        histogram: f64,
        prev_histogram: f64,
        close: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
        close: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    MovingAverage {
        short_ma: f64,
        long_ma: f64,
        prev_short_ma: f64,
        prev_long_ma: f64,
    },
    Volume {
        volume: f64,
        average_volume: f64,
        ratio: f64,
        direction: f64,
    },
}

impl IndicatorValues {
    /// Strategy that produced these values.
    pub fn kind(&self) -> StrategyKind {
        match self {
            IndicatorValues::Rsi { .. } => StrategyKind::Rsi,
            IndicatorValues::Macd { .. } => StrategyKind::Macd,
            IndicatorValues::Bollinger { .. } => StrategyKind::Bollinger,
            IndicatorValues::Stochastic { .. } => StrategyKind::Stochastic,
            IndicatorValues::MovingAverage { .. } => StrategyKind::MaCrossover,
            IndicatorValues::Volume { .. } => StrategyKind::Volume,
        }
    }
}

/// One strategy's output for a signal run. Write-once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyResult {
    pub signal_id: i64,
    pub values: IndicatorValues,
    /// Normalized score in [-1, 1]
    pub score: f64,
}

impl StrategyResult {
    pub fn kind(&self) -> StrategyKind {
        self.values.kind()
    }
}

/// One invocation of the ensemble for a symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalRun {
    pub id: i64,
    pub symbol: String,
    /// Cycle time truncated to the hour
    pub hour_time: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Truncate a timestamp to the start of its hour.
pub fn truncate_to_hour(at: DateTime<Utc>) -> DateTime<Utc> {
    at.duration_trunc(TimeDelta::hours(1)).unwrap_or(at)
}
