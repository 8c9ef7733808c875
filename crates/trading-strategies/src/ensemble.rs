//! Weighted strategy ensemble.
//!
//! An ensemble is built for one side of the market: the buy ensemble can only
//! decide BUY or HOLD, the sell ensemble only SELL or HOLD. Each member is
//! evaluated independently; a failing member scores 0 and the rest still run.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use trading_core::{
    error::StrategyError,
    traits::{clamp_score, CandleStore, DynStrategy, SignalStore},
    types::{Candle, Decision, Side, SignalRun, StrategyKind, StrategyResult},
};

use crate::registry::StrategyRegistry;

/// How member votes reduce to a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VotePolicy {
    /// Every member must vote for the side
    Unanimous,
    /// Strictly more than half of the members must vote for the side
    Majority,
    /// The combined score is quantized
    Average,
}

impl std::fmt::Display for VotePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VotePolicy::Unanimous => write!(f, "unanimous"),
            VotePolicy::Majority => write!(f, "majority"),
            VotePolicy::Average => write!(f, "average"),
        }
    }
}

fn default_weight() -> f64 {
    1.0
}

/// One configured ensemble member.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSpec {
    /// Registry name
    pub name: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    /// Strategy parameters, defaults when absent
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub params: serde_json::Value,
}

impl MemberSpec {
    pub fn new(name: impl Into<String>, weight: f64) -> Self {
        Self {
            name: name.into(),
            weight,
            params: serde_json::Value::Null,
        }
    }
}

/// Configuration of one ensemble.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnsembleSpec {
    pub policy: VotePolicy,
    pub buy_threshold: f64,
    pub sell_threshold: f64,
    pub strategies: Vec<MemberSpec>,
}

impl EnsembleSpec {
    /// Entry gate: RSI, Bollinger and Stochastic must all agree.
    pub fn buy_default() -> Self {
        Self {
            policy: VotePolicy::Unanimous,
            buy_threshold: 0.3,
            sell_threshold: -0.3,
            strategies: vec![
                MemberSpec::new("rsi", 1.0),
                MemberSpec::new("bollinger", 0.95),
                MemberSpec::new("stochastic", 1.0),
            ],
        }
    }

    /// Exit gate: a strict majority of five strategies.
    pub fn sell_default() -> Self {
        Self {
            policy: VotePolicy::Majority,
            buy_threshold: 0.3,
            sell_threshold: -0.3,
            strategies: vec![
                MemberSpec::new("rsi", 1.0),
                MemberSpec::new("macd", 1.0),
                MemberSpec::new("bollinger", 0.95),
                MemberSpec::new("stochastic", 1.0),
                MemberSpec::new("ma_crossover", 1.0),
            ],
        }
    }

    /// Check thresholds, weights and that every member can be built.
    pub fn validate(&self, registry: &StrategyRegistry) -> Result<(), StrategyError> {
        if self.strategies.is_empty() {
            return Err(StrategyError::InvalidConfig(
                "Ensemble needs at least one strategy".into(),
            ));
        }
        if !(self.sell_threshold < 0.0 && 0.0 < self.buy_threshold) {
            return Err(StrategyError::InvalidConfig(format!(
                "Thresholds must satisfy sell < 0 < buy, got sell {} buy {}",
                self.sell_threshold, self.buy_threshold
            )));
        }
        for member in &self.strategies {
            if member.weight <= 0.0 {
                return Err(StrategyError::InvalidConfig(format!(
                    "Weight of {} must be positive",
                    member.name
                )));
            }
            registry.create(&member.name, member.params.clone())?;
        }
        Ok(())
    }
}

/// Result of one member in one run.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyOutcome {
    pub kind: StrategyKind,
    pub weight: f64,
    /// Clamped strategy score, 0 on failure
    pub score: f64,
    /// `weight × score`, clamped
    pub weighted_score: f64,
    pub vote: Decision,
    /// Failure message when the member could not be evaluated or persisted
    pub error: Option<String>,
}

/// Result of a whole ensemble run.
#[derive(Debug, Clone, PartialEq)]
pub struct EnsembleOutcome {
    pub signal_id: i64,
    pub symbol: String,
    pub outcomes: Vec<StrategyOutcome>,
    /// Mean weighted score, clamped and rounded to 2 decimals
    pub combined_score: f64,
    pub decision: Decision,
}

impl EnsembleOutcome {
    /// Members that failed this run.
    pub fn failures(&self) -> impl Iterator<Item = &StrategyOutcome> {
        self.outcomes.iter().filter(|o| o.error.is_some())
    }
}

struct Member {
    strategy: Box<dyn DynStrategy>,
    weight: f64,
}

/// Weighted ensemble for one side.
pub struct StrategyEnsemble {
    side: Side,
    policy: VotePolicy,
    buy_threshold: f64,
    sell_threshold: f64,
    members: Vec<Member>,
}

impl StrategyEnsemble {
    /// Empty ensemble; add members with [`StrategyEnsemble::with_strategy`].
    pub fn new(side: Side, policy: VotePolicy, buy_threshold: f64, sell_threshold: f64) -> Self {
        Self {
            side,
            policy,
            buy_threshold,
            sell_threshold,
            members: Vec::new(),
        }
    }

    /// Build from configuration, in configured order.
    pub fn from_spec(
        side: Side,
        spec: &EnsembleSpec,
        registry: &StrategyRegistry,
    ) -> Result<Self, StrategyError> {
        spec.validate(registry)?;
        spec.strategies.iter().try_fold(
            Self::new(side, spec.policy, spec.buy_threshold, spec.sell_threshold),
            |ensemble, member| {
                let strategy = registry.create(&member.name, member.params.clone())?;
                Ok(ensemble.with_strategy(strategy, member.weight))
            },
        )
    }

    pub fn with_strategy(mut self, strategy: Box<dyn DynStrategy>, weight: f64) -> Self {
        self.members.push(Member { strategy, weight });
        self
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn policy(&self) -> VotePolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Candles needed by the hungriest member.
    pub fn lookback(&self) -> usize {
        self.members
            .iter()
            .map(|m| m.strategy.history_len())
            .max()
            .unwrap_or(0)
    }

    /// Evaluate every member for a run, persist each result and decide.
    ///
    /// Never fails: member failures are recorded in their outcome.
    pub async fn execute(
        &self,
        run: &SignalRun,
        candles: &dyn CandleStore,
        signals: &dyn SignalStore,
    ) -> EnsembleOutcome {
        let history = match candles.recent_candles(&run.symbol, self.lookback()).await {
            Ok(history) => Ok(history),
            Err(e) => {
                warn!(symbol = %run.symbol, error = %e, "Failed to load candles");
                Err(e.to_string())
            }
        };

        let mut outcomes = Vec::with_capacity(self.members.len());
        for member in &self.members {
            let kind = member.strategy.strategy_kind();
            let result = match &history {
                Ok(history) => self.run_member(run, member, history, signals).await,
                Err(e) => Err(e.clone()),
            };
            let outcome = match result {
                Ok(score) => self.outcome(kind, member.weight, score, None),
                Err(error) => {
                    warn!(
                        symbol = %run.symbol,
                        signal_id = run.id,
                        strategy = %kind,
                        error = %error,
                        "Strategy failed, scoring neutral"
                    );
                    self.outcome(kind, member.weight, 0.0, Some(error))
                }
            };
            debug!(
                symbol = %run.symbol,
                strategy = %kind,
                score = outcome.score,
                weighted = outcome.weighted_score,
                vote = %outcome.vote,
                "Strategy evaluated"
            );
            outcomes.push(outcome);
        }

        let (combined_score, decision) = self.decide(&outcomes);
        info!(
            symbol = %run.symbol,
            signal_id = run.id,
            side = %self.side,
            policy = %self.policy,
            combined_score,
            decision = %decision,
            "Ensemble decided"
        );

        EnsembleOutcome {
            signal_id: run.id,
            symbol: run.symbol.clone(),
            outcomes,
            combined_score,
            decision,
        }
    }

    async fn run_member(
        &self,
        run: &SignalRun,
        member: &Member,
        history: &[Candle],
        signals: &dyn SignalStore,
    ) -> Result<f64, String> {
        let window = &history[history.len().saturating_sub(member.strategy.history_len())..];
        let evaluation = member.strategy.evaluate(window).map_err(|e| e.to_string())?;
        signals
            .record(&StrategyResult {
                signal_id: run.id,
                values: evaluation.values,
                score: evaluation.score,
            })
            .await
            .map_err(|e| e.to_string())?;
        Ok(evaluation.score)
    }

    /// Build a member outcome from a raw score.
    pub fn outcome(
        &self,
        kind: StrategyKind,
        weight: f64,
        score: f64,
        error: Option<String>,
    ) -> StrategyOutcome {
        let score = clamp_score(score);
        let weighted_score = clamp_score(weight * score);
        StrategyOutcome {
            kind,
            weight,
            score,
            weighted_score,
            vote: Decision::from_score(weighted_score, self.buy_threshold, self.sell_threshold),
            error,
        }
    }

    /// Combined score and decision for a set of member outcomes.
    pub fn decide(&self, outcomes: &[StrategyOutcome]) -> (f64, Decision) {
        let combined = combine(outcomes.iter().map(|o| o.weighted_score));
        let target = match self.side {
            Side::Buy => Decision::Buy,
            Side::Sell => Decision::Sell,
        };
        let n = outcomes.len();
        let agreeing = outcomes.iter().filter(|o| o.vote == target).count();

        let reached = match self.policy {
            VotePolicy::Unanimous => n > 0 && agreeing == n,
            VotePolicy::Majority => agreeing * 2 > n,
            VotePolicy::Average => {
                Decision::from_score(combined, self.buy_threshold, self.sell_threshold) == target
            }
        };

        (combined, if reached { target } else { Decision::Hold })
    }
}

/// Mean of weighted scores, clamped to [-1, 1] and rounded to 2 decimals.
pub fn combine(weighted_scores: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, count) = weighted_scores
        .into_iter()
        .fold((0.0, 0usize), |(sum, count), s| (sum + s, count + 1));
    if count == 0 {
        return 0.0;
    }
    let mean = clamp_score(sum / count as f64);
    (mean * 100.0).round() / 100.0
}
