//! Persistence traits shared by the processes.

use crate::error::StoreError;
use crate::types::{Candle, FillSummary, Side, SignalRun, StrategyResult, Trade};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Candle history written by ingestion and read by analysis.
#[async_trait]
pub trait CandleStore: Send + Sync {
    /// Upsert candles on `(symbol, timestamp)`; returns the number written.
    async fn save_candles(&self, candles: &[Candle]) -> Result<usize, StoreError>;

    /// The most recent `limit` candles of a symbol, oldest first.
    async fn recent_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, StoreError>;
}

/// Audit trail of analysis cycles.
#[async_trait]
pub trait SignalStore: Send + Sync {
    /// Create the signal run of a cycle started at `at`.
    async fn create_run(&self, symbol: &str, at: DateTime<Utc>) -> Result<SignalRun, StoreError>;

    /// Persist one strategy result under its run.
    async fn record(&self, result: &StrategyResult) -> Result<(), StoreError>;
}

/// Trade rows, written only by the execution coordinator.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Insert a provisional row. Returns `false` when the row already exists.
    async fn insert_provisional(&self, trade: &Trade) -> Result<bool, StoreError>;

    /// Settle the unsettled row of an order.
    ///
    /// Returns `false` when no unsettled row matched, so replaying the same
    /// confirmation never changes the row twice.
    async fn settle(&self, uuid: &str, side: Side, fill: &FillSummary) -> Result<bool, StoreError>;

    /// Every row of an order.
    async fn trades_for(&self, uuid: &str) -> Result<Vec<Trade>, StoreError>;
}
