//! Core traits for the trading system.

mod exchange;
mod indicator;
mod store;
mod strategy;

pub use exchange::Exchange;
pub use indicator::{Indicator, MultiOutputIndicator};
pub use store::{CandleStore, SignalStore, TradeStore};
pub use strategy::{clamp_score, DynStrategy, Evaluation, Strategy, StrategyConfig};
