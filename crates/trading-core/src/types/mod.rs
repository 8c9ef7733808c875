//! Core data types for the trading system.

mod account;
mod candle;
mod event;
mod order;
mod signal;
mod trade;

pub use account::{base_currency, quote_currency, split_symbol, Account, Balance, Posture};
pub use candle::{Candle, CandleSlice};
pub use event::{Envelope, Event, Payload, Topic, VERB_CANDLE_SAVED, VERB_SEND};
pub use order::{Execution, Order, OrderRequest, OrderState, OrderType, Side};
pub use signal::{
    truncate_to_hour, Decision, IndicatorValues, SignalRun, StrategyKind, StrategyResult,
};
pub use trade::{FillSummary, Trade};
