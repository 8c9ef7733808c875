//! Error types for the trading system.
//!
//! Library crates return the typed errors below. Each top-level error carries a
//! stable message key (see [`TradingError::key`]) which orchestration code uses
//! as the prefix of the alert it forwards to the manager channel.

use rust_decimal::Decimal;
use thiserror::Error;

/// Top-level trading system error.
#[derive(Error, Debug)]
pub enum TradingError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Strategy error: {0}")]
    Strategy(#[from] StrategyError),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Execution error: {0}")]
    Execution(#[from] ExecutionError),

    #[error("Posture error: {0}")]
    Posture(#[from] PostureError),

    #[error("Envelope error: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("Indicator error: {0}")]
    Indicator(#[from] IndicatorError),
}

impl TradingError {
    /// Stable, machine-readable key for this error.
    pub fn key(&self) -> &'static str {
        match self {
            TradingError::Config(_) => "config.invalid",
            TradingError::Strategy(e) => e.key(),
            TradingError::Exchange(e) => e.key(),
            TradingError::Store(e) => e.key(),
            TradingError::Execution(e) => e.key(),
            TradingError::Posture(_) => "posture.ambiguous",
            TradingError::Envelope(_) => "envelope.malformed",
            TradingError::Indicator(_) => "indicator.failed",
        }
    }
}

/// Strategy-specific errors.
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {required} candles, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("No indicator data for {0}")]
    NoData(String),

    #[error("Strategy not found: {0}")]
    NotFound(String),

    #[error("Strategy error: {0}")]
    Internal(String),
}

impl StrategyError {
    pub fn key(&self) -> &'static str {
        match self {
            StrategyError::InvalidConfig(_) => "strategy.invalid_config",
            StrategyError::InsufficientData { .. } | StrategyError::NoData(_) => {
                "strategy.no_data"
            }
            StrategyError::NotFound(_) => "strategy.not_found",
            StrategyError::Internal(_) => "strategy.failed",
        }
    }
}

impl From<IndicatorError> for StrategyError {
    fn from(err: IndicatorError) -> Self {
        match err {
            IndicatorError::InsufficientData {
                required,
                available,
            } => StrategyError::InsufficientData {
                required,
                available,
            },
            IndicatorError::InvalidParameter(msg) => StrategyError::InvalidConfig(msg),
        }
    }
}

/// Exchange API errors.
#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Order rejected: {0}")]
    OrderRejected(String),

    #[error("Order not found: {0}")]
    OrderNotFound(String),

    #[error("Rate limited: retry after {retry_after_secs} seconds")]
    RateLimited { retry_after_secs: u64 },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed response: {0}")]
    Decode(String),
}

impl ExchangeError {
    pub fn key(&self) -> &'static str {
        match self {
            ExchangeError::Configuration(_) => "exchange.config",
            ExchangeError::Network(_) => "exchange.network",
            ExchangeError::Authentication(_) => "exchange.auth",
            ExchangeError::OrderRejected(_) => "exchange.order_rejected",
            ExchangeError::OrderNotFound(_) => "exchange.order_not_found",
            ExchangeError::RateLimited { .. } => "exchange.rate_limited",
            ExchangeError::Api { .. } => "exchange.api",
            ExchangeError::Decode(_) => "exchange.decode",
        }
    }

    /// Whether a retried request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExchangeError::Network(_) | ExchangeError::RateLimited { .. }
        )
    }
}

/// Shared store errors (database, event bus, advisory lock).
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Session lost")]
    SessionLost,

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    #[error("Record not found: {0}")]
    NotFound(String),
}

impl StoreError {
    pub fn key(&self) -> &'static str {
        match self {
            StoreError::Connection(_) => "store.connection",
            StoreError::SessionLost => "store.session_lost",
            StoreError::Query(_) => "store.query",
            StoreError::Publish { .. } => "store.publish",
            StoreError::NotFound(_) => "store.not_found",
        }
    }
}

/// Order execution errors.
#[derive(Error, Debug)]
pub enum ExecutionError {
    #[error("Insufficient balance for {side} {symbol}: required {required}, available {available}")]
    InsufficientBalance {
        side: String,
        symbol: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Order {uuid} not confirmed after {attempts} attempts")]
    FillUnconfirmed { uuid: String, attempts: u32 },

    #[error("Order submission failed after {attempts} attempts: {reason}")]
    SubmissionFailed { attempts: u32, reason: String },

    #[error("{side} {symbol} still not reflected in balances after {cycles} cycles")]
    DecisionUnresolved {
        side: String,
        symbol: String,
        cycles: u32,
    },
}

impl ExecutionError {
    pub fn key(&self) -> &'static str {
        match self {
            ExecutionError::InsufficientBalance { .. } => "execution.insufficient_balance",
            ExecutionError::FillUnconfirmed { .. } => "execution.fill_unconfirmed",
            ExecutionError::SubmissionFailed { .. } => "execution.submission_failed",
            ExecutionError::DecisionUnresolved { .. } => "execution.decision_unresolved",
        }
    }
}

/// The account is neither holding a position nor able to open one.
#[derive(Error, Debug)]
#[error("{symbol}: holding value {holding_value} and quote balance {quote_balance} match no posture")]
pub struct PostureError {
    pub symbol: String,
    pub holding_value: Decimal,
    pub quote_balance: Decimal,
}

/// Malformed event payloads.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("Empty payload")]
    Empty,

    #[error("Unknown verb {verb} on topic {topic}")]
    UnknownVerb { topic: String, verb: String },

    #[error("Missing argument for {0}")]
    MissingArgument(String),
}

/// Indicator calculation errors.
#[derive(Error, Debug)]
pub enum IndicatorError {
    #[error("Insufficient data: need {required} points, have {available}")]
    InsufficientData { required: usize, available: usize },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Result type alias for trading operations.
pub type TradingResult<T> = Result<T, TradingError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_follow_source() {
        let err: TradingError = StoreError::SessionLost.into();
        assert_eq!(err.key(), "store.session_lost");

        let err: TradingError = ExecutionError::FillUnconfirmed {
            uuid: "abc".into(),
            attempts: 3,
        }
        .into();
        assert_eq!(err.key(), "execution.fill_unconfirmed");
        assert_eq!(err.to_string(), "Execution error: Order abc not confirmed after 3 attempts");
    }

    #[test]
    fn test_transient_exchange_errors() {
        assert!(ExchangeError::Network("timeout".into()).is_transient());
        assert!(!ExchangeError::OrderRejected("no".into()).is_transient());
    }
}
