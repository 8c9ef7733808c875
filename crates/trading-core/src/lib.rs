//! Core types and traits for the trading system.
//!
//! This crate provides the foundational building blocks including:
//! - Market data and account types (Candle, Balance, Posture)
//! - Order, execution and trade records
//! - Decisions, signal runs and bus envelopes
//! - Core traits for exchanges, stores, indicators and strategies

pub mod error;
pub mod traits;
pub mod types;

pub use error::{TradingError, TradingResult};
pub use traits::*;
pub use types::*;
