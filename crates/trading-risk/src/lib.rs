//! Risk management for trading.
//!
//! Decides which side of the market a symbol may be evaluated for, when a
//! held position must be exited regardless of signals, and how large an
//! order may be.

mod exit;
mod limits;
mod posture;
mod sizing;

pub use exit::{ExitGate, ExitReason};
pub use limits::RiskLimits;
pub use posture::{classify_posture, PostureSnapshot};
pub use sizing::OrderSizer;
