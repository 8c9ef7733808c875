//! Exchange integrations.

mod auth;
mod paper;
mod upbit;

pub use auth::Credentials;
pub use paper::PaperExchange;
pub use upbit::{UpbitConfig, UpbitExchange};
