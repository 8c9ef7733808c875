//! Account posture classification.
//!
//! Posture is derived from a fresh account snapshot on every cycle and never
//! cached.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;
use trading_core::error::PostureError;
use trading_core::types::{base_currency, quote_currency, Account, Posture};

use crate::RiskLimits;

/// Posture of one symbol with the figures it was derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostureSnapshot {
    pub symbol: String,
    pub posture: Posture,
    /// Price used to value the base balance
    pub price: Decimal,
    pub base_balance: Decimal,
    pub avg_buy_price: Decimal,
    pub holding_value: Decimal,
    pub quote_balance: Decimal,
}

/// Classify a symbol as holding or flat.
///
/// The base balance is valued at `last_close`, falling back to the average
/// buy price when no candle is available. Above `min_holding_value` the
/// symbol is holding; otherwise a quote balance of at least
/// `min_order_amount` makes it flat. Anything else is an error.
pub fn classify_posture(
    account: &Account,
    symbol: &str,
    last_close: Option<f64>,
    limits: &RiskLimits,
) -> Result<PostureSnapshot, PostureError> {
    let base = account.get(base_currency(symbol));
    let base_balance = base.map(|b| b.balance + b.locked).unwrap_or_default();
    let avg_buy_price = base.map(|b| b.avg_buy_price).unwrap_or_default();
    let quote_balance = account.available(quote_currency(symbol));

    let price = last_close
        .and_then(Decimal::from_f64)
        .filter(|p| *p > Decimal::ZERO)
        .unwrap_or(avg_buy_price);
    let holding_value = base_balance * price;

    let posture = if holding_value > limits.min_holding_value {
        Posture::Holding
    } else if quote_balance >= limits.min_order_amount {
        Posture::Flat
    } else {
        return Err(PostureError {
            symbol: symbol.to_string(),
            holding_value,
            quote_balance,
        });
    };

    debug!(
        symbol,
        posture = %posture,
        holding_value = %holding_value,
        quote_balance = %quote_balance,
        "Posture classified"
    );

    Ok(PostureSnapshot {
        symbol: symbol.to_string(),
        posture,
        price,
        base_balance,
        avg_buy_price,
        holding_value,
        quote_balance,
    })
}
