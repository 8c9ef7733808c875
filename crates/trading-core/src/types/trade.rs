//! Persisted trade records.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::order::{Execution, Order, Side};

/// Accumulated executions of one order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillSummary {
    /// Total executed base volume
    pub quantity: Decimal,
    /// Total quote amount exchanged
    pub funds: Decimal,
    /// Volume-weighted average price
    pub price: Decimal,
    /// Fee paid
    pub fee: Decimal,
}

impl FillSummary {
    /// Sum executions; `None` when nothing was executed.
    pub fn from_executions(executions: &[Execution], fee: Decimal) -> Option<Self> {
        let quantity: Decimal = executions.iter().map(|e| e.volume).sum();
        if quantity.is_zero() {
            return None;
        }
        let funds: Decimal = executions.iter().map(|e| e.funds).sum();
        Some(Self {
            quantity,
            funds,
            price: funds / quantity,
            fee,
        })
    }
}

/// Trade row keyed by `(uuid, side, sequence)`.
///
/// Inserted once as a provisional row (`sequence = 0`) right after order
/// submission, then settled in place when the fill is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    /// Exchange order id
    pub uuid: String,
    pub side: Side,
    pub symbol: String,
    pub price: Decimal,
    pub quantity: Decimal,
    pub fee: Decimal,
    pub sequence: i32,
    /// Whether the fill has been confirmed
    pub settled: bool,
    pub created_at: DateTime<Utc>,
}

impl Trade {
    /// Provisional row for a freshly submitted order.
    pub fn provisional(order: &Order) -> Self {
        let (price, quantity) = match order.side {
            Side::Buy => (order.price.unwrap_or_default(), Decimal::ZERO),
            Side::Sell => (Decimal::ZERO, order.volume.unwrap_or_default()),
        };
        Self {
            uuid: order.uuid.clone(),
            side: order.side,
            symbol: order.symbol.clone(),
            price,
            quantity,
            fee: Decimal::ZERO,
            sequence: 0,
            settled: false,
            created_at: order.created_at,
        }
    }

    /// Apply a confirmed fill.
    ///
    /// Returns `false` when the row was already settled.
    pub fn settle(&mut self, fill: &FillSummary) -> bool {
        if self.settled {
            return false;
        }
        self.price = fill.price;
        self.quantity = fill.quantity;
        self.fee = fill.fee;
        self.sequence += 1;
        self.settled = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::order::{OrderState, OrderType};
    use rust_decimal_macros::dec;

    fn sell_order() -> Order {
        Order {
            uuid: "u-1".into(),
            identifier: None,
            symbol: "KRW-XRP".into(),
            side: Side::Sell,
            order_type: OrderType::Market,
            state: OrderState::Wait,
            price: None,
            volume: Some(dec!(12)),
            paid_fee: Decimal::ZERO,
            executed_volume: Decimal::ZERO,
            trades: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_provisional_row() {
        let trade = Trade::provisional(&sell_order());
        assert_eq!(trade.sequence, 0);
        assert!(!trade.settled);
        assert_eq!(trade.quantity, dec!(12));
    }

    #[test]
    fn test_settle_once() {
        let mut trade = Trade::provisional(&sell_order());
        let fill = FillSummary {
            quantity: dec!(12),
            funds: dec!(6000),
            price: dec!(500),
            fee: dec!(3),
        };

        assert!(trade.settle(&fill));
        assert!(!trade.settle(&fill));
        assert_eq!(trade.sequence, 1);
        assert_eq!(trade.quantity, dec!(12));
        assert_eq!(trade.price, dec!(500));
    }

    #[test]
    fn test_empty_executions_have_no_summary() {
        assert!(FillSummary::from_executions(&[], dec!(1)).is_none());
    }
}
