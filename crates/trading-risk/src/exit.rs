//! Take-profit / stop-loss exit gate.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Why a held position must be sold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    TakeProfit { ratio: Decimal },
    StopLoss { ratio: Decimal },
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::TakeProfit { ratio } => write!(f, "take-profit at {:.2}%", ratio * Decimal::ONE_HUNDRED),
            ExitReason::StopLoss { ratio } => write!(f, "stop-loss at {:.2}%", ratio * Decimal::ONE_HUNDRED),
        }
    }
}

/// Sells a position once its profit ratio leaves the configured band.
#[derive(Debug, Clone, Copy)]
pub struct ExitGate {
    take_profit: Decimal,
    stop_loss: Decimal,
}

impl ExitGate {
    pub fn new(take_profit: Decimal, stop_loss: Decimal) -> Self {
        Self {
            take_profit,
            stop_loss,
        }
    }

    /// `(price - avg_buy_price) / avg_buy_price`, `None` without a cost basis.
    pub fn profit_ratio(avg_buy_price: Decimal, price: Decimal) -> Option<Decimal> {
        if avg_buy_price <= Decimal::ZERO {
            return None;
        }
        Some((price - avg_buy_price) / avg_buy_price)
    }

    /// Check whether the position must be exited at `price`.
    pub fn check(&self, avg_buy_price: Decimal, price: Decimal) -> Option<ExitReason> {
        let ratio = Self::profit_ratio(avg_buy_price, price)?;
        if ratio >= self.take_profit {
            Some(ExitReason::TakeProfit { ratio })
        } else if ratio <= self.stop_loss {
            Some(ExitReason::StopLoss { ratio })
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gate() -> ExitGate {
        ExitGate::new(dec!(0.05), dec!(-0.03))
    }

    #[test]
    fn test_take_profit_boundary_inclusive() {
        assert_eq!(
            gate().check(dec!(100), dec!(105)),
            Some(ExitReason::TakeProfit { ratio: dec!(0.05) })
        );
        assert_eq!(gate().check(dec!(100), dec!(104.9)), None);
    }

    #[test]
    fn test_stop_loss() {
        assert_eq!(
            gate().check(dec!(100), dec!(96)),
            Some(ExitReason::StopLoss { ratio: dec!(-0.04) })
        );
        assert_eq!(gate().check(dec!(100), dec!(97.5)), None);
    }

    #[test]
    fn test_no_cost_basis() {
        assert_eq!(gate().check(Decimal::ZERO, dec!(96)), None);
    }

    #[test]
    fn test_reason_display() {
        let reason = ExitReason::StopLoss { ratio: dec!(-0.04) };
        assert_eq!(reason.to_string(), "stop-loss at -4.00%");
    }
}
