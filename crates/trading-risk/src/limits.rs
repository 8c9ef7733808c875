//! Risk thresholds.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Thresholds shared by analysis and execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskLimits {
    /// Base holding value (in quote currency) above which a position counts as held
    pub min_holding_value: Decimal,
    /// Smallest quote amount an order may spend
    pub min_order_amount: Decimal,
    /// Profit ratio at or above which a position is sold
    pub take_profit: Decimal,
    /// Profit ratio at or below which a position is sold (negative)
    pub stop_loss: Decimal,
    /// Fraction of the quote balance spent by a buy, leaving room for fees
    pub buy_fraction: Decimal,
    /// Decimal places of order funds in the quote currency
    pub quote_decimals: u32,
}

impl Default for RiskLimits {
    fn default() -> Self {
        Self {
            min_holding_value: dec!(100),
            min_order_amount: dec!(10000),
            take_profit: dec!(0.05),
            stop_loss: dec!(-0.03),
            buy_fraction: dec!(0.9995),
            quote_decimals: 0,
        }
    }
}

impl RiskLimits {
    /// Check threshold ordering.
    pub fn validate(&self) -> Result<(), String> {
        if self.take_profit <= Decimal::ZERO {
            return Err(format!("take_profit must be positive, got {}", self.take_profit));
        }
        if self.stop_loss >= Decimal::ZERO {
            return Err(format!("stop_loss must be negative, got {}", self.stop_loss));
        }
        if self.buy_fraction <= Decimal::ZERO || self.buy_fraction > Decimal::ONE {
            return Err(format!("buy_fraction must be in (0, 1], got {}", self.buy_fraction));
        }
        if self.min_order_amount <= Decimal::ZERO || self.min_holding_value < Decimal::ZERO {
            return Err("order and holding minimums must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(RiskLimits::default().validate().is_ok());
    }

    #[test]
    fn test_inverted_exit_thresholds() {
        let limits = RiskLimits {
            stop_loss: dec!(0.02),
            ..Default::default()
        };
        assert!(limits.validate().is_err());

        let limits = RiskLimits {
            buy_fraction: dec!(1.2),
            ..Default::default()
        };
        assert!(limits.validate().is_err());
    }
}
