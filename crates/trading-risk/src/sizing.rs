//! Order sizing.

use rust_decimal::{Decimal, RoundingStrategy};
use trading_core::error::ExecutionError;
use trading_core::types::Side;

use crate::RiskLimits;

/// Sizes market orders from fresh balances.
#[derive(Debug, Clone)]
pub struct OrderSizer {
    buy_fraction: Decimal,
    min_order_amount: Decimal,
    min_holding_value: Decimal,
    quote_decimals: u32,
}

impl OrderSizer {
    pub fn new(limits: &RiskLimits) -> Self {
        Self {
            buy_fraction: limits.buy_fraction,
            min_order_amount: limits.min_order_amount,
            min_holding_value: limits.min_holding_value,
            quote_decimals: limits.quote_decimals,
        }
    }

    /// Funds to spend on a market buy, rounded down to the quote precision.
    pub fn buy_funds(&self, symbol: &str, quote_balance: Decimal) -> Result<Decimal, ExecutionError> {
        let funds = (quote_balance * self.buy_fraction)
            .round_dp_with_strategy(self.quote_decimals, RoundingStrategy::ToZero);
        if funds < self.min_order_amount {
            return Err(ExecutionError::InsufficientBalance {
                side: Side::Buy.to_string(),
                symbol: symbol.to_string(),
                required: self.min_order_amount,
                available: funds,
            });
        }
        Ok(funds)
    }

    /// Volume for a market sell: the whole base balance.
    pub fn sell_volume(
        &self,
        symbol: &str,
        base_balance: Decimal,
        price: Decimal,
    ) -> Result<Decimal, ExecutionError> {
        let value = base_balance * price;
        if base_balance <= Decimal::ZERO || value <= self.min_holding_value {
            return Err(ExecutionError::InsufficientBalance {
                side: Side::Sell.to_string(),
                symbol: symbol.to_string(),
                required: self.min_holding_value,
                available: value,
            });
        }
        Ok(base_balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sizer() -> OrderSizer {
        OrderSizer::new(&RiskLimits::default())
    }

    #[test]
    fn test_buy_funds_keeps_fee_headroom() {
        assert_eq!(sizer().buy_funds("KRW-BTC", dec!(100000)).unwrap(), dec!(99950));
        assert_eq!(sizer().buy_funds("KRW-BTC", dec!(12345.67)).unwrap(), dec!(12339));
    }

    #[test]
    fn test_buy_below_minimum() {
        let err = sizer().buy_funds("KRW-BTC", dec!(10001)).unwrap_err();
        assert!(matches!(err, ExecutionError::InsufficientBalance { .. }));
    }

    #[test]
    fn test_sell_whole_balance() {
        assert_eq!(
            sizer().sell_volume("KRW-ETH", dec!(0.5), dec!(4000000)).unwrap(),
            dec!(0.5)
        );
        assert!(sizer().sell_volume("KRW-ETH", dec!(0.00001), dec!(4000000)).is_err());
        assert!(sizer().sell_volume("KRW-ETH", Decimal::ZERO, dec!(4000000)).is_err());
    }
}
