//! Account balances and position posture.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Balance of one currency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    /// Currency code, e.g. `KRW` or `BTC`
    pub currency: String,
    /// Available amount
    pub balance: Decimal,
    /// Amount locked in open orders
    pub locked: Decimal,
    /// Average buy price in the quote currency
    pub avg_buy_price: Decimal,
}

impl Balance {
    pub fn new(currency: impl Into<String>, balance: Decimal, avg_buy_price: Decimal) -> Self {
        Self {
            currency: currency.into(),
            balance,
            locked: Decimal::ZERO,
            avg_buy_price,
        }
    }
}

/// Snapshot of all account balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    pub balances: Vec<Balance>,
}

impl Account {
    pub fn new(balances: Vec<Balance>) -> Self {
        Self { balances }
    }

    /// Balance entry for a currency.
    pub fn get(&self, currency: &str) -> Option<&Balance> {
        self.balances.iter().find(|b| b.currency == currency)
    }

    /// Available amount of a currency, zero when absent.
    pub fn available(&self, currency: &str) -> Decimal {
        self.get(currency).map(|b| b.balance).unwrap_or_default()
    }
}

/// Split a `QUOTE-BASE` market code into its currencies.
pub fn split_symbol(symbol: &str) -> (&str, &str) {
    symbol.split_once('-').unwrap_or((symbol, symbol))
}

/// Quote currency of a market (`KRW` for `KRW-BTC`).
pub fn quote_currency(symbol: &str) -> &str {
    split_symbol(symbol).0
}

/// Base currency of a market (`BTC` for `KRW-BTC`).
pub fn base_currency(symbol: &str) -> &str {
    split_symbol(symbol).1
}

/// Whether the account currently holds a position in a market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Posture {
    /// A meaningful base balance is held: evaluate the sell path
    Holding,
    /// No position but enough quote balance to open one: evaluate the buy path
    Flat,
}

impl std::fmt::Display for Posture {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Posture::Holding => write!(f, "holding"),
            Posture::Flat => write!(f, "flat"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_symbol_split() {
        assert_eq!(quote_currency("KRW-BTC"), "KRW");
        assert_eq!(base_currency("KRW-BTC"), "BTC");
    }

    #[test]
    fn test_account_lookup() {
        let account = Account::new(vec![
            Balance::new("KRW", dec!(50000), Decimal::ZERO),
            Balance::new("BTC", dec!(0.01), dec!(90000000)),
        ]);
        assert_eq!(account.available("KRW"), dec!(50000));
        assert_eq!(account.available("ETH"), Decimal::ZERO);
        assert_eq!(account.get("BTC").unwrap().avg_buy_price, dec!(90000000));
    }
}
