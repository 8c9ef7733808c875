//! Order types and structures.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::trade::FillSummary;

/// Order side (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Get the opposite side.
    pub fn opposite(&self) -> Self {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Exchange wire name (`bid` / `ask`).
    pub fn as_exchange_str(&self) -> &'static str {
        match self {
            Side::Buy => "bid",
            Side::Sell => "ask",
        }
    }

    /// Parse the exchange wire name.
    pub fn from_exchange_str(s: &str) -> Option<Self> {
        match s {
            "bid" => Some(Side::Buy),
            "ask" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            other => Err(format!("unknown side: {other}")),
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Limit order at a given price and volume
    Limit,
    /// Market buy spending a quote amount (`price` = funds)
    Price,
    /// Market sell of a base volume
    Market,
}

impl OrderType {
    /// Exchange wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Limit => "limit",
            OrderType::Price => "price",
            OrderType::Market => "market",
        }
    }

    pub fn from_exchange_str(s: &str) -> Option<Self> {
        match s {
            "limit" => Some(OrderType::Limit),
            "price" => Some(OrderType::Price),
            "market" => Some(OrderType::Market),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order state as reported by the exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderState {
    /// Waiting in the book
    Wait,
    /// Reserved (stop orders)
    Watch,
    /// Completely executed
    Done,
    /// Canceled, possibly after partial execution
    Cancel,
}

impl OrderState {
    /// Check if the order can no longer change.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderState::Done | OrderState::Cancel)
    }

    pub fn from_exchange_str(s: &str) -> Option<Self> {
        match s {
            "wait" => Some(OrderState::Wait),
            "watch" => Some(OrderState::Watch),
            "done" => Some(OrderState::Done),
            "cancel" => Some(OrderState::Cancel),
            _ => None,
        }
    }
}

/// Order request for submitting new orders.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Market to trade
    pub symbol: String,
    /// Buy or sell
    pub side: Side,
    /// Type of order
    pub order_type: OrderType,
    /// Base volume (limit and market sell orders)
    pub volume: Option<Decimal>,
    /// Unit price for limit orders, total funds for market-price buys
    pub price: Option<Decimal>,
    /// Client-generated idempotency token
    pub identifier: String,
}

impl OrderRequest {
    /// Market buy spending `funds` of the quote currency.
    pub fn market_buy(
        symbol: impl Into<String>,
        funds: Decimal,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Buy,
            order_type: OrderType::Price,
            volume: None,
            price: Some(funds),
            identifier: identifier.into(),
        }
    }

    /// Market sell of `volume` base units.
    pub fn market_sell(
        symbol: impl Into<String>,
        volume: Decimal,
        identifier: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            side: Side::Sell,
            order_type: OrderType::Market,
            volume: Some(volume),
            price: None,
            identifier: identifier.into(),
        }
    }
}

/// A single execution (partial fill) of an order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Execution id
    pub uuid: String,
    /// Execution price
    pub price: Decimal,
    /// Executed base volume
    pub volume: Decimal,
    /// Quote amount exchanged (`price × volume`)
    pub funds: Decimal,
    pub created_at: DateTime<Utc>,
}

/// Order snapshot returned by the exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Exchange-assigned order id
    pub uuid: String,
    /// Client idempotency token
    pub identifier: Option<String>,
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub state: OrderState,
    /// Requested price or funds
    pub price: Option<Decimal>,
    /// Requested volume
    pub volume: Option<Decimal>,
    /// Fee paid so far
    pub paid_fee: Decimal,
    /// Volume executed so far
    pub executed_volume: Decimal,
    /// Executions reported so far
    pub trades: Vec<Execution>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// A terminal state with at least one execution.
    ///
    /// Market-price buys end in `cancel` after consuming their funds, so a
    /// canceled order with executions counts as filled.
    pub fn is_filled(&self) -> bool {
        self.state.is_terminal() && !self.trades.is_empty()
    }

    /// Accumulate every execution into one fill summary.
    pub fn fill_summary(&self) -> Option<FillSummary> {
        FillSummary::from_executions(&self.trades, self.paid_fee)
    }

    /// Add an execution to the order.
    pub fn add_execution(&mut self, execution: Execution) {
        self.executed_volume += execution.volume;
        self.trades.push(execution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn order(state: OrderState) -> Order {
        Order {
            uuid: "o-1".into(),
            identifier: Some("id-1".into()),
            symbol: "KRW-BTC".into(),
            side: Side::Buy,
            order_type: OrderType::Price,
            state,
            price: Some(dec!(10000)),
            volume: None,
            paid_fee: dec!(5),
            executed_volume: Decimal::ZERO,
            trades: Vec::new(),
            created_at: Utc::now(),
        }
    }

    fn execution(price: Decimal, volume: Decimal) -> Execution {
        Execution {
            uuid: "t".into(),
            price,
            volume,
            funds: price * volume,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_side_wire_names() {
        assert_eq!(Side::Buy.to_string(), "BUY");
        assert_eq!("SELL".parse::<Side>().unwrap(), Side::Sell);
        assert!("HOLD".parse::<Side>().is_err());
        assert_eq!(Side::Sell.as_exchange_str(), "ask");
        assert_eq!(Side::from_exchange_str("bid"), Some(Side::Buy));
        assert_eq!(Side::Buy.opposite(), Side::Sell);
    }

    #[test]
    fn test_filled_requires_terminal_and_executions() {
        let mut o = order(OrderState::Wait);
        o.add_execution(execution(dec!(100), dec!(1)));
        assert!(!o.is_filled());

        o.state = OrderState::Cancel;
        assert!(o.is_filled());

        let done_without_trades = order(OrderState::Done);
        assert!(!done_without_trades.is_filled());
    }

    #[test]
    fn test_fill_summary_accumulates() {
        let mut o = order(OrderState::Done);
        o.add_execution(execution(dec!(100), dec!(2)));
        o.add_execution(execution(dec!(130), dec!(1)));

        let summary = o.fill_summary().unwrap();
        assert_eq!(summary.quantity, dec!(3));
        assert_eq!(summary.funds, dec!(330));
        assert_eq!(summary.price, dec!(110));
        assert_eq!(summary.fee, dec!(5));
        assert_eq!(o.executed_volume, dec!(3));
    }

    #[test]
    fn test_request_builders() {
        let buy = OrderRequest::market_buy("KRW-BTC", dec!(9995), "abc");
        assert_eq!(buy.order_type, OrderType::Price);
        assert_eq!(buy.price, Some(dec!(9995)));
        assert!(buy.volume.is_none());

        let sell = OrderRequest::market_sell("KRW-BTC", dec!(0.5), "def");
        assert_eq!(sell.order_type, OrderType::Market);
        assert_eq!(sell.volume, Some(dec!(0.5)));
        assert!(sell.price.is_none());
    }
}
