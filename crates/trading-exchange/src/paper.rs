//! Paper exchange for dry runs and tests.
//!
//! Orders are accepted immediately and filled asynchronously: an order stays
//! in `wait` until it has been polled a configurable number of times, then
//! executes at the current price. Market-price buys finish in `cancel` with
//! executions, the way the live exchange reports them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use trading_core::error::ExchangeError;
use trading_core::traits::Exchange;
use trading_core::types::{
    base_currency, quote_currency, Account, Balance, Candle, Execution, Order, OrderRequest,
    OrderState, OrderType, Side,
};
use uuid::Uuid;

/// Base volume precision.
const VOLUME_DP: u32 = 8;

struct PaperOrder {
    order: Order,
    polls: u32,
    /// Amount moved to `locked` at placement
    reserved: Decimal,
}

#[derive(Default)]
struct PaperState {
    balances: HashMap<String, Balance>,
    prices: HashMap<String, Decimal>,
    candles: HashMap<String, Vec<Candle>>,
    orders: HashMap<String, PaperOrder>,
    identifiers: HashMap<String, String>,
    dropped_responses: u32,
    submissions: u32,
}

impl PaperState {
    fn balance_mut(&mut self, currency: &str) -> &mut Balance {
        self.balances
            .entry(currency.to_string())
            .or_insert_with(|| Balance::new(currency, Decimal::ZERO, Decimal::ZERO))
    }

    fn available(&self, currency: &str) -> Decimal {
        self.balances
            .get(currency)
            .map(|b| b.balance)
            .unwrap_or(Decimal::ZERO)
    }
}

/// Simulated exchange.
#[derive(Clone)]
pub struct PaperExchange {
    state: Arc<Mutex<PaperState>>,
    slippage_pct: Decimal,
    fee_rate: Decimal,
    fill_after_polls: u32,
}

impl PaperExchange {
    /// Create a paper exchange funded with `amount` of `currency`.
    pub fn new(currency: &str, amount: Decimal) -> Self {
        let exchange = Self {
            state: Arc::new(Mutex::new(PaperState::default())),
            slippage_pct: Decimal::ZERO,
            fee_rate: dec!(0.0005),
            fill_after_polls: 1,
        };
        exchange.deposit(currency, amount, Decimal::ZERO);
        exchange
    }

    /// Set slippage percentage.
    pub fn with_slippage(mut self, slippage_pct: Decimal) -> Self {
        self.slippage_pct = slippage_pct;
        self
    }

    /// Fee charged on traded funds.
    pub fn with_fee_rate(mut self, fee_rate: Decimal) -> Self {
        self.fee_rate = fee_rate;
        self
    }

    /// Number of `get_order` polls before an order fills. Zero fills on placement.
    pub fn with_fill_after_polls(mut self, polls: u32) -> Self {
        self.fill_after_polls = polls;
        self
    }

    fn state(&self) -> MutexGuard<'_, PaperState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Credit a currency.
    pub fn deposit(&self, currency: &str, amount: Decimal, avg_buy_price: Decimal) {
        let mut state = self.state();
        let balance = state.balance_mut(currency);
        balance.balance += amount;
        balance.avg_buy_price = avg_buy_price;
    }

    pub fn set_price(&self, symbol: &str, price: Decimal) {
        self.state().prices.insert(symbol.to_string(), price);
    }

    /// Append candles; the last close becomes the current price.
    pub fn push_candles(&self, candles: &[Candle]) {
        let mut state = self.state();
        for candle in candles {
            if let Some(price) = Decimal::from_f64_retain(candle.close) {
                state.prices.insert(candle.symbol.clone(), price);
            }
            state
                .candles
                .entry(candle.symbol.clone())
                .or_default()
                .push(candle.clone());
        }
    }

    /// Accept the next `n` orders but report a network error to the caller.
    pub fn drop_next_responses(&self, n: u32) {
        self.state().dropped_responses = n;
    }

    /// Orders accepted so far.
    pub fn submissions(&self) -> u32 {
        self.state().submissions
    }

    pub fn orders(&self) -> Vec<Order> {
        let mut orders: Vec<Order> = self.state().orders.values().map(|o| o.order.clone()).collect();
        orders.sort_by_key(|o| o.created_at);
        orders
    }

    /// Execute a waiting order at `market_price`.
    pub fn execute_at_price(&self, uuid: &str, market_price: Decimal) -> Result<Order, ExchangeError> {
        let mut state = self.state();
        self.fill(&mut state, uuid, market_price)
    }

    fn fill(
        &self,
        state: &mut PaperState,
        uuid: &str,
        market_price: Decimal,
    ) -> Result<Order, ExchangeError> {
        let paper = state
            .orders
            .get(uuid)
            .ok_or_else(|| ExchangeError::OrderNotFound(uuid.to_string()))?;
        let order = &paper.order;
        if order.state.is_terminal() {
            return Ok(order.clone());
        }

        // Apply slippage
        let fill_price = match order.side {
            Side::Buy => market_price * (dec!(1) + self.slippage_pct / dec!(100)),
            Side::Sell => market_price * (dec!(1) - self.slippage_pct / dec!(100)),
        };

        // Check if limit order can be filled
        let (price, volume, funds) = match order.order_type {
            OrderType::Limit => {
                let limit = order.price.unwrap_or_default();
                let marketable = match order.side {
                    Side::Buy => fill_price <= limit,
                    Side::Sell => fill_price >= limit,
                };
                if !marketable {
                    return Ok(order.clone());
                }
                let volume = order.volume.unwrap_or_default();
                (limit, volume, limit * volume)
            }
            OrderType::Price => {
                let funds = order.price.unwrap_or_default();
                let volume = (funds / fill_price).round_dp(VOLUME_DP);
                (fill_price, volume, funds)
            }
            OrderType::Market => {
                let volume = order.volume.unwrap_or_default();
                (fill_price, volume, fill_price * volume)
            }
        };
        let fee = funds * self.fee_rate;
        let side = order.side;
        let order_type = order.order_type;
        let reserved = paper.reserved;
        let symbol = order.symbol.clone();
        let (quote, base) = (quote_currency(&symbol), base_currency(&symbol));

        match side {
            Side::Buy => {
                let q = state.balance_mut(quote);
                q.locked -= reserved;
                q.balance += reserved - funds - fee;
                let b = state.balance_mut(base);
                let held = b.balance + b.locked;
                let cost = b.avg_buy_price * held + funds;
                b.balance += volume;
                if !(held + volume).is_zero() {
                    b.avg_buy_price = cost / (held + volume);
                }
            }
            Side::Sell => {
                let b = state.balance_mut(base);
                b.locked -= reserved;
                if (b.balance + b.locked).is_zero() {
                    b.avg_buy_price = Decimal::ZERO;
                }
                state.balance_mut(quote).balance += funds - fee;
            }
        }

        let paper = state
            .orders
            .get_mut(uuid)
            .ok_or_else(|| ExchangeError::OrderNotFound(uuid.to_string()))?;
        let order = &mut paper.order;
        order.add_execution(Execution {
            uuid: Uuid::new_v4().to_string(),
            price,
            volume,
            funds,
            created_at: Utc::now(),
        });
        order.paid_fee = fee;
        order.state = match order_type {
            OrderType::Price => OrderState::Cancel,
            _ => OrderState::Done,
        };
        debug!(uuid, %price, %volume, "Paper order filled");
        Ok(order.clone())
    }
}

#[async_trait]
impl Exchange for PaperExchange {
    async fn get_account(&self) -> Result<Account, ExchangeError> {
        let mut balances: Vec<Balance> = self.state().balances.values().cloned().collect();
        balances.sort_by(|a, b| a.currency.cmp(&b.currency));
        Ok(Account::new(balances))
    }

    async fn get_candles(
        &self,
        symbol: &str,
        _unit: u32,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let state = self.state();
        let candles: Vec<&Candle> = state
            .candles
            .get(symbol)
            .map(|c| c.iter().filter(|c| to.map_or(true, |to| c.timestamp <= to)).collect())
            .unwrap_or_default();
        let skip = candles.len().saturating_sub(count);
        Ok(candles.into_iter().skip(skip).cloned().collect())
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
        let mut state = self.state();
        if state.identifiers.contains_key(&request.identifier) {
            return Err(ExchangeError::OrderRejected(format!(
                "duplicate identifier {}",
                request.identifier
            )));
        }

        let (quote, base) = (quote_currency(&request.symbol), base_currency(&request.symbol));
        let (currency, reserved) = match (request.order_type, request.side) {
            (OrderType::Price, Side::Buy) => {
                let funds = request
                    .price
                    .ok_or_else(|| ExchangeError::OrderRejected("market buy needs funds".into()))?;
                (quote, funds * (dec!(1) + self.fee_rate))
            }
            (OrderType::Market, Side::Sell) => {
                let volume = request
                    .volume
                    .ok_or_else(|| ExchangeError::OrderRejected("market sell needs volume".into()))?;
                (base, volume)
            }
            (OrderType::Limit, side) => {
                let (Some(price), Some(volume)) = (request.price, request.volume) else {
                    return Err(ExchangeError::OrderRejected(
                        "limit order needs price and volume".into(),
                    ));
                };
                match side {
                    Side::Buy => (quote, price * volume * (dec!(1) + self.fee_rate)),
                    Side::Sell => (base, volume),
                }
            }
            (order_type, side) => {
                return Err(ExchangeError::OrderRejected(format!(
                    "{order_type} orders cannot {side}"
                )))
            }
        };

        let available = state.available(currency);
        if reserved > available {
            return Err(ExchangeError::OrderRejected(format!(
                "insufficient {currency}: need {reserved}, have {available}"
            )));
        }
        let balance = state.balance_mut(currency);
        balance.balance -= reserved;
        balance.locked += reserved;

        let uuid = Uuid::new_v4().to_string();
        let order = Order {
            uuid: uuid.clone(),
            identifier: Some(request.identifier.clone()),
            symbol: request.symbol.clone(),
            side: request.side,
            order_type: request.order_type,
            state: OrderState::Wait,
            price: request.price,
            volume: request.volume,
            paid_fee: Decimal::ZERO,
            executed_volume: Decimal::ZERO,
            trades: Vec::new(),
            created_at: Utc::now(),
        };
        state.identifiers.insert(request.identifier.clone(), uuid.clone());
        state.orders.insert(
            uuid.clone(),
            PaperOrder {
                order: order.clone(),
                polls: 0,
                reserved,
            },
        );
        state.submissions += 1;

        let mut order = order;
        if self.fill_after_polls == 0 {
            if let Some(price) = state.prices.get(&request.symbol).copied() {
                order = self.fill(&mut state, &uuid, price)?;
            }
        }

        if state.dropped_responses > 0 {
            state.dropped_responses -= 1;
            return Err(ExchangeError::Network("connection reset before response".into()));
        }
        Ok(order)
    }

    async fn get_order(&self, uuid: &str) -> Result<Order, ExchangeError> {
        let mut state = self.state();
        let paper = state
            .orders
            .get_mut(uuid)
            .ok_or_else(|| ExchangeError::OrderNotFound(uuid.to_string()))?;
        if paper.order.state.is_terminal() {
            return Ok(paper.order.clone());
        }

        paper.polls = paper.polls.saturating_add(1);
        let due = paper.polls >= self.fill_after_polls;
        let symbol = paper.order.symbol.clone();
        match state.prices.get(&symbol).copied() {
            Some(price) if due => self.fill(&mut state, uuid, price),
            _ => state
                .orders
                .get(uuid)
                .map(|p| p.order.clone())
                .ok_or_else(|| ExchangeError::OrderNotFound(uuid.to_string())),
        }
    }

    async fn find_order(&self, identifier: &str) -> Result<Option<Order>, ExchangeError> {
        let state = self.state();
        Ok(state
            .identifiers
            .get(identifier)
            .and_then(|uuid| state.orders.get(uuid))
            .map(|p| p.order.clone()))
    }

    fn name(&self) -> &str {
        "paper"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn exchange() -> PaperExchange {
        let ex = PaperExchange::new("KRW", dec!(1000000)).with_fill_after_polls(2);
        ex.set_price("KRW-BTC", dec!(50000000));
        ex
    }

    #[tokio::test]
    async fn test_market_buy_fills_after_polls() {
        let ex = exchange();
        let order = ex
            .place_order(&OrderRequest::market_buy("KRW-BTC", dec!(100000), "id-1"))
            .await
            .unwrap();
        assert_eq!(order.state, OrderState::Wait);

        let account = ex.get_account().await.unwrap();
        assert_eq!(account.available("KRW"), dec!(899950));

        let polled = ex.get_order(&order.uuid).await.unwrap();
        assert_eq!(polled.state, OrderState::Wait);
        let filled = ex.get_order(&order.uuid).await.unwrap();
        assert_eq!(filled.state, OrderState::Cancel);
        assert!(filled.is_filled());

        let fill = filled.fill_summary().unwrap();
        assert_eq!(fill.quantity, dec!(0.002));
        assert_eq!(fill.fee, dec!(50));

        let account = ex.get_account().await.unwrap();
        assert_eq!(account.available("KRW"), dec!(899950));
        assert_eq!(account.available("BTC"), dec!(0.002));
        assert_eq!(account.get("BTC").unwrap().avg_buy_price, dec!(50000000));
    }

    #[tokio::test]
    async fn test_market_sell_credits_quote() {
        let ex = exchange().with_fill_after_polls(0);
        ex.deposit("BTC", dec!(0.01), dec!(40000000));

        let order = ex
            .place_order(&OrderRequest::market_sell("KRW-BTC", dec!(0.01), "id-2"))
            .await
            .unwrap();
        assert_eq!(order.state, OrderState::Done);

        let account = ex.get_account().await.unwrap();
        assert_eq!(account.available("BTC"), Decimal::ZERO);
        assert_eq!(account.available("KRW"), dec!(1000000) + dec!(500000) - dec!(250));
    }

    #[tokio::test]
    async fn test_slippage_and_fee_rate_apply_to_fills() {
        let ex = exchange()
            .with_fill_after_polls(0)
            .with_slippage(dec!(1))
            .with_fee_rate(dec!(0.001));
        ex.deposit("BTC", dec!(0.01), dec!(40000000));

        let order = ex
            .place_order(&OrderRequest::market_sell("KRW-BTC", dec!(0.01), "id-6"))
            .await
            .unwrap();

        let fill = order.fill_summary().unwrap();
        assert_eq!(fill.price, dec!(49500000));
        assert_eq!(fill.fee, dec!(495));
        let account = ex.get_account().await.unwrap();
        assert_eq!(account.available("KRW"), dec!(1000000) + dec!(495000) - dec!(495));
    }

    #[tokio::test]
    async fn test_lost_response_is_found_by_identifier() {
        let ex = exchange();
        ex.drop_next_responses(1);
        let request = OrderRequest::market_buy("KRW-BTC", dec!(100000), "id-3");

        let err = ex.place_order(&request).await.unwrap_err();
        assert!(err.is_transient());

        let found = ex.find_order("id-3").await.unwrap().unwrap();
        assert_eq!(found.identifier.as_deref(), Some("id-3"));
        assert!(ex.find_order("other").await.unwrap().is_none());

        // The exchange refuses to book the same identifier twice.
        assert!(matches!(
            ex.place_order(&request).await,
            Err(ExchangeError::OrderRejected(_))
        ));
        assert_eq!(ex.submissions(), 1);
    }

    #[tokio::test]
    async fn test_rejects_without_funds() {
        let ex = exchange();
        let err = ex
            .place_order(&OrderRequest::market_buy("KRW-BTC", dec!(2000000), "id-4"))
            .await
            .unwrap_err();
        assert!(matches!(err, ExchangeError::OrderRejected(_)));
        assert_eq!(ex.submissions(), 0);
    }

    #[tokio::test]
    async fn test_order_without_price_waits() {
        let ex = PaperExchange::new("KRW", dec!(1000000)).with_fill_after_polls(1);
        let order = ex
            .place_order(&OrderRequest::market_buy("KRW-ETH", dec!(10000), "id-5"))
            .await
            .unwrap();
        for _ in 0..3 {
            assert_eq!(ex.get_order(&order.uuid).await.unwrap().state, OrderState::Wait);
        }
        let filled = ex.execute_at_price(&order.uuid, dec!(5000000)).unwrap();
        assert!(filled.is_filled());
    }
}
