//! Trading process: turns a published decision into exactly one order.

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, info, warn};
use trading_core::error::ExecutionError;
use trading_core::{
    base_currency, quote_currency, CandleStore, Envelope, Event, Exchange, FillSummary, Order,
    OrderRequest, Side, Topic, Trade, TradeStore, TradingError,
};
use trading_risk::{OrderSizer, RiskLimits};
use trading_store::EventHandler;
use uuid::Uuid;

use crate::alert::Alerter;

/// Retry budgets of one execution.
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    pub submit_attempts: u32,
    pub poll_attempts: u32,
    pub poll_delay: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            submit_attempts: 2,
            poll_attempts: 3,
            poll_delay: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionReport {
    Filled {
        uuid: String,
        fill: FillSummary,
        /// `false` when the trade row had already been settled
        settled: bool,
    },
    /// An execution for the symbol was already in flight
    Duplicate,
}

pub struct OrderExecutionCoordinator {
    exchange: Arc<dyn Exchange>,
    trades: Arc<dyn TradeStore>,
    candles: Arc<dyn CandleStore>,
    alerter: Alerter,
    sizer: OrderSizer,
    config: ExecutionConfig,
    in_flight: Mutex<HashSet<String>>,
}

impl OrderExecutionCoordinator {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        trades: Arc<dyn TradeStore>,
        candles: Arc<dyn CandleStore>,
        alerter: Alerter,
        limits: &RiskLimits,
        config: ExecutionConfig,
    ) -> Self {
        Self {
            exchange,
            trades,
            candles,
            alerter,
            sizer: OrderSizer::new(limits),
            config: ExecutionConfig {
                submit_attempts: config.submit_attempts.max(1),
                poll_attempts: config.poll_attempts.max(1),
                ..config
            },
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Execute a decision and report the result on the manager topic.
    pub async fn on_decision(&self, side: Side, symbol: &str) {
        match self.execute(side, symbol).await {
            Ok(ExecutionReport::Filled { uuid, fill, .. }) => {
                self.alerter
                    .info(format!(
                        "{side} {symbol} filled {} at {} (fee {}, order {uuid})",
                        fill.quantity, fill.price, fill.fee
                    ))
                    .await;
            }
            Ok(ExecutionReport::Duplicate) => {}
            Err(err) => self.alerter.error(Some(symbol), &err).await,
        }
    }

    /// Size, submit, confirm and settle one order.
    ///
    /// A fill that cannot be confirmed leaves the provisional trade row in
    /// place for reconciliation.
    pub async fn execute(&self, side: Side, symbol: &str) -> Result<ExecutionReport, TradingError> {
        let Some(_guard) = InFlight::enter(self, symbol) else {
            info!(symbol, side = %side, "Execution already in flight, ignoring decision");
            return Ok(ExecutionReport::Duplicate);
        };

        let request = self.size(side, symbol).await?;
        info!(
            symbol,
            side = %side,
            identifier = %request.identifier,
            price = ?request.price,
            volume = ?request.volume,
            "Submitting order"
        );
        let order = self.submit(&request).await?;

        if !self.trades.insert_provisional(&Trade::provisional(&order)).await? {
            debug!(uuid = %order.uuid, "Provisional trade already recorded");
        }

        let filled = self.confirm(&order.uuid).await?;
        let fill = filled
            .fill_summary()
            .ok_or_else(|| ExecutionError::FillUnconfirmed {
                uuid: order.uuid.clone(),
                attempts: self.config.poll_attempts,
            })?;
        let settled = self.trades.settle(&order.uuid, side, &fill).await?;
        info!(
            symbol,
            uuid = %order.uuid,
            quantity = %fill.quantity,
            price = %fill.price,
            fee = %fill.fee,
            settled,
            "Order filled"
        );

        Ok(ExecutionReport::Filled {
            uuid: order.uuid,
            fill,
            settled,
        })
    }

    /// Build the order from a fresh balance read.
    async fn size(&self, side: Side, symbol: &str) -> Result<OrderRequest, TradingError> {
        let account = self.exchange.get_account().await?;
        let identifier = Uuid::new_v4().to_string();
        match side {
            Side::Buy => {
                let quote = account.available(quote_currency(symbol));
                let funds = self.sizer.buy_funds(symbol, quote)?;
                Ok(OrderRequest::market_buy(symbol, funds, identifier))
            }
            Side::Sell => {
                let base = account.available(base_currency(symbol));
                let avg_buy_price = account
                    .get(base_currency(symbol))
                    .map(|b| b.avg_buy_price)
                    .unwrap_or_default();
                let price = self
                    .candles
                    .recent_candles(symbol, 1)
                    .await?
                    .last()
                    .and_then(|c| Decimal::from_f64(c.close))
                    .filter(|p| *p > Decimal::ZERO)
                    .unwrap_or(avg_buy_price);
                let volume = self.sizer.sell_volume(symbol, base, price)?;
                Ok(OrderRequest::market_sell(symbol, volume, identifier))
            }
        }
    }

    /// Submit with bounded retries.
    ///
    /// After a transient failure the order may still have reached the
    /// exchange, so it is looked up by identifier before resubmitting.
    async fn submit(&self, request: &OrderRequest) -> Result<Order, TradingError> {
        let attempts = self.config.submit_attempts;
        let mut last_error = String::new();
        for attempt in 1..=attempts {
            match self.exchange.place_order(request).await {
                Ok(order) => return Ok(order),
                Err(e) if e.is_transient() => {
                    warn!(
                        identifier = %request.identifier,
                        attempt,
                        error = %e,
                        "Order submission failed"
                    );
                    last_error = e.to_string();
                }
                Err(e) => return Err(e.into()),
            }

            match self.exchange.find_order(&request.identifier).await {
                Ok(Some(order)) => {
                    info!(identifier = %request.identifier, uuid = %order.uuid, "Recovered submitted order");
                    return Ok(order);
                }
                Ok(None) => {}
                Err(e) => warn!(identifier = %request.identifier, error = %e, "Order lookup failed"),
            }

            if attempt < attempts {
                tokio::time::sleep(self.config.poll_delay).await;
            }
        }
        Err(ExecutionError::SubmissionFailed {
            attempts,
            reason: last_error,
        }
        .into())
    }

    /// Poll until the order is terminal with at least one execution.
    async fn confirm(&self, uuid: &str) -> Result<Order, TradingError> {
        let attempts = self.config.poll_attempts;
        for attempt in 1..=attempts {
            match self.exchange.get_order(uuid).await {
                Ok(order) if order.is_filled() => return Ok(order),
                Ok(order) => debug!(uuid, attempt, state = ?order.state, "Order not filled yet"),
                Err(e) if e.is_transient() => warn!(uuid, attempt, error = %e, "Order poll failed"),
                Err(e) => return Err(e.into()),
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.poll_delay).await;
            }
        }
        Err(ExecutionError::FillUnconfirmed {
            uuid: uuid.to_string(),
            attempts,
        }
        .into())
    }

    fn in_flight(&self) -> MutexGuard<'_, HashSet<String>> {
        self.in_flight.lock().unwrap_or_else(|p| p.into_inner())
    }
}

struct InFlight<'a> {
    coordinator: &'a OrderExecutionCoordinator,
    symbol: String,
}

impl<'a> InFlight<'a> {
    fn enter(coordinator: &'a OrderExecutionCoordinator, symbol: &str) -> Option<Self> {
        coordinator
            .in_flight()
            .insert(symbol.to_string())
            .then(|| Self {
                coordinator,
                symbol: symbol.to_string(),
            })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.coordinator.in_flight().remove(&self.symbol);
    }
}

/// Executes every trade decision published by analysis.
pub struct TradingHandler {
    coordinator: Arc<OrderExecutionCoordinator>,
}

impl TradingHandler {
    pub fn new(coordinator: Arc<OrderExecutionCoordinator>) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl EventHandler for TradingHandler {
    fn topics(&self) -> Vec<Topic> {
        vec![Topic::Trading]
    }

    async fn handle(&mut self, envelope: Envelope) {
        match envelope.event() {
            Ok(Event::TradeDecision { side, symbol }) => {
                let coordinator = self.coordinator.clone();
                tokio::spawn(async move { coordinator.on_decision(side, &symbol).await });
            }
            Ok(other) => warn!(?other, "Unexpected event on trading topic"),
            Err(e) => warn!(payload = %envelope.payload, error = %e, "Malformed notification"),
        }
    }
}
