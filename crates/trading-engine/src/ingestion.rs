//! Candle ingestion: the periodic source of analysis work.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};
use trading_core::{CandleStore, Event, Exchange, TradingError};
use trading_store::EventBus;

use crate::alert::Alerter;

const PROCESS: &str = "ingestion";

/// Fetches recent candles for every symbol, stores them and wakes analysis.
pub struct CandleIngestor {
    exchange: Arc<dyn Exchange>,
    candles: Arc<dyn CandleStore>,
    bus: Arc<dyn EventBus>,
    alerter: Alerter,
    symbols: Vec<String>,
    unit: u32,
    count: usize,
}

impl CandleIngestor {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        candles: Arc<dyn CandleStore>,
        bus: Arc<dyn EventBus>,
        symbols: Vec<String>,
        unit: u32,
        count: usize,
    ) -> Self {
        Self {
            exchange,
            candles,
            alerter: Alerter::new(PROCESS, bus.clone()),
            bus,
            symbols,
            unit,
            count,
        }
    }

    /// Ingest every symbol once and announce the ones that were saved.
    ///
    /// A failing symbol is reported and skipped; the others still go through.
    pub async fn tick(&self) -> Vec<String> {
        let mut saved = Vec::with_capacity(self.symbols.len());
        for symbol in &self.symbols {
            match self.ingest(symbol).await {
                Ok(0) => warn!(symbol = %symbol, "Exchange returned no candles"),
                Ok(n) => {
                    debug!(symbol = %symbol, candles = n, "Candles saved");
                    saved.push(symbol.clone());
                }
                Err(e) => self.alerter.error(Some(symbol), &e).await,
            }
        }

        if saved.is_empty() {
            return saved;
        }
        match self.bus.emit(&Event::candle_saved(saved.clone())).await {
            Ok(()) => info!(symbols = ?saved, "Analysis notified"),
            Err(e) => error!(error = %e, "Failed to notify analysis"),
        }
        saved
    }

    async fn ingest(&self, symbol: &str) -> Result<usize, TradingError> {
        let candles = self
            .exchange
            .get_candles(symbol, self.unit, self.count, None)
            .await?;
        Ok(self.candles.save_candles(&candles).await?)
    }

    /// Tick on every multiple of `period` since the epoch, forever.
    pub async fn run(&self, period: Duration) {
        let first = Instant::now() + until_next_boundary(Utc::now(), period);
        let mut interval = tokio::time::interval_at(first, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!(
            symbols = ?self.symbols,
            period_secs = period.as_secs(),
            "Ingestion scheduled"
        );
        loop {
            interval.tick().await;
            self.tick().await;
        }
    }
}

/// Time from `now` to the next multiple of `period`; zero on a boundary.
pub fn until_next_boundary(now: DateTime<Utc>, period: Duration) -> Duration {
    let period_ms = period.as_millis().max(1) as i64;
    let into = now.timestamp_millis().rem_euclid(period_ms);
    Duration::from_millis(((period_ms - into) % period_ms) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;
    use trading_core::error::ExchangeError;
    use trading_core::{Account, Candle, Order, OrderRequest, Topic};
    use trading_exchange::PaperExchange;
    use trading_store::MemoryStore;

    /// Paper exchange whose candle endpoint fails for one symbol.
    struct Partial {
        inner: PaperExchange,
        broken: &'static str,
    }

    #[async_trait]
    impl Exchange for Partial {
        async fn get_account(&self) -> Result<Account, ExchangeError> {
            self.inner.get_account().await
        }

        async fn get_candles(
            &self,
            symbol: &str,
            unit: u32,
            count: usize,
            to: Option<DateTime<Utc>>,
        ) -> Result<Vec<Candle>, ExchangeError> {
            if symbol == self.broken {
                return Err(ExchangeError::Network("timed out".into()));
            }
            self.inner.get_candles(symbol, unit, count, to).await
        }

        async fn place_order(&self, request: &OrderRequest) -> Result<Order, ExchangeError> {
            self.inner.place_order(request).await
        }

        async fn get_order(&self, uuid: &str) -> Result<Order, ExchangeError> {
            self.inner.get_order(uuid).await
        }

        async fn find_order(&self, identifier: &str) -> Result<Option<Order>, ExchangeError> {
            self.inner.find_order(identifier).await
        }

        fn name(&self) -> &str {
            "partial"
        }
    }

    fn candles(symbol: &str, n: i64) -> Vec<Candle> {
        let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        (0..n)
            .map(|i| {
                let close = 100.0 + i as f64;
                Candle::new(symbol, start + chrono::Duration::hours(i), close, close, close, close, 1.0)
            })
            .collect()
    }

    #[tokio::test]
    async fn test_tick_saves_and_announces() {
        let store = MemoryStore::new();
        let exchange = PaperExchange::new("KRW", dec!(0));
        exchange.push_candles(&candles("KRW-BTC", 5));
        exchange.push_candles(&candles("KRW-ETH", 5));
        let ingestor = CandleIngestor::new(
            Arc::new(exchange),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            vec!["KRW-BTC".into(), "KRW-ETH".into()],
            60,
            3,
        );

        let saved = ingestor.tick().await;

        assert_eq!(saved, vec!["KRW-BTC", "KRW-ETH"]);
        let stored = store.recent_candles("KRW-BTC", 10).await.unwrap();
        assert_eq!(stored.len(), 3);
        assert_eq!(stored[2].close, 104.0);
        assert_eq!(
            store.published_on(Topic::Analysis),
            vec!["CANDLE_SAVED:KRW-BTC,KRW-ETH"]
        );
    }

    #[tokio::test]
    async fn test_failing_symbol_is_reported_and_skipped() {
        let store = MemoryStore::new();
        let inner = PaperExchange::new("KRW", dec!(0));
        inner.push_candles(&candles("KRW-BTC", 2));
        let ingestor = CandleIngestor::new(
            Arc::new(Partial {
                inner,
                broken: "KRW-XRP",
            }),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            vec!["KRW-XRP".into(), "KRW-BTC".into(), "KRW-ETH".into()],
            60,
            200,
        );

        assert_eq!(ingestor.tick().await, vec!["KRW-BTC"]);
        assert_eq!(store.published_on(Topic::Analysis), vec!["CANDLE_SAVED:KRW-BTC"]);
        let alerts = store.published_on(Topic::Manager);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("SEND:[exchange.network] ingestion KRW-XRP"));
    }

    #[test]
    fn test_until_next_boundary() {
        let hour = Duration::from_secs(3600);
        let at = |h, m, s| Utc.with_ymd_and_hms(2024, 3, 1, h, m, s).unwrap();

        assert_eq!(until_next_boundary(at(10, 59, 30), hour), Duration::from_secs(30));
        assert_eq!(until_next_boundary(at(10, 0, 0), hour), Duration::ZERO);
        assert_eq!(
            until_next_boundary(at(10, 20, 0), Duration::from_secs(900)),
            Duration::from_secs(600)
        );
    }
}
