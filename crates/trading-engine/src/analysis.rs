//! Analysis process: one decision cycle per symbol and ingestion tick.
//!
//! A cycle takes the symbol's advisory lock, classifies the account posture
//! and runs the matching ensemble. HOLD releases the lock. BUY or SELL is
//! published to the trading process and the lock stays held until a later
//! cycle sees the posture flip, so no second order can be decided while the
//! first is still in flight.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use tracing::{debug, info, warn};
use trading_core::error::ExecutionError;
use trading_core::{
    CandleStore, Decision, Envelope, Event, Exchange, Posture, Side, SignalStore, Topic,
    TradingError,
};
use trading_risk::{classify_posture, ExitGate, RiskLimits};
use trading_store::{AdvisoryLock, EventBus, EventHandler, LockKey};
use trading_strategies::StrategyEnsemble;

use crate::alert::Alerter;

const PROCESS: &str = "analysis";

/// Per-symbol cycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CycleState {
    #[default]
    Idle,
    LockPending,
    Running,
    Decided(Decision),
}

/// How a cycle ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A cycle for the symbol was already in progress
    AlreadyRunning,
    /// No store session is open
    NoSession,
    /// Another session holds the symbol's lock
    LockBusy,
    /// The previous decision has not reached the balances yet, or the cycle
    /// failed while it was outstanding; the lock stays held
    AwaitingFill,
    Decided(Decision),
    /// The error was reported and the lock released
    Failed,
}

#[derive(Debug, Clone, Copy)]
struct AwaitingFill {
    side: Side,
    skipped: u32,
}

#[derive(Debug, Default)]
struct Slot {
    state: CycleState,
    awaiting: Option<AwaitingFill>,
}

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub limits: RiskLimits,
    /// Ticks to wait for a published decision to show up in the balances
    pub max_pending_cycles: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            limits: RiskLimits::default(),
            max_pending_cycles: 3,
        }
    }
}

/// Decision pipeline shared by every symbol of the analysis process.
pub struct SignalPipeline {
    exchange: Arc<dyn Exchange>,
    candles: Arc<dyn CandleStore>,
    signals: Arc<dyn SignalStore>,
    bus: Arc<dyn EventBus>,
    alerter: Alerter,
    buy: StrategyEnsemble,
    sell: StrategyEnsemble,
    limits: RiskLimits,
    exit_gate: ExitGate,
    max_pending_cycles: u32,
    lock: RwLock<Option<Arc<dyn AdvisoryLock>>>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl SignalPipeline {
    pub fn new(
        exchange: Arc<dyn Exchange>,
        candles: Arc<dyn CandleStore>,
        signals: Arc<dyn SignalStore>,
        bus: Arc<dyn EventBus>,
        buy: StrategyEnsemble,
        sell: StrategyEnsemble,
        config: PipelineConfig,
    ) -> Self {
        let exit_gate = ExitGate::new(config.limits.take_profit, config.limits.stop_loss);
        Self {
            exchange,
            candles,
            signals,
            alerter: Alerter::new(PROCESS, bus.clone()),
            bus,
            buy,
            sell,
            limits: config.limits,
            exit_gate,
            max_pending_cycles: config.max_pending_cycles.max(1),
            lock: RwLock::new(None),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Adopt the lock handle of a new session.
    ///
    /// Locks of the previous session died with it, so pending fills are
    /// forgotten as well.
    pub fn reset_session(&self, lock: Arc<dyn AdvisoryLock>) {
        *self.lock.write().unwrap_or_else(|p| p.into_inner()) = Some(lock);
        for slot in self.slots().values_mut() {
            slot.awaiting = None;
        }
    }

    pub fn state(&self, symbol: &str) -> CycleState {
        self.slots()
            .get(symbol)
            .map(|slot| slot.state)
            .unwrap_or_default()
    }

    /// Side of the published decision this symbol is waiting on.
    pub fn awaiting(&self, symbol: &str) -> Option<Side> {
        self.slots()
            .get(symbol)
            .and_then(|slot| slot.awaiting)
            .map(|a| a.side)
    }

    /// Run one cycle. Errors are reported on the manager topic, never returned.
    pub async fn run_cycle(&self, symbol: &str) -> CycleOutcome {
        let Some(guard) = CycleGuard::enter(self, symbol) else {
            debug!(symbol, "Cycle already running, ignoring tick");
            return CycleOutcome::AlreadyRunning;
        };
        let Some(lock) = self.current_lock() else {
            warn!(symbol, "No store session, skipping tick");
            return CycleOutcome::NoSession;
        };
        let key = LockKey::for_symbol(symbol);

        let err = match self.cycle(&guard, lock.as_ref(), &key).await {
            Ok(outcome) => return outcome,
            Err(err) => err,
        };
        self.alerter.error(Some(symbol), &err).await;

        // A decision in flight keeps the lock: the failure only counts against the wait.
        let awaiting = self.slot(symbol, |slot| slot.awaiting.take());
        if let Some(awaiting) = awaiting.filter(|_| !is_unresolved(&err)) {
            let skipped = awaiting.skipped + 1;
            if skipped < self.max_pending_cycles {
                self.slot(symbol, |slot| {
                    slot.awaiting = Some(AwaitingFill { skipped, ..awaiting })
                });
                warn!(
                    symbol,
                    side = %awaiting.side,
                    skipped,
                    "Cycle failed with an order in flight, keeping lock"
                );
                return CycleOutcome::AwaitingFill;
            }
            let abandoned = unresolved(awaiting.side, symbol, skipped);
            self.alerter.error(Some(symbol), &abandoned).await;
        }

        if let Err(e) = lock.release(&key).await {
            warn!(symbol, error = %e, "Failed to release lock after error");
        }
        CycleOutcome::Failed
    }

    async fn cycle(
        &self,
        guard: &CycleGuard<'_>,
        lock: &dyn AdvisoryLock,
        key: &LockKey,
    ) -> Result<CycleOutcome, TradingError> {
        let symbol = guard.symbol.as_str();
        if !lock.try_acquire(key).await? {
            debug!(symbol, lock = %key, "Lock held elsewhere, dropping tick");
            return Ok(CycleOutcome::LockBusy);
        }
        guard.set(CycleState::Running);

        let account = self.exchange.get_account().await?;
        let last_close = self
            .candles
            .recent_candles(symbol, 1)
            .await?
            .last()
            .map(|c| c.close);
        let posture = classify_posture(&account, symbol, last_close, &self.limits);

        if let Some(awaiting) = self.slot(symbol, |slot| slot.awaiting) {
            let flipped = match (&posture, awaiting.side) {
                (Ok(s), Side::Buy) => s.posture == Posture::Holding,
                (Ok(s), Side::Sell) => s.posture == Posture::Flat,
                (Err(_), _) => false,
            };
            if !flipped {
                let skipped = awaiting.skipped + 1;
                if skipped >= self.max_pending_cycles {
                    return Err(unresolved(awaiting.side, symbol, skipped));
                }
                self.slot(symbol, |slot| {
                    slot.awaiting = Some(AwaitingFill { skipped, ..awaiting })
                });
                info!(symbol, side = %awaiting.side, skipped, "Waiting for previous order");
                return Ok(CycleOutcome::AwaitingFill);
            }
            debug!(symbol, side = %awaiting.side, "Previous order reflected in balances");
            self.slot(symbol, |slot| slot.awaiting = None);
        }

        let snapshot = posture?;
        let decision = match snapshot.posture {
            Posture::Holding => {
                match self.exit_gate.check(snapshot.avg_buy_price, snapshot.price) {
                    Some(reason) => {
                        info!(symbol, reason = %reason, "Exit gate triggered");
                        Decision::Sell
                    }
                    None => self.evaluate(&self.sell, symbol).await?,
                }
            }
            Posture::Flat => self.evaluate(&self.buy, symbol).await?,
        };
        guard.set(CycleState::Decided(decision));

        match decision.side() {
            None => {
                lock.release(key).await?;
                debug!(symbol, "HOLD, lock released");
            }
            Some(side) => {
                self.bus.emit(&Event::trade(side, symbol)).await?;
                self.slot(symbol, |slot| {
                    slot.awaiting = Some(AwaitingFill { side, skipped: 0 })
                });
                info!(symbol, side = %side, "Decision published, holding lock");
            }
        }
        Ok(CycleOutcome::Decided(decision))
    }

    async fn evaluate(
        &self,
        ensemble: &StrategyEnsemble,
        symbol: &str,
    ) -> Result<Decision, TradingError> {
        let run = self.signals.create_run(symbol, Utc::now()).await?;
        let outcome = ensemble
            .execute(&run, self.candles.as_ref(), self.signals.as_ref())
            .await;
        Ok(outcome.decision)
    }

    fn current_lock(&self) -> Option<Arc<dyn AdvisoryLock>> {
        self.lock.read().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<String, Slot>> {
        self.slots.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn slot<T>(&self, symbol: &str, f: impl FnOnce(&mut Slot) -> T) -> T {
        f(self.slots().entry(symbol.to_string()).or_default())
    }
}

fn unresolved(side: Side, symbol: &str, cycles: u32) -> TradingError {
    ExecutionError::DecisionUnresolved {
        side: side.to_string(),
        symbol: symbol.to_string(),
        cycles,
    }
    .into()
}

fn is_unresolved(err: &TradingError) -> bool {
    matches!(
        err,
        TradingError::Execution(ExecutionError::DecisionUnresolved { .. })
    )
}

/// Marks a symbol busy for the lifetime of one cycle.
struct CycleGuard<'a> {
    pipeline: &'a SignalPipeline,
    symbol: String,
}

impl<'a> CycleGuard<'a> {
    fn enter(pipeline: &'a SignalPipeline, symbol: &str) -> Option<Self> {
        let entered = pipeline.slot(symbol, |slot| {
            if slot.state != CycleState::Idle {
                return false;
            }
            slot.state = CycleState::LockPending;
            true
        });
        entered.then(|| Self {
            pipeline,
            symbol: symbol.to_string(),
        })
    }

    fn set(&self, state: CycleState) {
        self.pipeline.slot(&self.symbol, |slot| slot.state = state);
    }
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.set(CycleState::Idle);
    }
}

/// Runs the pipeline for every symbol named by an ingestion notification.
pub struct AnalysisHandler {
    pipeline: Arc<SignalPipeline>,
    symbols: Vec<String>,
}

impl AnalysisHandler {
    pub fn new(pipeline: Arc<SignalPipeline>, symbols: Vec<String>) -> Self {
        Self { pipeline, symbols }
    }

    /// Configured symbols named by the notification, all of them when it names none.
    fn targets(&self, requested: &[String]) -> Vec<String> {
        if requested.is_empty() {
            return self.symbols.clone();
        }
        let known: HashSet<&str> = self.symbols.iter().map(String::as_str).collect();
        let mut targets = Vec::with_capacity(requested.len());
        for symbol in requested {
            if known.contains(symbol.as_str()) {
                if !targets.contains(symbol) {
                    targets.push(symbol.clone());
                }
            } else {
                warn!(symbol = %symbol, "Ignoring unconfigured symbol");
            }
        }
        targets
    }
}

#[async_trait]
impl EventHandler for AnalysisHandler {
    fn topics(&self) -> Vec<Topic> {
        vec![Topic::Analysis]
    }

    async fn on_session(&mut self, lock: Arc<dyn AdvisoryLock>) {
        self.pipeline.reset_session(lock);
    }

    async fn handle(&mut self, envelope: Envelope) {
        match envelope.event() {
            Ok(Event::CandleSaved { symbols }) => {
                for symbol in self.targets(&symbols) {
                    let pipeline = self.pipeline.clone();
                    tokio::spawn(async move {
                        let outcome = pipeline.run_cycle(&symbol).await;
                        debug!(symbol = %symbol, ?outcome, "Cycle finished");
                    });
                }
            }
            Ok(other) => warn!(?other, "Unexpected event on analysis topic"),
            Err(e) => warn!(payload = %envelope.payload, error = %e, "Malformed notification"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;
    use trading_core::error::{ExchangeError, StrategyError};
    use trading_core::{Account, Candle, IndicatorValues, Order, OrderRequest, Strategy, StrategyKind};
    use trading_exchange::PaperExchange;
    use trading_store::MemoryStore;
    use trading_strategies::VotePolicy;

    struct Fixed(f64);

    struct Score(f64);

    impl From<Score> for IndicatorValues {
        fn from(score: Score) -> Self {
            IndicatorValues::Stochastic {
                k: score.0,
                d: score.0,
            }
        }
    }

    impl Strategy for Fixed {
        type Data = Score;

        fn kind(&self) -> StrategyKind {
            StrategyKind::Stochastic
        }

        fn lookback(&self) -> usize {
            1
        }

        fn fetch_data(&self, candles: &[Candle]) -> Result<Score, StrategyError> {
            self.ensure_history(candles)?;
            Ok(Score(self.0))
        }

        fn score(&self, data: &Score) -> f64 {
            data.0
        }
    }

    fn ensemble(side: Side, score: f64) -> StrategyEnsemble {
        StrategyEnsemble::new(side, VotePolicy::Unanimous, 0.3, -0.3)
            .with_strategy(Box::new(Fixed(score)), 1.0)
    }

    struct Fixture {
        store: MemoryStore,
        exchange: PaperExchange,
        pipeline: SignalPipeline,
    }

    async fn fixture(buy_score: f64, sell_score: f64) -> Fixture {
        let store = MemoryStore::new();
        let exchange = PaperExchange::new("KRW", dec!(1000000));
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let candles: Vec<Candle> = (0..3)
            .map(|i| {
                Candle::new("KRW-BTC", start + Duration::hours(i), 1e8, 1e8, 1e8, 1e8, 1.0)
            })
            .collect();
        store.save_candles(&candles).await.unwrap();

        let pipeline = SignalPipeline::new(
            Arc::new(exchange.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            ensemble(Side::Buy, buy_score),
            ensemble(Side::Sell, sell_score),
            PipelineConfig::default(),
        );
        let (_, session) = store.open_session().unwrap();
        pipeline.reset_session(session.lock);
        Fixture {
            store,
            exchange,
            pipeline,
        }
    }

    fn key() -> LockKey {
        LockKey::for_symbol("KRW-BTC")
    }

    #[tokio::test]
    async fn test_hold_releases_lock() {
        let f = fixture(0.0, 0.0).await;

        let outcome = f.pipeline.run_cycle("KRW-BTC").await;

        assert_eq!(outcome, CycleOutcome::Decided(Decision::Hold));
        assert!(f.store.lock_holder(&key()).is_none());
        assert!(f.store.published_on(Topic::Trading).is_empty());
        assert_eq!(f.pipeline.state("KRW-BTC"), CycleState::Idle);
        assert_eq!(f.store.runs().len(), 1);
    }

    #[tokio::test]
    async fn test_buy_keeps_lock_and_waits_for_fill() {
        let f = fixture(0.9, 0.0).await;

        assert_eq!(
            f.pipeline.run_cycle("KRW-BTC").await,
            CycleOutcome::Decided(Decision::Buy)
        );
        assert!(f.store.lock_holder(&key()).is_some());
        assert_eq!(f.store.published_on(Topic::Trading), vec!["BUY:KRW-BTC"]);
        assert_eq!(f.pipeline.awaiting("KRW-BTC"), Some(Side::Buy));

        // Balances unchanged: the next tick must not decide again.
        assert_eq!(
            f.pipeline.run_cycle("KRW-BTC").await,
            CycleOutcome::AwaitingFill
        );
        assert_eq!(f.store.published_on(Topic::Trading).len(), 1);
    }

    #[tokio::test]
    async fn test_unresolved_decision_is_abandoned() {
        let f = fixture(0.9, 0.0).await;
        f.pipeline.run_cycle("KRW-BTC").await;

        assert_eq!(f.pipeline.run_cycle("KRW-BTC").await, CycleOutcome::AwaitingFill);
        assert_eq!(f.pipeline.run_cycle("KRW-BTC").await, CycleOutcome::AwaitingFill);
        assert_eq!(f.pipeline.run_cycle("KRW-BTC").await, CycleOutcome::Failed);

        assert!(f.store.lock_holder(&key()).is_none());
        assert_eq!(f.pipeline.awaiting("KRW-BTC"), None);
        let alerts = f.store.published_on(Topic::Manager);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("SEND:[execution.decision_unresolved] analysis KRW-BTC"));
    }

    /// Paper exchange whose account endpoint fails once when armed.
    #[derive(Clone)]
    struct Flaky {
        inner: PaperExchange,
        fail_next: Arc<Mutex<bool>>,
    }

    impl Flaky {
        fn new(inner: PaperExchange) -> Self {
            Self {
                inner,
                fail_next: Arc::new(Mutex::new(false)),
            }
        }

        fn fail_once(&self) {
            *self.fail_next.lock().unwrap() = true;
        }
    }

    #[async_trait]
    impl Exchange for Flaky {
        async fn get_account(&self) -> Result<Account, ExchangeError> {
            if std::mem::take(&mut *self.fail_next.lock().unwrap()) {
                return Err(ExchangeError::Network("timed out".into()));
            }
            self.inner.get_account().await
        }

        async fn get_candles(
            &self,
            symbol: &str,
            unit: u32,
            count: usize,
            to: Option<chrono::DateTime<Utc>>,
        ) -> Result<Vec<Candle>, ExchangeError> {
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
            "flaky"
        }
    }

    #[tokio::test]
    async fn test_error_while_awaiting_fill_keeps_lock() {
        let f = fixture(0.9, 0.0).await;
        let exchange = Flaky::new(f.exchange.clone());
        let pipeline = SignalPipeline::new(
            Arc::new(exchange.clone()),
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            ensemble(Side::Buy, 0.9),
            ensemble(Side::Sell, 0.0),
            PipelineConfig::default(),
        );
        let (_, session) = f.store.open_session().unwrap();
        pipeline.reset_session(session.lock);

        assert_eq!(
            pipeline.run_cycle("KRW-BTC").await,
            CycleOutcome::Decided(Decision::Buy)
        );

        exchange.fail_once();
        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::AwaitingFill);
        assert!(f.store.lock_holder(&key()).is_some());
        assert_eq!(pipeline.awaiting("KRW-BTC"), Some(Side::Buy));
        let alerts = f.store.published_on(Topic::Manager);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].starts_with("SEND:[exchange.network] analysis KRW-BTC"));

        // Balances still unchanged: no second BUY, and the failed tick counts
        // toward abandoning the wait.
        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::AwaitingFill);
        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::Failed);
        assert_eq!(f.store.published_on(Topic::Trading), vec!["BUY:KRW-BTC"]);
        assert!(f.store.lock_holder(&key()).is_none());
        let alerts = f.store.published_on(Topic::Manager);
        assert_eq!(alerts.len(), 2);
        assert!(alerts[1].starts_with("SEND:[execution.decision_unresolved] analysis KRW-BTC"));
    }

    #[tokio::test]
    async fn test_repeated_errors_abandon_the_wait() {
        let f = fixture(0.9, 0.0).await;
        let exchange = Flaky::new(f.exchange.clone());
        let pipeline = SignalPipeline::new(
            Arc::new(exchange.clone()),
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            ensemble(Side::Buy, 0.9),
            ensemble(Side::Sell, 0.0),
            PipelineConfig {
                max_pending_cycles: 2,
                ..PipelineConfig::default()
            },
        );
        let (_, session) = f.store.open_session().unwrap();
        pipeline.reset_session(session.lock);
        pipeline.run_cycle("KRW-BTC").await;

        exchange.fail_once();
        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::AwaitingFill);
        exchange.fail_once();
        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::Failed);

        assert_eq!(pipeline.awaiting("KRW-BTC"), None);
        assert!(f.store.lock_holder(&key()).is_none());
        let alerts = f.store.published_on(Topic::Manager);
        assert_eq!(alerts.len(), 3);
        assert!(alerts[2].starts_with("SEND:[execution.decision_unresolved] analysis KRW-BTC"));
    }

    #[tokio::test]
    async fn test_filled_buy_moves_to_sell_path() {
        let f = fixture(0.9, 0.0).await;
        f.pipeline.run_cycle("KRW-BTC").await;

        f.exchange.deposit("BTC", dec!(0.01), dec!(100000000));
        let outcome = f.pipeline.run_cycle("KRW-BTC").await;

        // Sell ensemble scores neutral: HOLD releases the lock.
        assert_eq!(outcome, CycleOutcome::Decided(Decision::Hold));
        assert_eq!(f.pipeline.awaiting("KRW-BTC"), None);
        assert!(f.store.lock_holder(&key()).is_none());
    }

    #[tokio::test]
    async fn test_exit_gate_sells_without_strategies() {
        let f = fixture(0.0, 0.0).await;
        // Bought at 90M, last close 100M: above the 5% take-profit.
        f.exchange.deposit("BTC", dec!(0.01), dec!(90000000));

        let outcome = f.pipeline.run_cycle("KRW-BTC").await;

        assert_eq!(outcome, CycleOutcome::Decided(Decision::Sell));
        assert_eq!(f.store.published_on(Topic::Trading), vec!["SELL:KRW-BTC"]);
        assert!(f.store.runs().is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_posture_is_reported() {
        let f = fixture(0.9, 0.0).await;
        let poor = PaperExchange::new("KRW", dec!(5000));
        let pipeline = SignalPipeline::new(
            Arc::new(poor),
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            Arc::new(f.store.clone()),
            ensemble(Side::Buy, 0.9),
            ensemble(Side::Sell, 0.0),
            PipelineConfig::default(),
        );
        let (_, session) = f.store.open_session().unwrap();
        pipeline.reset_session(session.lock);

        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::Failed);
        let alerts = f.store.published_on(Topic::Manager);
        assert!(alerts[0].starts_with("SEND:[posture.ambiguous] analysis KRW-BTC"));
        assert!(f.store.lock_holder(&key()).is_none());
    }

    #[tokio::test]
    async fn test_lock_held_by_other_session_drops_tick() {
        let f = fixture(0.9, 0.0).await;
        let (_, other) = f.store.open_session().unwrap();
        assert!(other.lock.try_acquire(&key()).await.unwrap());

        assert_eq!(f.pipeline.run_cycle("KRW-BTC").await, CycleOutcome::LockBusy);
        assert!(f.store.published_on(Topic::Trading).is_empty());
        assert!(f.store.runs().is_empty());
    }

    #[tokio::test]
    async fn test_no_session_skips() {
        let store = MemoryStore::new();
        let pipeline = SignalPipeline::new(
            Arc::new(PaperExchange::new("KRW", dec!(1000000))),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            ensemble(Side::Buy, 0.9),
            ensemble(Side::Sell, 0.0),
            PipelineConfig::default(),
        );
        assert_eq!(pipeline.run_cycle("KRW-BTC").await, CycleOutcome::NoSession);
    }

    #[tokio::test]
    async fn test_handler_targets_configured_symbols() {
        let f = fixture(0.0, 0.0).await;
        let handler = AnalysisHandler::new(
            Arc::new(f.pipeline),
            vec!["KRW-BTC".into(), "KRW-ETH".into()],
        );

        assert_eq!(handler.targets(&[]), vec!["KRW-BTC", "KRW-ETH"]);
        assert_eq!(
            handler.targets(&["KRW-ETH".into(), "KRW-DOGE".into(), "KRW-ETH".into()]),
            vec!["KRW-ETH"]
        );
    }
}
