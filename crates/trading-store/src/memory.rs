//! In-process store used by tests and dry runs.
//!
//! Mirrors the Postgres semantics that matter to the processes: topic
//! filtering on the bus, session-scoped advisory locks that vanish with their
//! session, and trade rows that settle exactly once. Failures are injected
//! with [`MemoryStore::set_available`], [`MemoryStore::fail_next_connects`]
//! and [`MemoryStore::kill_session`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::{broadcast, watch};
use tracing::warn;
use trading_core::error::StoreError;
use trading_core::{
    truncate_to_hour, Candle, CandleStore, Envelope, FillSummary, Side, SignalRun, SignalStore,
    StrategyResult, Topic, Trade, TradeStore,
};

use crate::bus::{EventBus, Subscription};
use crate::lock::{AdvisoryLock, LockKey};
use crate::session::{Connector, Session};

const BUS_CAPACITY: usize = 256;

pub type SessionId = u64;

struct State {
    available: bool,
    failing_connects: u32,
    connect_attempts: u32,
    next_session: SessionId,
    sessions: HashMap<SessionId, watch::Sender<bool>>,
    locks: HashMap<i64, SessionId>,
    published: Vec<Envelope>,
    candles: BTreeMap<(String, DateTime<Utc>), Candle>,
    runs: Vec<SignalRun>,
    results: Vec<StrategyResult>,
    trades: Vec<Trade>,
}

impl State {
    fn end_session(&mut self, id: SessionId) {
        if let Some(killed) = self.sessions.remove(&id) {
            killed.send_replace(true);
        }
        self.locks.retain(|_, holder| *holder != id);
    }
}

struct Shared {
    state: Mutex<State>,
    bus: broadcast::Sender<Envelope>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not wedge the others.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Shared in-memory store. Clones share state.
#[derive(Clone)]
pub struct MemoryStore {
    shared: Arc<Shared>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        let (bus, _) = broadcast::channel(BUS_CAPACITY);
        let state = State {
            available: true,
            failing_connects: 0,
            connect_attempts: 0,
            next_session: 1,
            sessions: HashMap::new(),
            locks: HashMap::new(),
            published: Vec::new(),
            candles: BTreeMap::new(),
            runs: Vec::new(),
            results: Vec::new(),
            trades: Vec::new(),
        };
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(state),
                bus,
            }),
        }
    }

    /// Take the store down or bring it back. Going down ends every session.
    pub fn set_available(&self, available: bool) {
        let mut state = self.shared.state();
        state.available = available;
        if !available {
            let ids: Vec<SessionId> = state.sessions.keys().copied().collect();
            for id in ids {
                state.end_session(id);
            }
        }
    }

    /// Make the next `n` connection attempts fail.
    pub fn fail_next_connects(&self, n: u32) {
        self.shared.state().failing_connects = n;
    }

    /// Connection attempts so far, failed ones included.
    pub fn connect_attempts(&self) -> u32 {
        self.shared.state().connect_attempts
    }

    /// Drop a session as if its connection broke.
    pub fn kill_session(&self, id: SessionId) {
        self.shared.state().end_session(id);
    }

    pub fn live_sessions(&self) -> Vec<SessionId> {
        let mut ids: Vec<SessionId> = self.shared.state().sessions.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn lock_holder(&self, key: &LockKey) -> Option<SessionId> {
        self.shared.state().locks.get(&key.id()).copied()
    }

    /// Every payload published on `topic`, in order.
    pub fn published_on(&self, topic: Topic) -> Vec<String> {
        self.shared
            .state()
            .published
            .iter()
            .filter(|e| e.topic == topic)
            .map(|e| e.payload.clone())
            .collect()
    }

    pub fn runs(&self) -> Vec<SignalRun> {
        self.shared.state().runs.clone()
    }

    pub fn results_for(&self, signal_id: i64) -> Vec<StrategyResult> {
        self.shared
            .state()
            .results
            .iter()
            .filter(|r| r.signal_id == signal_id)
            .cloned()
            .collect()
    }

    /// Open a session directly.
    pub fn open_session(&self) -> Result<(SessionId, Session), StoreError> {
        let mut state = self.shared.state();
        state.connect_attempts += 1;
        if !state.available {
            return Err(StoreError::Connection("store unavailable".into()));
        }
        if state.failing_connects > 0 {
            state.failing_connects -= 1;
            return Err(StoreError::Connection("connection refused".into()));
        }

        let id = state.next_session;
        state.next_session += 1;
        let (killed_tx, killed_rx) = watch::channel(false);
        state.sessions.insert(id, killed_tx);

        let subscription = MemorySubscription {
            session: id,
            shared: self.shared.clone(),
            rx: self.shared.bus.subscribe(),
            killed: killed_rx,
            topics: HashSet::new(),
        };
        let lock = MemoryLock {
            session: id,
            shared: self.shared.clone(),
        };
        Ok((
            id,
            Session {
                subscription: Box::new(subscription),
                lock: Arc::new(lock),
            },
        ))
    }
}

#[async_trait]
impl Connector for MemoryStore {
    async fn connect(&self) -> Result<Session, StoreError> {
        self.open_session().map(|(_, session)| session)
    }
}

#[async_trait]
impl EventBus for MemoryStore {
    async fn publish(&self, topic: Topic, payload: &str) -> Result<(), StoreError> {
        let envelope = Envelope::new(topic, payload);
        {
            let mut state = self.shared.state();
            if !state.available {
                return Err(StoreError::Publish {
                    topic: topic.to_string(),
                    reason: "store unavailable".into(),
                });
            }
            state.published.push(envelope.clone());
        }
        // No live subscriber is not an error: delivery is at-most-once.
        let _ = self.shared.bus.send(envelope);
        Ok(())
    }
}

/// Bus subscription tied to one memory session.
pub struct MemorySubscription {
    session: SessionId,
    shared: Arc<Shared>,
    rx: broadcast::Receiver<Envelope>,
    killed: watch::Receiver<bool>,
    topics: HashSet<Topic>,
}

#[async_trait]
impl Subscription for MemorySubscription {
    async fn listen(&mut self, topics: &[Topic]) -> Result<(), StoreError> {
        if !self.shared.state().sessions.contains_key(&self.session) {
            return Err(StoreError::SessionLost);
        }
        self.topics.extend(topics.iter().copied());
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, StoreError> {
        loop {
            if *self.killed.borrow() {
                return Ok(None);
            }
            tokio::select! {
                received = self.rx.recv() => match received {
                    Ok(envelope) if self.topics.contains(&envelope.topic) => {
                        return Ok(Some(envelope));
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(session = self.session, skipped, "Subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return Ok(None),
                },
                changed = self.killed.changed() => {
                    if changed.is_err() {
                        return Ok(None);
                    }
                }
            }
        }
    }
}

/// Advisory locks scoped to one memory session.
pub struct MemoryLock {
    session: SessionId,
    shared: Arc<Shared>,
}

#[async_trait]
impl AdvisoryLock for MemoryLock {
    async fn try_acquire(&self, key: &LockKey) -> Result<bool, StoreError> {
        let mut state = self.shared.state();
        if !state.sessions.contains_key(&self.session) {
            return Err(StoreError::SessionLost);
        }
        match state.locks.get(&key.id()) {
            Some(holder) => Ok(*holder == self.session),
            None => {
                state.locks.insert(key.id(), self.session);
                Ok(true)
            }
        }
    }

    async fn release(&self, key: &LockKey) -> Result<(), StoreError> {
        let mut state = self.shared.state();
        if state.locks.get(&key.id()) == Some(&self.session) {
            state.locks.remove(&key.id());
        }
        Ok(())
    }

    async fn is_held(&self, key: &LockKey) -> bool {
        self.shared.state().locks.get(&key.id()) == Some(&self.session)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        if self.shared.state().sessions.contains_key(&self.session) {
            Ok(())
        } else {
            Err(StoreError::SessionLost)
        }
    }

    async fn terminate(&self) {
        self.shared.state().end_session(self.session);
    }
}

#[async_trait]
impl CandleStore for MemoryStore {
    async fn save_candles(&self, candles: &[Candle]) -> Result<usize, StoreError> {
        let mut state = self.shared.state();
        for candle in candles {
            state
                .candles
                .insert((candle.symbol.clone(), candle.timestamp), candle.clone());
        }
        Ok(candles.len())
    }

    async fn recent_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, StoreError> {
        let state = self.shared.state();
        let mut recent: Vec<Candle> = state
            .candles
            .values()
            .filter(|c| c.symbol == symbol)
            .rev()
            .take(limit)
            .cloned()
            .collect();
        recent.reverse();
        Ok(recent)
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn create_run(&self, symbol: &str, at: DateTime<Utc>) -> Result<SignalRun, StoreError> {
        let mut state = self.shared.state();
        let run = SignalRun {
            id: state.runs.len() as i64 + 1,
            symbol: symbol.to_string(),
            hour_time: truncate_to_hour(at),
            created_at: at,
        };
        state.runs.push(run.clone());
        Ok(run)
    }

    async fn record(&self, result: &StrategyResult) -> Result<(), StoreError> {
        self.shared.state().results.push(result.clone());
        Ok(())
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn insert_provisional(&self, trade: &Trade) -> Result<bool, StoreError> {
        let mut state = self.shared.state();
        let exists = state.trades.iter().any(|t| {
            t.uuid == trade.uuid && t.side == trade.side && t.sequence == trade.sequence
        });
        if exists {
            return Ok(false);
        }
        state.trades.push(trade.clone());
        Ok(true)
    }

    async fn settle(&self, uuid: &str, side: Side, fill: &FillSummary) -> Result<bool, StoreError> {
        let mut state = self.shared.state();
        let row = state
            .trades
            .iter_mut()
            .find(|t| t.uuid == uuid && t.side == side && !t.settled);
        Ok(row.map(|t| t.settle(fill)).unwrap_or(false))
    }

    async fn trades_for(&self, uuid: &str) -> Result<Vec<Trade>, StoreError> {
        let state = self.shared.state();
        let mut rows: Vec<Trade> = state
            .trades
            .iter()
            .filter(|t| t.uuid == uuid)
            .cloned()
            .collect();
        rows.sort_by_key(|t| t.sequence);
        Ok(rows)
    }
}
