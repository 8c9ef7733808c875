//! Connection supervision with bounded reconnects.
//!
//! The supervisor owns a process's session. It opens the session, re-listens
//! on the handler's topics, hands the session's lock to the handler and pumps
//! notifications until the session dies. Failed connection attempts are
//! counted; a successful session resets the count. After the configured
//! number of consecutive failures the supervisor sends a single manager alert
//! and stops.

use async_trait::async_trait;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};
use trading_core::error::StoreError;
use trading_core::{Envelope, Event, Topic};

use crate::bus::{EventBus, Subscription};
use crate::lock::AdvisoryLock;
use crate::session::Connector;

/// Lifecycle of a supervised session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupervisorState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Reconnecting,
    /// Reconnect budget exhausted. Never left.
    Terminated,
}

impl std::fmt::Display for SupervisorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SupervisorState::Disconnected => "disconnected",
            SupervisorState::Connecting => "connecting",
            SupervisorState::Connected => "connected",
            SupervisorState::Error => "error",
            SupervisorState::Reconnecting => "reconnecting",
            SupervisorState::Terminated => "terminated",
        };
        f.write_str(s)
    }
}

#[derive(Error, Debug)]
pub enum SupervisorError {
    #[error("{process}: gave up after {attempts} failed connection attempts: {last}")]
    Exhausted {
        process: String,
        attempts: u32,
        last: StoreError,
    },
}

/// Reconnect policy.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub max_attempts: u32,
    pub reconnect_delay: Duration,
    /// How often an idle session is checked for liveness
    pub health_check_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            reconnect_delay: Duration::from_secs(5),
            health_check_interval: Duration::from_secs(30),
        }
    }
}

/// The process-specific half of a supervised service.
#[async_trait]
pub trait EventHandler: Send {
    /// Topics to listen on after every (re)connect.
    fn topics(&self) -> Vec<Topic>;

    /// Called once per session, before any notification is delivered.
    async fn on_session(&mut self, _lock: Arc<dyn AdvisoryLock>) {}

    /// Handle one notification. Long work should be spawned.
    async fn handle(&mut self, envelope: Envelope);
}

/// Keeps one process connected to the shared store.
pub struct ConnectionSupervisor<C> {
    process: String,
    connector: C,
    alerts: Arc<dyn EventBus>,
    config: SupervisorConfig,
    state: watch::Sender<SupervisorState>,
}

impl<C: Connector> ConnectionSupervisor<C> {
    /// `alerts` carries the single termination notice to the manager.
    pub fn new(
        process: impl Into<String>,
        connector: C,
        alerts: Arc<dyn EventBus>,
        config: SupervisorConfig,
    ) -> Self {
        let (state, _) = watch::channel(SupervisorState::Disconnected);
        Self {
            process: process.into(),
            connector,
            alerts,
            config,
            state,
        }
    }

    pub fn state(&self) -> SupervisorState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<SupervisorState> {
        self.state.subscribe()
    }

    fn transition(&self, next: SupervisorState) {
        self.state.send_replace(next);
    }

    /// Run until the reconnect budget is spent.
    pub async fn run<H: EventHandler>(
        &self,
        handler: &mut H,
    ) -> Result<Infallible, SupervisorError> {
        let mut failures: u32 = 0;

        loop {
            self.transition(SupervisorState::Connecting);
            let reason = match self.open(&handler.topics()).await {
                Ok((subscription, lock)) => {
                    failures = 0;
                    self.transition(SupervisorState::Connected);
                    info!(process = %self.process, "Session established");

                    handler.on_session(lock.clone()).await;
                    let reason = self.pump(subscription, lock.as_ref(), handler).await;
                    lock.terminate().await;

                    self.transition(SupervisorState::Error);
                    warn!(process = %self.process, error = %reason, "Session lost");
                    reason
                }
                Err(e) => {
                    failures += 1;
                    self.transition(SupervisorState::Error);
                    warn!(
                        process = %self.process,
                        attempt = failures,
                        max = self.config.max_attempts,
                        error = %e,
                        "Connection attempt failed"
                    );
                    e
                }
            };

            if failures >= self.config.max_attempts {
                return Err(self.terminate(failures, reason).await);
            }

            self.transition(SupervisorState::Reconnecting);
            tokio::time::sleep(self.config.reconnect_delay).await;
        }
    }

    async fn open(
        &self,
        topics: &[Topic],
    ) -> Result<(Box<dyn Subscription>, Arc<dyn AdvisoryLock>), StoreError> {
        let mut session = self.connector.connect().await?;
        if let Err(e) = session.subscription.listen(topics).await {
            session.lock.terminate().await;
            return Err(e);
        }
        Ok((session.subscription, session.lock))
    }

    /// Deliver notifications until the session fails.
    async fn pump<H: EventHandler>(
        &self,
        mut subscription: Box<dyn Subscription>,
        lock: &dyn AdvisoryLock,
        handler: &mut H,
    ) -> StoreError {
        let mut health = tokio::time::interval(self.config.health_check_interval);
        health.tick().await;

        loop {
            tokio::select! {
                received = subscription.recv() => match received {
                    Ok(Some(envelope)) => handler.handle(envelope).await,
                    Ok(None) => return StoreError::SessionLost,
                    Err(e) => return e,
                },
                _ = health.tick() => {
                    if let Err(e) = lock.ping().await {
                        return e;
                    }
                }
            }
        }
    }

    async fn terminate(&self, attempts: u32, last: StoreError) -> SupervisorError {
        self.transition(SupervisorState::Terminated);
        error!(process = %self.process, attempts, error = %last, "Reconnect budget exhausted");

        let notice = Event::send(format!(
            "[{}] {}: connection lost after {attempts} attempts ({last})",
            last.key(),
            self.process
        ));
        if let Err(e) = self.alerts.emit(&notice).await {
            error!(process = %self.process, error = %e, "Could not notify manager");
        }

        SupervisorError::Exhausted {
            process: self.process.clone(),
            attempts,
            last,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn fast() -> SupervisorConfig {
        SupervisorConfig {
            max_attempts: 5,
            reconnect_delay: Duration::from_millis(1),
            health_check_interval: Duration::from_secs(60),
        }
    }

    #[derive(Clone, Default)]
    struct Recorder {
        sessions: Arc<AtomicUsize>,
        seen: Arc<Mutex<Vec<Envelope>>>,
    }

    #[async_trait]
    impl EventHandler for Recorder {
        fn topics(&self) -> Vec<Topic> {
            vec![Topic::Analysis]
        }

        async fn on_session(&mut self, _lock: Arc<dyn AdvisoryLock>) {
            self.sessions.fetch_add(1, Ordering::SeqCst);
        }

        async fn handle(&mut self, envelope: Envelope) {
            self.seen.lock().unwrap().push(envelope);
        }
    }

    async fn wait_until(cond: impl Fn() -> bool) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while !cond() {
                tokio::time::sleep(Duration::from_millis(2)).await;
            }
        })
        .await
        .expect("condition not reached");
    }

    #[tokio::test]
    async fn test_exhaustion_sends_one_notice() {
        let store = MemoryStore::new();
        store.set_available(false);
        let manager = MemoryStore::new();
        let supervisor =
            ConnectionSupervisor::new("analysis", store.clone(), Arc::new(manager.clone()), fast());

        let mut handler = Recorder::default();
        let err = match supervisor.run(&mut handler).await {
            Err(e) => e,
            Ok(never) => match never {},
        };

        let SupervisorError::Exhausted { attempts, .. } = err;
        assert_eq!(attempts, 5);
        assert_eq!(store.connect_attempts(), 5);
        assert_eq!(supervisor.state(), SupervisorState::Terminated);
        assert_eq!(handler.sessions.load(Ordering::SeqCst), 0);

        let notices = manager.published_on(Topic::Manager);
        assert_eq!(notices.len(), 1);
        assert!(notices[0].starts_with("SEND:[store.connection] analysis"));
    }

    #[tokio::test]
    async fn test_reconnects_and_relistens_after_session_loss() {
        let store = MemoryStore::new();
        let handler = Recorder::default();
        let sessions = handler.sessions.clone();
        let seen = handler.seen.clone();

        let supervisor =
            ConnectionSupervisor::new("analysis", store.clone(), Arc::new(store.clone()), fast());
        let mut states = supervisor.subscribe_state();
        let task = tokio::spawn(async move {
            let mut handler = handler;
            supervisor.run(&mut handler).await
        });

        wait_until(|| sessions.load(Ordering::SeqCst) == 1).await;
        store.publish(Topic::Analysis, "CANDLE_SAVED").await.unwrap();
        store.publish(Topic::Trading, "BUY:KRW-BTC").await.unwrap();
        wait_until(|| seen.lock().unwrap().len() == 1).await;

        let first = store.live_sessions();
        store.kill_session(first[0]);
        wait_until(|| sessions.load(Ordering::SeqCst) == 2).await;
        assert_eq!(*states.borrow_and_update(), SupervisorState::Connected);

        store.publish(Topic::Analysis, "CANDLE_SAVED:KRW-ETH").await.unwrap();
        wait_until(|| seen.lock().unwrap().len() == 2).await;
        assert_eq!(seen.lock().unwrap()[1].payload, "CANDLE_SAVED:KRW-ETH");

        task.abort();
    }

    #[tokio::test]
    async fn test_failures_reset_after_a_good_session() {
        let store = MemoryStore::new();
        store.fail_next_connects(4);
        let handler = Recorder::default();
        let sessions = handler.sessions.clone();

        let supervisor =
            ConnectionSupervisor::new("trading", store.clone(), Arc::new(store.clone()), fast());
        let task = tokio::spawn(async move {
            let mut handler = handler;
            supervisor.run(&mut handler).await
        });

        wait_until(|| sessions.load(Ordering::SeqCst) == 1).await;
        store.fail_next_connects(4);
        let live = store.live_sessions();
        store.kill_session(live[0]);

        // Eight failures in total, never five in a row.
        wait_until(|| sessions.load(Ordering::SeqCst) == 2).await;
        assert_eq!(store.connect_attempts(), 10);
        assert!(!task.is_finished());
        assert!(store.published_on(Topic::Manager).is_empty());

        task.abort();
    }
}
