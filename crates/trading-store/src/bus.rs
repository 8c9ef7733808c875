//! Topic-based notification bus over Postgres `LISTEN`/`NOTIFY`.
//!
//! Delivery is at-most-once: a notification sent while a subscriber's session
//! is down is lost. Consumers rebuild state from the store, not from the bus.

use async_trait::async_trait;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, warn};
use trading_core::error::StoreError;
use trading_core::{Envelope, Event, Topic};

use crate::pg::map_sqlx;

/// Publishing half of the bus.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish a raw payload on a topic.
    async fn publish(&self, topic: Topic, payload: &str) -> Result<(), StoreError>;

    /// Publish a typed event on its own topic.
    async fn emit(&self, event: &Event) -> Result<(), StoreError> {
        self.publish(event.topic(), &event.payload()).await
    }
}

/// Receiving half of the bus, bound to one session.
#[async_trait]
pub trait Subscription: Send {
    /// Start listening on topics. Safe to repeat.
    async fn listen(&mut self, topics: &[Topic]) -> Result<(), StoreError>;

    /// Next notification. `Ok(None)` means the session ended.
    async fn recv(&mut self) -> Result<Option<Envelope>, StoreError>;
}

/// Publishes with `pg_notify` through the shared pool.
#[derive(Clone)]
pub struct PgEventBus {
    pool: PgPool,
}

impl PgEventBus {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventBus for PgEventBus {
    async fn publish(&self, topic: Topic, payload: &str) -> Result<(), StoreError> {
        sqlx::query("SELECT pg_notify($1, $2)")
            .bind(topic.as_str())
            .bind(payload)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })?;
        debug!(%topic, payload, "Published");
        Ok(())
    }
}

/// A dedicated `LISTEN` connection.
pub struct PgSubscription {
    listener: PgListener,
}

impl PgSubscription {
    pub async fn connect(pool: &PgPool) -> Result<Self, StoreError> {
        let listener = PgListener::connect_with(pool)
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?;
        Ok(Self { listener })
    }
}

#[async_trait]
impl Subscription for PgSubscription {
    async fn listen(&mut self, topics: &[Topic]) -> Result<(), StoreError> {
        self.listener
            .listen_all(topics.iter().map(Topic::as_str))
            .await
            .map_err(map_sqlx)
    }

    async fn recv(&mut self) -> Result<Option<Envelope>, StoreError> {
        loop {
            // try_recv yields None once the connection drops instead of
            // silently reconnecting, so the supervisor sees the loss.
            let Some(notification) = self.listener.try_recv().await.map_err(map_sqlx)? else {
                return Ok(None);
            };
            match notification.channel().parse::<Topic>() {
                Ok(topic) => return Ok(Some(Envelope::new(topic, notification.payload()))),
                Err(reason) => warn!(%reason, "Ignoring notification"),
            }
        }
    }
}
