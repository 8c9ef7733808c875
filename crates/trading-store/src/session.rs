//! A database session: one listening connection plus one lock connection.

use async_trait::async_trait;
use sqlx::PgPool;
use std::sync::Arc;
use trading_core::error::StoreError;

use crate::bus::{PgSubscription, Subscription};
use crate::lock::{AdvisoryLock, PgAdvisoryLock};

/// Connections that live and die together.
pub struct Session {
    pub subscription: Box<dyn Subscription>,
    pub lock: Arc<dyn AdvisoryLock>,
}

/// Opens fresh sessions for the supervisor.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Session, StoreError>;
}

/// Opens sessions against Postgres.
pub struct PgConnector {
    pool: PgPool,
}

impl PgConnector {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self) -> Result<Session, StoreError> {
        let subscription = PgSubscription::connect(&self.pool).await?;
        let lock = PgAdvisoryLock::connect(&self.pool).await?;
        Ok(Session {
            subscription: Box::new(subscription),
            lock: Arc::new(lock),
        })
    }
}
