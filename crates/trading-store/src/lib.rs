//! Shared store for the trading processes.
//!
//! Everything the processes share goes through one Postgres database:
//! - [`bus`]: topic notifications (`LISTEN`/`NOTIFY`)
//! - [`lock`]: session-scoped advisory locks
//! - [`supervisor`]: bounded reconnects around a session
//! - [`repositories`]: candles, signal runs and trades
//!
//! [`memory`] provides the same contracts in-process.

pub mod bus;
pub mod lock;
pub mod memory;
pub mod pg;
pub mod repositories;
pub mod session;
pub mod supervisor;

pub use bus::{EventBus, PgEventBus, PgSubscription, Subscription};
pub use lock::{AdvisoryLock, LockKey, PgAdvisoryLock, TRADING_LOCK};
pub use memory::{MemoryStore, SessionId};
pub use pg::{connect_pool, ensure_schema};
pub use sqlx::PgPool;
pub use repositories::{PgCandleRepository, PgSignalRepository, PgTradeRepository};
pub use session::{Connector, PgConnector, Session};
pub use supervisor::{
    ConnectionSupervisor, EventHandler, SupervisorConfig, SupervisorError, SupervisorState,
};
