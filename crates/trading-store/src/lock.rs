//! Session-scoped advisory locks.
//!
//! A lock belongs to the database session that took it. When the session
//! ends, whether by `terminate` or a dropped connection, the database frees
//! every key it held, so a crashed process never blocks the others.

use async_trait::async_trait;
use sqlx::{Connection, PgConnection, PgPool};
use std::collections::HashSet;
use std::fmt;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use trading_core::error::StoreError;

use crate::pg::map_sqlx;

/// Lock namespace shared by the analysis and trading processes.
pub const TRADING_LOCK: &str = "TRADING";

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// A named advisory lock key.
///
/// Names hash to the 64-bit integer Postgres expects with FNV-1a, so every
/// process derives the same key for the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LockKey {
    name: String,
    id: i64,
}

impl LockKey {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let id = fnv1a(name.as_bytes()) as i64;
        Self { name, id }
    }

    /// `TRADING:{symbol}`: serializes analysis and trading of one symbol.
    pub fn for_symbol(symbol: &str) -> Self {
        Self::new(format!("{TRADING_LOCK}:{symbol}"))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id(&self) -> i64 {
        self.id
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET, |hash, b| {
        (hash ^ u64::from(*b)).wrapping_mul(FNV_PRIME)
    })
}

/// Non-blocking mutual exclusion across processes.
///
/// Acquisition is not re-entrant counting: taking a key this session already
/// holds succeeds without stacking, and one `release` frees it.
#[async_trait]
pub trait AdvisoryLock: Send + Sync {
    /// Try to take `key`. `Ok(false)` means another session holds it.
    async fn try_acquire(&self, key: &LockKey) -> Result<bool, StoreError>;

    /// Release `key`. Releasing a key this session does not hold is a no-op.
    async fn release(&self, key: &LockKey) -> Result<(), StoreError>;

    /// Whether this session currently holds `key`.
    async fn is_held(&self, key: &LockKey) -> bool;

    /// Round-trip to detect a dead session.
    async fn ping(&self) -> Result<(), StoreError>;

    /// End the session, freeing every key it holds.
    async fn terminate(&self);
}

/// Advisory locks on one dedicated connection.
pub struct PgAdvisoryLock {
    conn: Mutex<Option<PgConnection>>,
    held: Mutex<HashSet<LockKey>>,
}

impl PgAdvisoryLock {
    /// Detach a connection from the pool so it owns its own session.
    pub async fn connect(pool: &PgPool) -> Result<Self, StoreError> {
        let conn = pool
            .acquire()
            .await
            .map_err(|e| StoreError::Connection(e.to_string()))?
            .detach();
        Ok(Self {
            conn: Mutex::new(Some(conn)),
            held: Mutex::new(HashSet::new()),
        })
    }
}

#[async_trait]
impl AdvisoryLock for PgAdvisoryLock {
    async fn try_acquire(&self, key: &LockKey) -> Result<bool, StoreError> {
        let mut held = self.held.lock().await;
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            held.clear();
            return Err(StoreError::SessionLost);
        };
        if held.contains(key) {
            // The held set is only as good as the session behind it.
            return match conn.ping().await {
                Ok(()) => Ok(true),
                Err(e) => Err(forget_on_loss(map_sqlx(e), &mut held, &mut *guard)),
            };
        }
        let acquired: bool = match sqlx::query_scalar("SELECT pg_try_advisory_lock($1)")
            .bind(key.id())
            .fetch_one(&mut *conn)
            .await
        {
            Ok(acquired) => acquired,
            Err(e) => return Err(forget_on_loss(map_sqlx(e), &mut held, &mut *guard)),
        };
        if acquired {
            held.insert(key.clone());
        }
        debug!(%key, acquired, "Advisory lock attempt");
        Ok(acquired)
    }

    async fn release(&self, key: &LockKey) -> Result<(), StoreError> {
        let mut held = self.held.lock().await;
        if !held.remove(key) {
            return Ok(());
        }
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            held.clear();
            return Err(StoreError::SessionLost);
        };
        let released: bool = match sqlx::query_scalar("SELECT pg_advisory_unlock($1)")
            .bind(key.id())
            .fetch_one(&mut *conn)
            .await
        {
            Ok(released) => released,
            Err(e) => return Err(forget_on_loss(map_sqlx(e), &mut held, &mut *guard)),
        };
        if !released {
            warn!(%key, "Advisory lock was not held by this session");
        }
        debug!(%key, "Advisory lock released");
        Ok(())
    }

    async fn is_held(&self, key: &LockKey) -> bool {
        self.held.lock().await.contains(key)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut held = self.held.lock().await;
        let mut guard = self.conn.lock().await;
        let Some(conn) = guard.as_mut() else {
            held.clear();
            return Err(StoreError::SessionLost);
        };
        match conn.ping().await {
            Ok(()) => Ok(()),
            Err(e) => Err(forget_on_loss(map_sqlx(e), &mut held, &mut *guard)),
        }
    }

    async fn terminate(&self) {
        self.held.lock().await.clear();
        if let Some(conn) = self.conn.lock().await.take() {
            if let Err(e) = conn.close().await {
                debug!(error = %e, "Lock session closed uncleanly");
            }
        }
    }
}

/// A lost session has already freed its keys on the server: drop the
/// connection and forget them too.
fn forget_on_loss<C>(
    err: StoreError,
    held: &mut HashSet<LockKey>,
    conn: &mut Option<C>,
) -> StoreError {
    if matches!(err, StoreError::SessionLost) {
        if !held.is_empty() {
            warn!(keys = held.len(), "Lock session lost, forgetting held keys");
        }
        held.clear();
        *conn = None;
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_are_stable() {
        // FNV-1a reference vectors
        assert_eq!(fnv1a(b""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a(b"a"), 0xaf63_dc4c_8601_ec8c);

        assert_eq!(LockKey::new("TRADING:KRW-BTC"), LockKey::for_symbol("KRW-BTC"));
        assert_ne!(LockKey::for_symbol("KRW-BTC").id(), LockKey::for_symbol("KRW-ETH").id());
        assert_eq!(LockKey::for_symbol("KRW-BTC").to_string(), "TRADING:KRW-BTC");
    }

    #[test]
    fn test_lost_session_forgets_held_keys() {
        let mut held: HashSet<LockKey> = [LockKey::for_symbol("KRW-BTC")].into_iter().collect();
        let mut conn = Some(());

        let err = forget_on_loss(StoreError::Query("syntax".into()), &mut held, &mut conn);
        assert!(matches!(err, StoreError::Query(_)));
        assert_eq!(held.len(), 1);
        assert!(conn.is_some());

        let err = forget_on_loss(StoreError::SessionLost, &mut held, &mut conn);
        assert!(matches!(err, StoreError::SessionLost));
        assert!(held.is_empty());
        assert!(conn.is_none());
    }
}
