//! Postgres pool setup and schema bootstrap.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;
use tracing::info;
use trading_core::error::StoreError;

const SCHEMA: &str = include_str!("../sql/schema.sql");

/// Open a connection pool.
pub async fn connect_pool(
    url: &str,
    max_connections: u32,
    acquire_timeout: Duration,
) -> Result<PgPool, StoreError> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(acquire_timeout)
        .connect(url)
        .await
        .map_err(|e| StoreError::Connection(e.to_string()))?;
    info!(max_connections, "Connected to Postgres");
    Ok(pool)
}

/// Create every table this system owns. Idempotent.
pub async fn ensure_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(SCHEMA).execute(pool).await.map_err(map_sqlx)?;
    info!("Schema ensured");
    Ok(())
}

/// Map a sqlx error, treating transport failures as a lost session.
pub(crate) fn map_sqlx(err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Io(_) | sqlx::Error::PoolClosed | sqlx::Error::WorkerCrashed => {
            StoreError::SessionLost
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Tls(_) => StoreError::Connection(err.to_string()),
        sqlx::Error::RowNotFound => StoreError::NotFound(err.to_string()),
        other => StoreError::Query(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_declares_every_table() {
        for table in [
            "candles",
            "signal_log",
            "signal_rsi",
            "signal_macd",
            "signal_bollinger",
            "signal_stochastic",
            "signal_ma_crossover",
            "signal_volume",
            "trades",
        ] {
            assert!(
                SCHEMA.contains(&format!("CREATE TABLE IF NOT EXISTS {table} (")),
                "missing {table}"
            );
        }
        assert!(SCHEMA.contains("PRIMARY KEY (uuid, type, sequence)"));
    }

    #[test]
    fn test_transport_errors_are_session_loss() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(matches!(map_sqlx(sqlx::Error::Io(io)), StoreError::SessionLost));
        assert!(matches!(map_sqlx(sqlx::Error::RowNotFound), StoreError::NotFound(_)));
    }
}
