use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use trading_core::error::StoreError;
use trading_core::{Candle, CandleStore};

use crate::pg::map_sqlx;

pub struct PgCandleRepository {
    pool: PgPool,
}

impl PgCandleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CandleStore for PgCandleRepository {
    async fn save_candles(&self, candles: &[Candle]) -> Result<usize, StoreError> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        for candle in candles {
            sqlx::query(
                r#"
                    INSERT INTO candles (symbol, timestamp, open, high, low, close, volume)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                    ON CONFLICT (symbol, timestamp) DO UPDATE SET
                        open = EXCLUDED.open,
                        high = EXCLUDED.high,
                        low = EXCLUDED.low,
                        close = EXCLUDED.close,
                        volume = EXCLUDED.volume
                "#,
            )
            .bind(&candle.symbol)
            .bind(candle.timestamp)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(candles.len())
    }

    async fn recent_candles(&self, symbol: &str, limit: usize) -> Result<Vec<Candle>, StoreError> {
        let rows = sqlx::query(
            r#"
                SELECT symbol, timestamp, open, high, low, close, volume
                FROM candles
                WHERE symbol = $1
                ORDER BY timestamp DESC
                LIMIT $2
            "#,
        )
        .bind(symbol)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut candles = rows
            .iter()
            .map(|row| -> Result<Candle, sqlx::Error> {
                Ok(Candle::new(
                    row.try_get::<String, _>("symbol")?,
                    row.try_get::<DateTime<Utc>, _>("timestamp")?,
                    row.try_get("open")?,
                    row.try_get("high")?,
                    row.try_get("low")?,
                    row.try_get("close")?,
                    row.try_get("volume")?,
                ))
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(map_sqlx)?;
        candles.reverse();
        Ok(candles)
    }
}
