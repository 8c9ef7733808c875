use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trading_core::error::StoreError;
use trading_core::{truncate_to_hour, IndicatorValues, SignalRun, SignalStore, StrategyResult};

use crate::pg::map_sqlx;

/// Signal runs go to `signal_log`, each strategy's values to its own table.
pub struct PgSignalRepository {
    pool: PgPool,
}

impl PgSignalRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SignalStore for PgSignalRepository {
    async fn create_run(&self, symbol: &str, at: DateTime<Utc>) -> Result<SignalRun, StoreError> {
        let hour_time = truncate_to_hour(at);
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO signal_log (symbol, hour_time, created_at) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(symbol)
        .bind(hour_time)
        .bind(at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_sqlx)?;

        Ok(SignalRun {
            id,
            symbol: symbol.to_string(),
            hour_time,
            created_at: at,
        })
    }

    async fn record(&self, result: &StrategyResult) -> Result<(), StoreError> {
        let id = result.signal_id;
        let score = result.score;
        let query = match result.values {
            IndicatorValues::Rsi { rsi, prev_rsi } => sqlx::query(
                "INSERT INTO signal_rsi (signal_id, rsi, prev_rsi, score) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(rsi)
            .bind(prev_rsi)
            .bind(score),
            IndicatorValues::Macd {
                macd,
                signal,
                histogram,
                prev_histogram,
                close,
            } => sqlx::query(
                r#"
                    INSERT INTO signal_macd
                        (signal_id, macd, signal_line, histogram, prev_histogram, close, score)
                    VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(id)
            .bind(macd)
            .bind(signal)
            .bind(histogram)
            .bind(prev_histogram)
            .bind(close)
            .bind(score),
            IndicatorValues::Bollinger {
                upper,
                middle,
                lower,
                close,
            } => sqlx::query(
                r#"
                    INSERT INTO signal_bollinger
                        (signal_id, upper_band, middle_band, lower_band, close, score)
                    VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(upper)
            .bind(middle)
            .bind(lower)
            .bind(close)
            .bind(score),
            IndicatorValues::Stochastic { k, d } => sqlx::query(
                "INSERT INTO signal_stochastic (signal_id, k, d, score) VALUES ($1, $2, $3, $4)",
            )
            .bind(id)
            .bind(k)
            .bind(d)
            .bind(score),
            IndicatorValues::MovingAverage {
                short_ma,
                long_ma,
                prev_short_ma,
                prev_long_ma,
            } => sqlx::query(
                r#"
                    INSERT INTO signal_ma_crossover
                        (signal_id, short_ma, long_ma, prev_short_ma, prev_long_ma, score)
                    VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(short_ma)
            .bind(long_ma)
            .bind(prev_short_ma)
            .bind(prev_long_ma)
            .bind(score),
            IndicatorValues::Volume {
                volume,
                average_volume,
                ratio,
                direction,
            } => sqlx::query(
                r#"
                    INSERT INTO signal_volume
                        (signal_id, volume, average_volume, ratio, direction, score)
                    VALUES ($1, $2, $3, $4, $5, $6)
                "#,
            )
            .bind(id)
            .bind(volume)
            .bind(average_volume)
            .bind(ratio)
            .bind(direction)
            .bind(score),
        };

        query.execute(&self.pool).await.map_err(map_sqlx)?;
        Ok(())
    }
}
