use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use trading_core::error::StoreError;
use trading_core::{FillSummary, Side, Trade, TradeStore};

use crate::pg::map_sqlx;

pub struct PgTradeRepository {
    pool: PgPool,
}

impl PgTradeRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn trade_from_row(row: &PgRow) -> Result<Trade, StoreError> {
    let side: String = row.try_get("type").map_err(map_sqlx)?;
    let side: Side = side.parse().map_err(StoreError::Query)?;
    Ok(Trade {
        uuid: row.try_get("uuid").map_err(map_sqlx)?,
        side,
        symbol: row.try_get("symbol").map_err(map_sqlx)?,
        price: row.try_get("price").map_err(map_sqlx)?,
        quantity: row.try_get("quantity").map_err(map_sqlx)?,
        fee: row.try_get("fee").map_err(map_sqlx)?,
        sequence: row.try_get("sequence").map_err(map_sqlx)?,
        settled: row.try_get("settled").map_err(map_sqlx)?,
        created_at: row.try_get("created_at").map_err(map_sqlx)?,
    })
}

#[async_trait]
impl TradeStore for PgTradeRepository {
    async fn insert_provisional(&self, trade: &Trade) -> Result<bool, StoreError> {
        let result = sqlx::query(
            r#"
                INSERT INTO trades
                    (uuid, type, symbol, price, quantity, fee, sequence, settled, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ON CONFLICT (uuid, type, sequence) DO NOTHING
            "#,
        )
        .bind(&trade.uuid)
        .bind(trade.side.to_string())
        .bind(&trade.symbol)
        .bind(trade.price)
        .bind(trade.quantity)
        .bind(trade.fee)
        .bind(trade.sequence)
        .bind(trade.settled)
        .bind(trade.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() == 1)
    }

    async fn settle(&self, uuid: &str, side: Side, fill: &FillSummary) -> Result<bool, StoreError> {
        // The settled guard makes a replayed confirmation a no-op.
        let result = sqlx::query(
            r#"
                UPDATE trades
                SET price = $3, quantity = $4, fee = $5, sequence = sequence + 1, settled = TRUE
                WHERE uuid = $1 AND type = $2 AND settled = FALSE
            "#,
        )
        .bind(uuid)
        .bind(side.to_string())
        .bind(fill.price)
        .bind(fill.quantity)
        .bind(fill.fee)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx)?;
        Ok(result.rows_affected() > 0)
    }

    async fn trades_for(&self, uuid: &str) -> Result<Vec<Trade>, StoreError> {
        let rows = sqlx::query(
            r#"
                SELECT uuid, type, symbol, price, quantity, fee, sequence, settled, created_at
                FROM trades
                WHERE uuid = $1
                ORDER BY sequence
            "#,
        )
        .bind(uuid)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(trade_from_row).collect()
    }
}
