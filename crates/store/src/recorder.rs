use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::debug;

use common::{Result, Trade, TradeRecorder};

/// SQLite-backed `TradeRecorder`.
///
/// One INSERT per trade: the row is durable when `append` returns Ok, and
/// a failed insert leaves nothing behind.
#[derive(Clone)]
pub struct SqliteTradeRecorder {
    db: SqlitePool,
}

impl SqliteTradeRecorder {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TradeRecorder for SqliteTradeRecorder {
    async fn append(&self, trade: &Trade) -> Result<i64> {
        let result = sqlx::query(
            "INSERT INTO trades (symbol, quantity, side, price, executed_at, order_id, account_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&trade.symbol)
        .bind(trade.quantity as i64)
        .bind(trade.side.to_string())
        .bind(trade.price)
        .bind(trade.executed_at.to_rfc3339())
        .bind(&trade.order_id)
        .bind(&trade.account_id)
        .execute(&self.db)
        .await?;

        let row_id = result.last_insert_rowid();
        debug!(order_id = %trade.order_id, row_id, "Trade persisted");
        Ok(row_id)
    }
}
