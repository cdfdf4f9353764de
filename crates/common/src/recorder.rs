use async_trait::async_trait;

use crate::{Result, Trade};

/// Durable, append-only store for executed trades.
///
/// `SqliteTradeRecorder` in `crates/store` implements this. A trade must be
/// durable before it is broadcast to subscribers; implementations either
/// persist the whole record or fail without side effects.
#[async_trait]
pub trait TradeRecorder: Send + Sync {
    /// Persist one trade and return its storage id.
    async fn append(&self, trade: &Trade) -> Result<i64>;
}
