use async_trait::async_trait;

use crate::Result;

/// Abstraction over the live price feed.
///
/// `SimulatedFeed` in `crates/feed` implements this for local runs; a
/// broker-backed client implements it in production.
///
/// Callers treat every error as transient: a failed fetch is logged and
/// retried on the next poll, it never ends a monitor session.
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Get the latest price for a symbol.
    async fn fetch(&self, symbol: &str) -> Result<f64>;
}
