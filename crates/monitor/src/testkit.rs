//! Shared fakes for the session and supervisor tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use common::{
    Account, Basis, ConditionKind, Error, PriceSource, Result, StopLossKind, Trade,
    TradeRecorder, WatchRequest,
};

use crate::supervisor::MonitorConfig;

/// Feed that replays a fixed tick script, then fails every further fetch.
/// Failures are transient to the session, so an exhausted script simply
/// parks it until cancellation.
pub(crate) struct ScriptedFeed {
    ticks: Mutex<VecDeque<Result<f64, String>>>,
}

impl ScriptedFeed {
    pub(crate) fn new(prices: &[f64]) -> Arc<Self> {
        Self::with_ticks(prices.iter().map(|p| Ok(*p)).collect())
    }

    pub(crate) fn with_ticks(ticks: Vec<Result<f64, String>>) -> Arc<Self> {
        Arc::new(Self {
            ticks: Mutex::new(ticks.into_iter().collect()),
        })
    }
}

#[async_trait]
impl PriceSource for ScriptedFeed {
    async fn fetch(&self, _symbol: &str) -> Result<f64> {
        match self.ticks.lock().await.pop_front() {
            Some(Ok(price)) => Ok(price),
            Some(Err(message)) => Err(Error::Feed(message)),
            None => Err(Error::Feed("script exhausted".into())),
        }
    }
}

/// Feed that counts fetches; used to prove rejected requests never poll.
#[derive(Default)]
pub(crate) struct CountingFeed {
    pub(crate) fetches: AtomicUsize,
}

#[async_trait]
impl PriceSource for CountingFeed {
    async fn fetch(&self, _symbol: &str) -> Result<f64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(1000.0)
    }
}

/// Recorder that keeps trades in memory, in append order.
#[derive(Clone, Default)]
pub(crate) struct MemoryRecorder {
    pub(crate) trades: Arc<Mutex<Vec<Trade>>>,
}

#[async_trait]
impl TradeRecorder for MemoryRecorder {
    async fn append(&self, trade: &Trade) -> Result<i64> {
        let mut trades = self.trades.lock().await;
        trades.push(trade.clone());
        Ok(trades.len() as i64)
    }
}

/// Recorder whose every insert fails, counting the attempts.
#[derive(Default)]
pub(crate) struct BrokenRecorder {
    pub(crate) attempts: AtomicUsize,
}

#[async_trait]
impl TradeRecorder for BrokenRecorder {
    async fn append(&self, _trade: &Trade) -> Result<i64> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Other("insert failed".into()))
    }
}

pub(crate) fn account() -> Account {
    Account {
        id: "acc-1".into(),
        username: "alice".into(),
        broker: "zerodha".into(),
        api_key: "key-a".into(),
        totp_token: None,
        default_quantity: 2,
    }
}

pub(crate) fn request(
    threshold: f64,
    stop_loss: StopLossKind,
    stop_loss_value: Option<f64>,
) -> WatchRequest {
    WatchRequest {
        account_id: "acc-1".into(),
        symbol: "NIFTY".into(),
        condition: ConditionKind::GreaterOrEqual,
        basis: Basis::Fixed,
        threshold,
        reference_price: 0.0,
        stop_loss,
        stop_loss_value,
        quantity: None,
    }
}

/// Millisecond-scale intervals so tests run in real time without dragging.
pub(crate) fn test_config() -> MonitorConfig {
    MonitorConfig {
        poll_interval: Duration::from_millis(1),
        record_retry_attempts: 1,
        record_retry_delay: Duration::from_millis(1),
        max_session_lifetime: None,
    }
}
