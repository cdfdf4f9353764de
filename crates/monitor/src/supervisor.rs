use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use common::{
    Account, Broadcaster, Error, PriceSource, Result, SessionState, StopLossKind, TradeRecorder,
    WatchRequest,
};

use crate::session::{MonitorSession, Progress};

/// Tuning shared by every session the supervisor starts.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Delay between price observations.
    pub poll_interval: Duration,
    /// Extra insert attempts before a failed trade record aborts a session.
    pub record_retry_attempts: u32,
    pub record_retry_delay: Duration,
    /// Hard cap on session lifetime; `None` means no cap.
    pub max_session_lifetime: Option<Duration>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            record_retry_attempts: 3,
            record_retry_delay: Duration::from_secs(1),
            max_session_lifetime: None,
        }
    }
}

/// Point-in-time view of one running session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub id: Uuid,
    pub account_id: String,
    pub symbol: String,
    pub state: SessionState,
    pub entry_price: Option<f64>,
    pub stop_line: Option<f64>,
    pub started_at: DateTime<Utc>,
}

struct SessionHandle {
    account_id: String,
    symbol: String,
    started_at: DateTime<Utc>,
    progress: Arc<RwLock<Progress>>,
    cancel: CancellationToken,
}

/// Creates, tracks and cancels monitor sessions.
///
/// The price feed, the trade recorder and the event broadcaster are
/// injected once and cloned into every session; sessions share nothing
/// else and cannot block one another.
pub struct MonitorSupervisor {
    feed: Arc<dyn PriceSource>,
    recorder: Arc<dyn TradeRecorder>,
    events: Broadcaster,
    config: MonitorConfig,
    sessions: Arc<RwLock<HashMap<Uuid, SessionHandle>>>,
}

impl MonitorSupervisor {
    pub fn new(
        feed: Arc<dyn PriceSource>,
        recorder: Arc<dyn TradeRecorder>,
        events: Broadcaster,
        config: MonitorConfig,
    ) -> Self {
        Self {
            feed,
            recorder,
            events,
            config,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validate a request and spawn its session. Rejected requests never
    /// reach the polling loop. The session is registered before its task
    /// runs, so it is immediately visible and cancellable; it deregisters
    /// itself when it ends, whatever the outcome.
    pub async fn start(&self, request: WatchRequest, account: Account) -> Result<Uuid> {
        let quantity = validate(&request, &account)?;

        let id = Uuid::new_v4();
        info!(
            session = %id,
            account = %account.username,
            symbol = %request.symbol,
            quantity,
            "Starting monitor session"
        );

        let progress = Arc::new(RwLock::new(Progress::new()));
        let cancel = CancellationToken::new();
        let handle = SessionHandle {
            account_id: account.id.clone(),
            symbol: request.symbol.clone(),
            started_at: Utc::now(),
            progress: progress.clone(),
            cancel: cancel.clone(),
        };
        let session = MonitorSession::new(
            id,
            request,
            account,
            quantity,
            self.feed.clone(),
            self.recorder.clone(),
            self.events.clone(),
            progress,
            cancel,
            &self.config,
        );

        self.sessions.write().await.insert(id, handle);
        let sessions = self.sessions.clone();
        tokio::spawn(async move {
            let end = session.run().await;
            sessions.write().await.remove(&id);
            info!(session = %id, outcome = ?end, "Session deregistered");
        });

        Ok(id)
    }

    /// Request cancellation. Returns false for unknown or already finished
    /// sessions. The session observes the token at its next poll boundary.
    pub async fn cancel(&self, id: Uuid) -> bool {
        match self.sessions.read().await.get(&id) {
            Some(handle) => {
                handle.cancel.cancel();
                info!(session = %id, "Session cancellation requested");
                true
            }
            None => {
                warn!(session = %id, "Cancel requested for unknown session");
                false
            }
        }
    }

    pub async fn list_active(&self) -> Vec<SessionSnapshot> {
        let sessions = self.sessions.read().await;
        let mut snapshots = Vec::with_capacity(sessions.len());
        for (id, handle) in sessions.iter() {
            let progress = handle.progress.read().await;
            snapshots.push(SessionSnapshot {
                id: *id,
                account_id: handle.account_id.clone(),
                symbol: handle.symbol.clone(),
                state: progress.state,
                entry_price: progress.entry_price,
                stop_line: progress.stop_line,
                started_at: handle.started_at,
            });
        }
        snapshots.sort_by_key(|s| s.started_at);
        snapshots
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Cancel every running session. Called on shutdown.
    pub async fn shutdown(&self) {
        let sessions = self.sessions.read().await;
        info!(active = sessions.len(), "Cancelling all monitor sessions");
        for handle in sessions.values() {
            handle.cancel.cancel();
        }
    }
}

/// Reject anything a session could not execute faithfully, and resolve the
/// effective quantity. Runs before any task is spawned.
fn validate(request: &WatchRequest, account: &Account) -> Result<u32> {
    if request.symbol.trim().is_empty() {
        return Err(Error::InvalidRequest("symbol must not be empty".into()));
    }
    if !request.threshold.is_finite() || request.threshold <= 0.0 {
        return Err(Error::InvalidRequest(
            "threshold must be a positive number".into(),
        ));
    }
    if !request.reference_price.is_finite() || request.reference_price < 0.0 {
        return Err(Error::InvalidRequest(
            "reference_price must not be negative".into(),
        ));
    }
    rules::ensure_supported(request.condition, request.basis)?;

    if request.stop_loss != StopLossKind::Default {
        let value = request.stop_loss_value.ok_or_else(|| {
            Error::InvalidRequest(format!(
                "stop_loss_value is required for kind '{}'",
                request.stop_loss
            ))
        })?;
        if !value.is_finite() || value <= 0.0 {
            return Err(Error::InvalidRequest(
                "stop_loss_value must be a positive number".into(),
            ));
        }
        if request.stop_loss == StopLossKind::Percentage && value >= 100.0 {
            return Err(Error::InvalidRequest(
                "percentage stop-loss must be below 100".into(),
            ));
        }
    }

    let quantity = request.quantity.unwrap_or(account.default_quantity);
    if quantity == 0 {
        return Err(Error::InvalidRequest("quantity must be at least 1".into()));
    }
    Ok(quantity)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
