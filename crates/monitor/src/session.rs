use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::time::{sleep, sleep_until, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use common::{
    Account, Broadcaster, OrderSide, PriceSource, Result, SessionState, Trade, TradeEvent,
    TradeRecorder, WatchRequest,
};

use crate::supervisor::MonitorConfig;

/// Why a session's task ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The exit trade was recorded and the session reached `Closed`.
    Completed,
    /// Cancelled through the supervisor before closing.
    Cancelled,
    /// The maximum session lifetime elapsed before closing.
    Expired,
    /// A trade could not be recorded after all retries.
    Aborted,
}

/// Mutable view of a session's progress, shared with the supervisor for
/// snapshots. Only the session task writes it, and transitions are
/// forward-only: `WaitingEntry` to `WaitingExit` to `Closed`.
#[derive(Debug)]
pub(crate) struct Progress {
    pub state: SessionState,
    pub entry_price: Option<f64>,
    pub stop_line: Option<f64>,
}

impl Progress {
    pub(crate) fn new() -> Self {
        Self {
            state: SessionState::WaitingEntry,
            entry_price: None,
            stop_line: None,
        }
    }
}

enum PriceTick {
    Price(f64),
    Ended(SessionEnd),
}

/// One independent watch: polls the price feed, enters when the condition
/// triggers, then exits when the stop line is reached.
///
/// The task owns itself (`run(self)`); the supervisor keeps only the shared
/// `Progress` and a `CancellationToken`. Trades are durably recorded before
/// they are broadcast, and before the state machine advances.
pub struct MonitorSession {
    id: Uuid,
    request: WatchRequest,
    account: Account,
    /// Resolved at validation time from the request or the account default.
    quantity: u32,
    feed: Arc<dyn PriceSource>,
    recorder: Arc<dyn TradeRecorder>,
    events: Broadcaster,
    progress: Arc<RwLock<Progress>>,
    cancel: CancellationToken,
    poll_interval: Duration,
    record_retries: u32,
    record_retry_delay: Duration,
    deadline: Option<Instant>,
}

impl MonitorSession {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: Uuid,
        request: WatchRequest,
        account: Account,
        quantity: u32,
        feed: Arc<dyn PriceSource>,
        recorder: Arc<dyn TradeRecorder>,
        events: Broadcaster,
        progress: Arc<RwLock<Progress>>,
        cancel: CancellationToken,
        config: &MonitorConfig,
    ) -> Self {
        let deadline = config.max_session_lifetime.map(|ttl| Instant::now() + ttl);
        Self {
            id,
            request,
            account,
            quantity,
            feed,
            recorder,
            events,
            progress,
            cancel,
            poll_interval: config.poll_interval,
            record_retries: config.record_retry_attempts,
            record_retry_delay: config.record_retry_delay,
            deadline,
        }
    }

    /// Drive the session to one of the `SessionEnd` outcomes.
    /// Call from `tokio::spawn`.
    pub async fn run(self) -> SessionEnd {
        info!(
            session = %self.id,
            account = %self.account.username,
            symbol = %self.request.symbol,
            threshold = self.request.threshold,
            "Session watching for entry"
        );

        // ── Entry phase ──────────────────────────────────────────────────
        let entry_price = loop {
            let price = match self.next_price().await {
                PriceTick::Price(p) => p,
                PriceTick::Ended(end) => {
                    info!(session = %self.id, outcome = ?end, "Session ended before entry");
                    return end;
                }
            };
            match rules::entry_triggered(
                self.request.condition,
                self.request.basis,
                self.request.threshold,
                self.request.reference_price,
                price,
            ) {
                Ok(true) => break price,
                Ok(false) => debug!(session = %self.id, price, "Entry condition not met"),
                Err(e) => {
                    // unreachable in practice: the pair was validated at start
                    error!(session = %self.id, error = %e, "Entry evaluation failed");
                    return SessionEnd::Aborted;
                }
            }
        };

        if let Err(e) = self.record_trade(OrderSide::Buy, entry_price).await {
            error!(session = %self.id, error = %e, "Entry trade was not recorded; aborting session");
            return SessionEnd::Aborted;
        }

        // The stop line is fixed once, from the realized entry price.
        let stop = rules::stop_line(
            entry_price,
            self.request.stop_loss,
            self.request.stop_loss_value.unwrap_or(0.0),
        );
        {
            let mut progress = self.progress.write().await;
            progress.state = SessionState::WaitingExit;
            progress.entry_price = Some(entry_price);
            progress.stop_line = Some(stop);
        }
        info!(session = %self.id, entry_price, stop_line = stop, "Entered position; watching stop line");

        // ── Exit phase ───────────────────────────────────────────────────
        let exit_price = loop {
            let price = match self.next_price().await {
                PriceTick::Price(p) => p,
                PriceTick::Ended(end) => {
                    info!(session = %self.id, outcome = ?end, "Session ended while holding");
                    return end;
                }
            };
            if price <= stop {
                break price;
            }
            debug!(session = %self.id, price, stop_line = stop, "Price above stop line");
        };

        if let Err(e) = self.record_trade(OrderSide::Sell, exit_price).await {
            error!(session = %self.id, error = %e, "Exit trade was not recorded; aborting session");
            return SessionEnd::Aborted;
        }

        self.progress.write().await.state = SessionState::Closed;
        info!(session = %self.id, exit_price, "Stop line crossed; session closed");
        SessionEnd::Completed
    }

    /// One poll cycle: wait out the interval, then fetch. Cancellation and
    /// expiry are honored during the wait. Feed errors are transient; the
    /// fetch is retried after another full interval, forever.
    async fn next_price(&self) -> PriceTick {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => return PriceTick::Ended(SessionEnd::Cancelled),
                _ = Self::until(self.deadline) => return PriceTick::Ended(SessionEnd::Expired),
                _ = sleep(self.poll_interval) => {}
            }
            match self.feed.fetch(&self.request.symbol).await {
                Ok(price) => return PriceTick::Price(price),
                Err(e) => {
                    warn!(session = %self.id, error = %e, "Price fetch failed; will retry");
                }
            }
        }
    }

    async fn until(deadline: Option<Instant>) {
        match deadline {
            Some(at) => sleep_until(at).await,
            None => std::future::pending::<()>().await,
        }
    }

    /// Record one trade durably, then broadcast it. The insert is retried a
    /// fixed number of times with a fixed delay; the event is only emitted
    /// after a successful insert, so subscribers never hear about trades
    /// that were not persisted.
    async fn record_trade(&self, side: OrderSide, price: f64) -> Result<()> {
        let trade = Trade::executed(
            self.request.symbol.as_str(),
            side,
            self.quantity,
            price,
            &self.account,
        );
        let mut attempt = 0u32;
        loop {
            match self.recorder.append(&trade).await {
                Ok(row_id) => {
                    info!(
                        session = %self.id,
                        order_id = %trade.order_id,
                        row_id,
                        side = %side,
                        price,
                        quantity = self.quantity,
                        "Trade recorded"
                    );
                    self.events.emit(TradeEvent::for_trade(&trade, &self.account));
                    return Ok(());
                }
                Err(e) if attempt < self.record_retries => {
                    attempt += 1;
                    warn!(session = %self.id, error = %e, attempt, "Trade insert failed; retrying");
                    sleep(self.record_retry_delay).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::{
        account, request, test_config, BrokenRecorder, MemoryRecorder, ScriptedFeed,
    };
    use common::{ConditionKind, StopLossKind};
    use std::sync::atomic::Ordering;
    use tokio::time::timeout;

    fn make_session(
        request: WatchRequest,
        feed: Arc<dyn PriceSource>,
        recorder: Arc<dyn TradeRecorder>,
        config: &MonitorConfig,
    ) -> (MonitorSession, Arc<RwLock<Progress>>, CancellationToken, Broadcaster) {
        let progress = Arc::new(RwLock::new(Progress::new()));
        let cancel = CancellationToken::new();
        let events = Broadcaster::new(64);
        let session = MonitorSession::new(
            Uuid::new_v4(),
            request,
            account(),
            2,
            feed,
            recorder,
            events.clone(),
            progress.clone(),
            cancel.clone(),
            config,
        );
        (session, progress, cancel, events)
    }

    #[tokio::test]
    async fn entry_fires_on_the_first_qualifying_observation() {
        // 1005 and 1008 do not satisfy >= 1010; the third tick does
        let feed = ScriptedFeed::new(&[1005.0, 1008.0, 1012.0, 900.0]);
        let recorder = MemoryRecorder::default();
        let (session, _progress, _cancel, _events) = make_session(
            request(1010.0, StopLossKind::Fixed, Some(900.0)),
            feed,
            Arc::new(recorder.clone()),
            &test_config(),
        );

        let end = timeout(Duration::from_secs(1), session.run())
            .await
            .expect("session should finish");
        assert_eq!(end, SessionEnd::Completed);

        let trades = recorder.trades.lock().await;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[0].side, OrderSide::Buy);
        assert_eq!(trades[0].price, 1012.0);
    }

    #[tokio::test]
    async fn exit_fires_on_the_first_tick_at_or_below_the_stop_line() {
        // entry at 1000, percentage 5 fixes the stop line at 950;
        // 960 and 955 stay above it, 945 crosses it
        let feed = ScriptedFeed::new(&[1000.0, 960.0, 955.0, 945.0]);
        let recorder = MemoryRecorder::default();
        let (session, progress, _cancel, events) = make_session(
            request(1000.0, StopLossKind::Percentage, Some(5.0)),
            feed,
            Arc::new(recorder.clone()),
            &test_config(),
        );
        let mut rx = events.subscribe();

        let end = timeout(Duration::from_secs(1), session.run())
            .await
            .expect("session should finish");
        assert_eq!(end, SessionEnd::Completed);

        let trades = recorder.trades.lock().await;
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[1].side, OrderSide::Sell);
        assert_eq!(trades[1].price, 945.0);

        let snapshot = progress.read().await;
        assert_eq!(snapshot.state, SessionState::Closed);
        assert_eq!(snapshot.entry_price, Some(1000.0));
        assert!((snapshot.stop_line.unwrap() - 950.0).abs() < 1e-9);

        // broadcasts follow the durable records, in order
        let first = rx.recv().await.expect("buy event");
        let second = rx.recv().await.expect("sell event");
        assert_eq!(first.side, OrderSide::Buy);
        assert_eq!(first.order_id, trades[0].order_id);
        assert_eq!(second.side, OrderSide::Sell);
        assert_eq!(second.order_id, trades[1].order_id);
    }

    #[tokio::test]
    async fn strict_condition_ignores_the_boundary_tick() {
        let feed = ScriptedFeed::new(&[1010.0, 1010.5, 0.0]);
        let mut req = request(1010.0, StopLossKind::Default, None);
        req.condition = ConditionKind::GreaterThan;
        let recorder = MemoryRecorder::default();
        let (session, _progress, _cancel, _events) =
            make_session(req, feed, Arc::new(recorder.clone()), &test_config());

        let end = timeout(Duration::from_secs(1), session.run())
            .await
            .expect("session should finish");
        assert_eq!(end, SessionEnd::Completed);

        let trades = recorder.trades.lock().await;
        assert_eq!(trades[0].price, 1010.5);
    }

    #[tokio::test]
    async fn cancellation_before_entry_records_nothing() {
        let feed = ScriptedFeed::new(&[1000.0, 1000.0, 1000.0, 1000.0]);
        let recorder = MemoryRecorder::default();
        let (session, _progress, cancel, _events) = make_session(
            request(1010.0, StopLossKind::Default, None),
            feed,
            Arc::new(recorder.clone()),
            &test_config(),
        );

        let handle = tokio::spawn(session.run());
        tokio::time::sleep(Duration::from_millis(20)).await;
        cancel.cancel();

        let end = timeout(Duration::from_secs(1), handle)
            .await
            .expect("timeout")
            .expect("task panicked");
        assert_eq!(end, SessionEnd::Cancelled);
        assert!(recorder.trades.lock().await.is_empty());
    }

    #[tokio::test]
    async fn feed_failures_only_delay_the_session() {
        let feed = ScriptedFeed::with_ticks(vec![
            Err("feed down".into()),
            Err("feed down".into()),
            Ok(1200.0),
            Ok(0.0),
        ]);
        let recorder = MemoryRecorder::default();
        let (session, _progress, _cancel, _events) = make_session(
            request(1000.0, StopLossKind::Default, None),
            feed,
            Arc::new(recorder.clone()),
            &test_config(),
        );

        let end = timeout(Duration::from_secs(1), session.run())
            .await
            .expect("session should finish");
        assert_eq!(end, SessionEnd::Completed);
        assert_eq!(recorder.trades.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn recorder_failure_aborts_without_state_change_or_broadcast() {
        let feed = ScriptedFeed::new(&[1200.0]);
        let recorder = Arc::new(BrokenRecorder::default());
        let (session, progress, _cancel, events) = make_session(
            request(1000.0, StopLossKind::Default, None),
            feed,
            recorder.clone(),
            &test_config(),
        );
        let mut rx = events.subscribe();

        let end = timeout(Duration::from_secs(1), session.run())
            .await
            .expect("session should finish");
        assert_eq!(end, SessionEnd::Aborted);

        // one initial attempt plus one retry
        assert_eq!(recorder.attempts.load(Ordering::SeqCst), 2);
        // never advanced past WAITING_ENTRY and nothing was broadcast
        assert_eq!(progress.read().await.state, SessionState::WaitingEntry);
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn lifetime_cap_expires_an_idle_session() {
        let feed = ScriptedFeed::new(&[1000.0, 1000.0, 1000.0, 1000.0]);
        let recorder = MemoryRecorder::default();
        let mut config = test_config();
        config.poll_interval = Duration::from_millis(5);
        config.max_session_lifetime = Some(Duration::from_millis(30));
        let (session, _progress, _cancel, _events) = make_session(
            request(9999.0, StopLossKind::Default, None),
            feed,
            Arc::new(recorder.clone()),
            &config,
        );

        let end = timeout(Duration::from_secs(1), session.run())
            .await
            .expect("session should finish");
        assert_eq!(end, SessionEnd::Expired);
        assert!(recorder.trades.lock().await.is_empty());
    }

    #[tokio::test]
    async fn identical_tick_sequences_produce_identical_trades() {
        let script = [1005.0, 1008.0, 1012.0, 960.0, 945.0];
        let mut runs: Vec<Vec<(String, OrderSide, u32, f64)>> = Vec::new();

        for _ in 0..2 {
            let recorder = MemoryRecorder::default();
            let (session, _progress, _cancel, _events) = make_session(
                request(1010.0, StopLossKind::Percentage, Some(5.0)),
                ScriptedFeed::new(&script),
                Arc::new(recorder.clone()),
                &test_config(),
            );
            let end = timeout(Duration::from_secs(1), session.run())
                .await
                .expect("session should finish");
            assert_eq!(end, SessionEnd::Completed);

            let trades = recorder.trades.lock().await;
            runs.push(
                trades
                    .iter()
                    .map(|t| (t.symbol.clone(), t.side, t.quantity, t.price))
                    .collect(),
            );
        }

        assert_eq!(runs[0], runs[1]);
    }
}
