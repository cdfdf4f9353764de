use std::sync::Arc;
use std::time::Duration;

use tracing::info;
use tracing_subscriber::EnvFilter;

use common::{Broadcaster, Config, TradeRecorder};
use feed::SimulatedFeed;
use monitor::{MonitorConfig, MonitorSupervisor};
use store::{AccountStore, SqliteTradeRecorder};

#[tokio::main]
async fn main() {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse().unwrap()))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(port = cfg.api_port, "TradeWatch starting");

    // ── Database ──────────────────────────────────────────────────────────────
    let db = store::connect(&cfg.database_url)
        .await
        .unwrap_or_else(|e| panic!("Failed to open database: {e}"));

    // ── Shared state ──────────────────────────────────────────────────────────
    let events = Broadcaster::new(1024);
    let recorder: Arc<dyn TradeRecorder> = Arc::new(SqliteTradeRecorder::new(db.clone()));
    let price_feed = Arc::new(SimulatedFeed::new(cfg.feed_base_price, cfg.feed_jitter));

    // ── Monitor supervisor ────────────────────────────────────────────────────
    let monitor_cfg = MonitorConfig {
        poll_interval: Duration::from_secs(cfg.poll_interval_secs),
        record_retry_attempts: cfg.record_retry_attempts,
        record_retry_delay: Duration::from_secs(cfg.record_retry_delay_secs),
        max_session_lifetime: cfg.max_session_lifetime_secs.map(Duration::from_secs),
    };
    let supervisor = Arc::new(MonitorSupervisor::new(
        price_feed,
        recorder.clone(),
        events.clone(),
        monitor_cfg,
    ));

    // ── API ───────────────────────────────────────────────────────────────────
    let state = api::AppState {
        db: db.clone(),
        accounts: AccountStore::new(db.clone()),
        recorder,
        supervisor: supervisor.clone(),
        events,
    };
    tokio::spawn(api::serve(state, cfg.api_port));

    info!("All subsystems started. Waiting for shutdown signal.");
    tokio::signal::ctrl_c().await.unwrap();

    info!("Shutdown signal received. Stopping sessions.");
    supervisor.shutdown().await;
}
