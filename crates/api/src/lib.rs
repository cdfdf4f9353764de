pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use sqlx::SqlitePool;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use common::{Broadcaster, TradeRecorder};
use monitor::MonitorSupervisor;
use store::AccountStore;

/// Shared application state injected into every route handler.
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub accounts: AccountStore,
    /// Used by the manual-trade endpoint; sessions hold their own clone.
    pub recorder: Arc<dyn TradeRecorder>,
    pub supervisor: Arc<MonitorSupervisor>,
    /// Fan-out of recorded trades to WebSocket clients.
    pub events: Broadcaster,
}

/// Build and run the Axum API server.
pub async fn serve(state: AppState, port: u16) {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_headers(Any)
        .allow_methods(Any);

    let app = Router::new()
        .merge(routes::accounts_router())
        .merge(routes::trades_router())
        .merge(routes::watches_router())
        .merge(routes::ws_router())
        .merge(routes::health_router())
        .with_state(state)
        .layer(cors);

    info!(%addr, "API listening");
    let listener = tokio::net::TcpListener::bind(addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
