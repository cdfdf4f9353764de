use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::AppState;

/// Health check endpoint, no auth required. Used by ops scripts and deploy
/// checks.
pub fn health_router() -> Router<AppState> {
    Router::new().route("/healthz", get(health))
}

async fn health(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "active_sessions": state.supervisor.active_count().await,
        "subscribers": state.events.subscriber_count(),
    }))
}
