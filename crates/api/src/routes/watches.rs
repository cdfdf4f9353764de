use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
    Json, Router,
};
use serde_json::{json, Value};
use uuid::Uuid;

use common::{Error, WatchRequest};

use crate::AppState;

pub fn watches_router() -> Router<AppState> {
    Router::new()
        .route("/api/watches", post(start_watch).get(list_watches))
        .route("/api/watches/:id", delete(cancel_watch))
}

// ─── Watches ──────────────────────────────────────────────────────────────────

/// Start a conditional-trade watch. The session id comes back immediately;
/// trades appear later through the trade log and the event stream.
async fn start_watch(
    State(state): State<AppState>,
    Json(request): Json<WatchRequest>,
) -> (StatusCode, Json<Value>) {
    let account = match state.accounts.get(&request.account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": "unknown account_id" })),
            )
        }
        Err(e) => return internal_error(e),
    };

    match state.supervisor.start(request, account).await {
        Ok(id) => (
            StatusCode::ACCEPTED,
            Json(json!({
                "success": true,
                "session_id": id,
                "message": "Watch started",
            })),
        ),
        Err(e @ (Error::InvalidRequest(_) | Error::UnsupportedCondition { .. })) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": e.to_string() })),
        ),
        Err(e) => internal_error(e),
    }
}

async fn list_watches(State(state): State<AppState>) -> Json<Value> {
    let sessions = state.supervisor.list_active().await;
    Json(json!({ "total": sessions.len(), "sessions": sessions }))
}

async fn cancel_watch(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> (StatusCode, Json<Value>) {
    if state.supervisor.cancel(id).await {
        (
            StatusCode::OK,
            Json(json!({ "success": true, "message": "Cancellation requested" })),
        )
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "message": "no running session with that id" })),
        )
    }
}

fn internal_error(e: Error) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "success": false, "message": e.to_string() })),
    )
}
