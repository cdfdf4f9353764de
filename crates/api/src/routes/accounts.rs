use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};

use common::{Account, Error};
use store::NewAccount;

use crate::AppState;

pub fn accounts_router() -> Router<AppState> {
    Router::new()
        .route("/api/accounts", post(register_account).get(list_accounts))
        .route("/api/accounts/import", post(import_accounts))
}

// ─── Accounts ─────────────────────────────────────────────────────────────────

/// API keys and TOTP secrets never leave the server.
fn public_view(account: &Account) -> Value {
    json!({
        "id": account.id,
        "username": account.username,
        "broker": account.broker,
        "default_quantity": account.default_quantity,
    })
}

async fn register_account(
    State(state): State<AppState>,
    Json(body): Json<NewAccount>,
) -> (StatusCode, Json<Value>) {
    match state.accounts.register(body).await {
        Ok(account) => (
            StatusCode::CREATED,
            Json(json!({ "success": true, "account": public_view(&account) })),
        ),
        Err(Error::InvalidRequest(msg)) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": msg })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": e.to_string() })),
        ),
    }
}

async fn list_accounts(State(state): State<AppState>) -> Json<Value> {
    let accounts = state.accounts.list().await.unwrap_or_default();
    let accounts: Vec<Value> = accounts.iter().map(public_view).collect();
    Json(json!({ "total": accounts.len(), "accounts": accounts }))
}

/// Bulk import, one account per CSV line:
/// `username,broker,api_key,totp_token,default_quantity`.
/// Malformed or duplicate lines are skipped, not fatal.
async fn import_accounts(State(state): State<AppState>, body: String) -> (StatusCode, Json<Value>) {
    match state.accounts.import_csv(&body).await {
        Ok(imported) => (
            StatusCode::OK,
            Json(json!({ "success": true, "message": format!("Imported {imported} accounts") })),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": e.to_string() })),
        ),
    }
}
