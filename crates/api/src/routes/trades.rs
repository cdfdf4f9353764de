use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::Row;

use common::{OrderSide, Trade, TradeEvent};

use crate::AppState;

pub fn trades_router() -> Router<AppState> {
    Router::new()
        .route("/api/trades", get(get_trades))
        .route("/api/trades/manual", post(manual_trade))
        .route("/api/dashboard", get(get_dashboard))
}

// ─── Trade history ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct TradesQuery {
    page: Option<i64>,
    limit: Option<i64>,
    symbol: Option<String>,
}

async fn get_trades(State(state): State<AppState>, Query(q): Query<TradesQuery>) -> Json<Value> {
    let page = q.page.unwrap_or(1).max(1);
    let limit = q.limit.unwrap_or(50).min(200);
    let offset = (page - 1) * limit;

    if let Some(symbol) = &q.symbol {
        let rows = sqlx::query(
            "SELECT t.id, t.symbol, t.quantity, t.side, t.price, t.executed_at, t.order_id,
                    t.account_id, a.username, a.broker
             FROM trades t JOIN accounts a ON a.id = t.account_id
             WHERE t.symbol = ?1
             ORDER BY t.executed_at DESC LIMIT ?2 OFFSET ?3",
        )
        .bind(symbol)
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades WHERE symbol = ?1")
            .bind(symbol)
            .fetch_one(&state.db)
            .await
            .unwrap_or(0);

        Json(json!({ "trades": rows_to_json(&rows), "total": total, "page": page, "limit": limit }))
    } else {
        let rows = sqlx::query(
            "SELECT t.id, t.symbol, t.quantity, t.side, t.price, t.executed_at, t.order_id,
                    t.account_id, a.username, a.broker
             FROM trades t JOIN accounts a ON a.id = t.account_id
             ORDER BY t.executed_at DESC LIMIT ?1 OFFSET ?2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&state.db)
        .await
        .unwrap_or_default();

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades")
            .fetch_one(&state.db)
            .await
            .unwrap_or(0);

        Json(json!({ "trades": rows_to_json(&rows), "total": total, "page": page, "limit": limit }))
    }
}

fn rows_to_json(rows: &[sqlx::sqlite::SqliteRow]) -> Vec<Value> {
    rows.iter()
        .map(|t| {
            json!({
                "id": t.get::<i64, _>("id"),
                "symbol": t.get::<String, _>("symbol"),
                "quantity": t.get::<i64, _>("quantity"),
                "side": t.get::<String, _>("side"),
                "price": t.get::<f64, _>("price"),
                "executed_at": t.get::<String, _>("executed_at"),
                "order_id": t.get::<String, _>("order_id"),
                "account_id": t.get::<String, _>("account_id"),
                "username": t.get::<String, _>("username"),
                "broker": t.get::<String, _>("broker"),
            })
        })
        .collect()
}

// ─── Manual trades ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ManualTradeBody {
    account_id: String,
    symbol: String,
    side: OrderSide,
    price: f64,
    /// Defaults to the account's default quantity.
    quantity: Option<u32>,
}

/// Record a trade placed outside any monitor session. Same durability rule
/// as session trades: persisted first, broadcast after.
async fn manual_trade(
    State(state): State<AppState>,
    Json(body): Json<ManualTradeBody>,
) -> (StatusCode, Json<Value>) {
    if body.symbol.trim().is_empty() || !body.price.is_finite() || body.price <= 0.0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "message": "symbol and a positive price are required" })),
        );
    }

    let account = match state.accounts.get(&body.account_id).await {
        Ok(Some(account)) => account,
        Ok(None) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": "unknown account_id" })),
            )
        }
        Err(e) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "message": e.to_string() })),
            )
        }
    };

    let quantity = body.quantity.unwrap_or(account.default_quantity).max(1);
    let trade = Trade::executed(body.symbol.trim(), body.side, quantity, body.price, &account);

    match state.recorder.append(&trade).await {
        Ok(row_id) => {
            state.events.emit(TradeEvent::for_trade(&trade, &account));
            (
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "message": format!("Trade placed. ID={row_id}"),
                    "order_id": trade.order_id,
                })),
            )
        }
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "success": false, "message": e.to_string() })),
        ),
    }
}

// ─── Dashboard ────────────────────────────────────────────────────────────────

async fn get_dashboard(State(state): State<AppState>) -> Json<Value> {
    let total_accounts: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM accounts")
        .fetch_one(&state.db)
        .await
        .unwrap_or(0);

    let total_trades: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM trades")
        .fetch_one(&state.db)
        .await
        .unwrap_or(0);

    Json(json!({
        "total_accounts": total_accounts,
        "total_trades": total_trades,
        "active_sessions": state.supervisor.active_count().await,
    }))
}
