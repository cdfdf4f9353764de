use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Router,
};
use tokio::sync::broadcast;
use tracing::warn;

use common::TradeEvent;

use crate::AppState;

pub fn ws_router() -> Router<AppState> {
    Router::new().route("/ws/trades", get(ws_handler))
}

async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    let events = state.events.subscribe();
    ws.on_upgrade(move |socket| stream_trades(socket, events))
}

/// Streams recorded trades to the client in record order. Subscribers only
/// see trades recorded after they connect; there is no history replay.
async fn stream_trades(mut socket: WebSocket, mut events: broadcast::Receiver<TradeEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => {
                let Ok(text) = serde_json::to_string(&event) else {
                    continue;
                };
                if socket.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "WebSocket client lagged behind trade feed");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
