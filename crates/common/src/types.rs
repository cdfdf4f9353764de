use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Side of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "BUY"),
            OrderSide::Sell => write!(f, "SELL"),
        }
    }
}

/// How the observed price is compared with the threshold to trigger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConditionKind {
    /// Trigger when price >= threshold.
    GreaterOrEqual,
    /// Trigger when price > threshold (strict).
    GreaterThan,
}

impl std::fmt::Display for ConditionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionKind::GreaterOrEqual => write!(f, "greater_or_equal"),
            ConditionKind::GreaterThan => write!(f, "greater_than"),
        }
    }
}

/// What the threshold refers to.
///
/// Only `Fixed` (an absolute price level) is evaluated today. `Reference`
/// is accepted on the wire but rejected before a session starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Basis {
    Fixed,
    Reference,
}

impl std::fmt::Display for Basis {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Basis::Fixed => write!(f, "fixed"),
            Basis::Reference => write!(f, "reference"),
        }
    }
}

/// How the stop line is derived from the realized entry price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopLossKind {
    /// `entry * (1 - value / 100)`.
    Percentage,
    /// `entry - value`.
    Points,
    /// `value` taken as an absolute price.
    Fixed,
    /// Legacy fallback: ten points below entry, no value needed.
    Default,
}

impl std::fmt::Display for StopLossKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopLossKind::Percentage => write!(f, "percentage"),
            StopLossKind::Points => write!(f, "points"),
            StopLossKind::Fixed => write!(f, "fixed"),
            StopLossKind::Default => write!(f, "default"),
        }
    }
}

/// Lifecycle state of a monitor session. Transitions are forward-only:
/// `WaitingEntry` -> `WaitingExit` -> `Closed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    WaitingEntry,
    WaitingExit,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::WaitingEntry => write!(f, "WAITING_ENTRY"),
            SessionState::WaitingExit => write!(f, "WAITING_EXIT"),
            SessionState::Closed => write!(f, "CLOSED"),
        }
    }
}

/// A conditional-trade request as submitted by a client.
/// Immutable once the session is running.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchRequest {
    pub account_id: String,
    pub symbol: String,
    pub condition: ConditionKind,
    pub basis: Basis,
    pub threshold: f64,
    /// Carried for reference-relative bases; ignored by `Basis::Fixed`.
    #[serde(default)]
    pub reference_price: f64,
    pub stop_loss: StopLossKind,
    /// Required unless `stop_loss` is `Default`.
    pub stop_loss_value: Option<f64>,
    /// Overrides the account's default quantity when set.
    pub quantity: Option<u32>,
}

/// A registered trading account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub username: String,
    pub broker: String,
    pub api_key: String,
    pub totp_token: Option<String>,
    pub default_quantity: u32,
}

/// An executed trade as it is persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub quantity: u32,
    pub side: OrderSide,
    pub price: f64,
    pub executed_at: DateTime<Utc>,
    pub order_id: String,
    pub account_id: String,
}

impl Trade {
    /// Build a trade stamped with the current time and a fresh order id.
    pub fn executed(
        symbol: impl Into<String>,
        side: OrderSide,
        quantity: u32,
        price: f64,
        account: &Account,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
            side,
            price,
            executed_at: Utc::now(),
            order_id: next_order_id(&account.broker),
            account_id: account.id.clone(),
        }
    }
}

/// Payload pushed to live subscribers once a trade is durably recorded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: u32,
    pub price: f64,
    pub order_id: String,
    pub account_id: String,
    pub username: String,
    pub broker: String,
}

impl TradeEvent {
    pub fn for_trade(trade: &Trade, account: &Account) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            side: trade.side,
            quantity: trade.quantity,
            price: trade.price,
            order_id: trade.order_id.clone(),
            account_id: trade.account_id.clone(),
            username: account.username.clone(),
            broker: account.broker.clone(),
        }
    }
}

static ORDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Next broker order id, formatted `{BROKER}-{unix_secs}-{seq}`.
///
/// The process-wide counter keeps ids distinct even when several trades
/// execute within the same second.
pub fn next_order_id(broker: &str) -> String {
    let seq = ORDER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", broker.to_uppercase(), Utc::now().timestamp(), seq)
}
