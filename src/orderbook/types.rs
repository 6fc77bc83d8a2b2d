//! Core order book data types: identifiers, enums, and the `Order` entity.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Globally unique order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderId(pub String);

impl OrderId {
    pub fn new() -> Self {
        Self(format!("ord-{}", uuid::Uuid::new_v4()))
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for OrderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Which side of the book an order rests on or aggresses against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Whether an order carries a price (`Limit`) or sweeps at whatever price is
/// available (`Market`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    Market,
}

/// Time-in-force policy applied once an order's marketable quantity is
/// exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Rests on the book until filled or canceled.
    Gtc,
    /// Fills what it can immediately; any remainder expires.
    Ioc,
    /// Requires a full fill or is rejected before any trade occurs.
    Fok,
}

/// Self-trade prevention policy: what happens when an incoming order would
/// match against a resting order from the same user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SelfTradePrevention {
    #[default]
    None,
    CancelNewest,
    CancelOldest,
    CancelBoth,
}

/// The lifecycle state of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Canceled
                | OrderStatus::Rejected
                | OrderStatus::Expired
        )
    }
}

/// An order owned by a single order book.
///
/// See the invariants documented on the book module: `remaining_quantity =
/// displayed_remaining_quantity + reserve_remaining_quantity` always holds,
/// and a resting order's `displayed_remaining_quantity <= display_quantity
/// <= remaining_quantity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub client_order_id: Option<String>,
    pub sequence: u64,

    pub symbol: String,
    pub user_id: String,
    pub side: Side,
    pub kind: OrderKind,
    pub time_in_force: TimeInForce,

    pub status: OrderStatus,
    pub reason: Option<String>,

    pub original_quantity: u64,
    pub remaining_quantity: u64,
    pub display_quantity: u64,
    pub displayed_remaining_quantity: u64,
    pub reserve_remaining_quantity: u64,
    pub min_quantity: Option<u64>,

    pub price: Option<u64>,
    pub self_trade_prevention: SelfTradePrevention,

    pub created_at_ms: u64,
    pub updated_at_ms: u64,
}

impl Order {
    /// `true` once `remaining_quantity` reaches zero.
    pub fn is_fully_filled(&self) -> bool {
        self.remaining_quantity == 0
    }
}

/// Request to submit a new order to the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitOrderRequest {
    pub id: Option<String>,
    pub client_order_id: Option<String>,
    pub symbol: String,
    pub user_id: String,
    pub side: Side,
    pub kind: OrderKind,
    pub quantity: u64,
    pub price: Option<u64>,
    pub time_in_force: Option<TimeInForce>,
    pub min_quantity: Option<u64>,
    pub iceberg_display_quantity: Option<u64>,
    pub self_trade_prevention: Option<SelfTradePrevention>,
}

/// Request to cancel a resting order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub order_id: String,
    pub user_id: Option<String>,
    pub symbol: Option<String>,
}
