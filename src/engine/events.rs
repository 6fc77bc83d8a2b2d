//! Event types fanned out on the engine's broadcast channel.
//!
//! One broadcast channel, one enum covering the four event kinds the engine
//! emits, matched on the receiving end.

use crate::orderbook::{OrderBookSnapshot, OrderEvent, Trade};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResultPayload {
    pub order_id: String,
    pub canceled: bool,
    pub reason: Option<String>,
}

/// A single item on the engine's fan-out bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EngineEvent {
    Trade(Trade),
    OrderBook { symbol: String, snapshot: OrderBookSnapshot },
    OrderResult { order_event: OrderEvent },
    CancelResult(CancelResultPayload),
}
