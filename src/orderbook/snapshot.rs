//! Point-in-time, depth-limited views of an order book.

use serde::{Deserialize, Serialize};

/// One aggregated row of a depth view: all visible quantity resting at a
/// single price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepthRow {
    pub price: u64,
    pub quantity: u64,
    pub order_count: usize,
}

/// Bid and ask ladders, each capped to the requested depth and ordered from
/// best to worst price.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderBookSnapshot {
    pub symbol: String,
    pub sequence: u64,
    pub bids: Vec<DepthRow>,
    pub asks: Vec<DepthRow>,
}

impl OrderBookSnapshot {
    pub fn best_bid(&self) -> Option<u64> {
        self.bids.first().map(|r| r.price)
    }

    pub fn best_ask(&self) -> Option<u64> {
        self.asks.first().map(|r| r.price)
    }
}
