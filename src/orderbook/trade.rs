//! Execution records and order-lifecycle events emitted by the matching loop.

use crate::orderbook::types::{OrderId, OrderStatus, Side};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// A single execution between a taker and a maker order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub symbol: String,
    pub price: u64,
    pub quantity: u64,
    pub taker_side: Side,
    pub taker_order_id: OrderId,
    pub maker_order_id: OrderId,
    pub buy_order_id: OrderId,
    pub sell_order_id: OrderId,
    pub timestamp_ms: u64,
    pub sequence: u64,
}

impl Trade {
    pub fn new(
        trade_id: u64,
        symbol: String,
        price: u64,
        quantity: u64,
        taker_side: Side,
        taker_order_id: OrderId,
        maker_order_id: OrderId,
        timestamp_ms: u64,
        sequence: u64,
    ) -> Self {
        let (buy_order_id, sell_order_id) = match taker_side {
            Side::Buy => (taker_order_id.clone(), maker_order_id.clone()),
            Side::Sell => (maker_order_id.clone(), taker_order_id.clone()),
        };
        Self {
            trade_id,
            symbol,
            price,
            quantity,
            taker_side,
            taker_order_id,
            maker_order_id,
            buy_order_id,
            sell_order_id,
            timestamp_ms,
            sequence,
        }
    }
}

/// A status change on an order, emitted once per transition so a caller can
/// reconstruct the order's history without re-reading the book.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderEvent {
    pub event_id: u64,
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub reason: Option<String>,
    pub remaining_quantity: u64,
    pub timestamp_ms: u64,
    pub sequence: u64,
}

/// A bounded, insertion-ordered history of trades for a single symbol.
/// Oldest entries are evicted once `capacity` is exceeded.
pub struct TradeLog {
    capacity: usize,
    trades: VecDeque<Trade>,
    next_trade_id: u64,
}

impl TradeLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            trades: VecDeque::new(),
            next_trade_id: 1,
        }
    }

    /// Allocate the next trade id without recording anything yet.
    pub fn next_id(&mut self) -> u64 {
        let id = self.next_trade_id;
        self.next_trade_id += 1;
        id
    }

    pub fn record(&mut self, trade: Trade) {
        if self.trades.len() >= self.capacity {
            self.trades.pop_front();
        }
        self.trades.push_back(trade);
    }

    /// Most recent `limit` trades, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Trade> {
        self.trades.iter().rev().take(limit).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(id: u64, seq: u64) -> Trade {
        Trade::new(
            id,
            "BTC-USD".to_string(),
            100,
            1,
            Side::Buy,
            OrderId::from("taker"),
            OrderId::from("maker"),
            0,
            seq,
        )
    }

    #[test]
    fn buy_taker_orders_buy_then_sell() {
        let t = Trade::new(
            1,
            "BTC-USD".to_string(),
            100,
            5,
            Side::Buy,
            OrderId::from("t"),
            OrderId::from("m"),
            0,
            1,
        );
        assert_eq!(t.buy_order_id, OrderId::from("t"));
        assert_eq!(t.sell_order_id, OrderId::from("m"));
    }

    #[test]
    fn sell_taker_orders_sell_then_buy() {
        let t = Trade::new(
            1,
            "BTC-USD".to_string(),
            100,
            5,
            Side::Sell,
            OrderId::from("t"),
            OrderId::from("m"),
            0,
            1,
        );
        assert_eq!(t.buy_order_id, OrderId::from("m"));
        assert_eq!(t.sell_order_id, OrderId::from("t"));
    }

    #[test]
    fn trade_log_evicts_oldest_beyond_capacity() {
        let mut log = TradeLog::new(2);
        log.record(trade(1, 1));
        log.record(trade(2, 2));
        log.record(trade(3, 3));
        let recent = log.recent(10);
        let ids: Vec<u64> = recent.iter().map(|t| t.trade_id).collect();
        assert_eq!(ids, vec![3, 2]);
    }

    #[test]
    fn next_id_is_monotonic() {
        let mut log = TradeLog::new(10);
        assert_eq!(log.next_id(), 1);
        assert_eq!(log.next_id(), 2);
    }
}
