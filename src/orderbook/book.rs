//! A single-symbol order book: two side indices, price-time priority
//! matching, iceberg replenishment, self-trade prevention, and TIF handling.
//!
//! Mutation is `&mut self` throughout — unlike the lock-free, `Arc`-shared
//! design this crate's matching core grew out of, a book here is owned
//! exclusively by its engine and mutated from a single call site at a time,
//! so there is no internal synchronization to get wrong.

use crate::orderbook::error::RejectReason;
use crate::orderbook::price_level::{NodeHandle, PriceLevel};
use crate::orderbook::snapshot::{DepthRow, OrderBookSnapshot};
use crate::orderbook::trade::{OrderEvent, Trade, TradeLog};
use crate::orderbook::types::{
    Order, OrderId, OrderKind, OrderStatus, SelfTradePrevention, Side, SubmitOrderRequest,
    TimeInForce,
};
use crate::skiplist::SkipList;
use std::collections::HashMap;
use tracing::trace;

const DEFAULT_TRADE_LOG_CAPACITY: usize = 10_000;

/// Location of a resting order's queue node, kept on the side-table so
/// cancel/match can reach it without walking the skip list.
#[derive(Clone, Copy)]
struct OrderRef {
    side: Side,
    sort_key: i64,
    node: NodeHandle,
}

/// Result of a successful or rejected order submission.
pub struct SubmitResult {
    pub order: Order,
    pub trades: Vec<Trade>,
    pub events: Vec<OrderEvent>,
}

/// Result of a cancel attempt.
pub struct CancelResult {
    pub canceled: bool,
    pub order: Option<Order>,
    pub reason: Option<RejectReason>,
    pub event: Option<OrderEvent>,
}

/// A two-sided, single-symbol order book.
pub struct OrderBook {
    symbol: String,
    lot_size: u64,
    tick_size: u64,

    bids: SkipList<i64, PriceLevel>,
    asks: SkipList<i64, PriceLevel>,
    orders_by_id: HashMap<OrderId, OrderRef>,
    orders: HashMap<OrderId, Order>,

    trade_log: TradeLog,
    sequence: u64,
    next_event_id: u64,
}

impl OrderBook {
    pub fn new(
        symbol: impl Into<String>,
        lot_size: u64,
        tick_size: u64,
        rng: crate::rng::DeterministicRng,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            bids: SkipList::new(rng.derive(&format!("{symbol}:bids"))),
            asks: SkipList::new(rng.derive(&format!("{symbol}:asks"))),
            orders_by_id: HashMap::new(),
            orders: HashMap::new(),
            trade_log: TradeLog::new(DEFAULT_TRADE_LOG_CAPACITY),
            sequence: 0,
            next_event_id: 1,
            symbol,
            lot_size,
            tick_size,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn active_order_count(&self) -> usize {
        self.orders_by_id.len()
    }

    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    fn next_event_id(&mut self) -> u64 {
        let id = self.next_event_id;
        self.next_event_id += 1;
        id
    }

    fn sort_key(side: Side, price: u64) -> i64 {
        match side {
            Side::Sell => price as i64,
            Side::Buy => -(price as i64),
        }
    }

    fn side_index(&self, side: Side) -> &SkipList<i64, PriceLevel> {
        match side {
            Side::Buy => &self.bids,
            Side::Sell => &self.asks,
        }
    }

    fn side_index_mut(&mut self, side: Side) -> &mut SkipList<i64, PriceLevel> {
        match side {
            Side::Buy => &mut self.bids,
            Side::Sell => &mut self.asks,
        }
    }

    fn is_lot_aligned(&self, quantity: u64) -> bool {
        self.lot_size == 0 || quantity % self.lot_size == 0
    }

    fn is_tick_aligned(&self, price: u64) -> bool {
        self.tick_size == 0 || price % self.tick_size == 0
    }

    fn make_event(
        &mut self,
        order: &Order,
        status: OrderStatus,
        reason: Option<RejectReason>,
    ) -> OrderEvent {
        let sequence = self.next_sequence();
        OrderEvent {
            event_id: self.next_event_id(),
            order_id: order.id.clone(),
            status,
            reason: reason.map(|r| r.as_str().to_string()),
            remaining_quantity: order.remaining_quantity,
            timestamp_ms: order.updated_at_ms,
            sequence,
        }
    }

    fn reject(
        &mut self,
        request: &SubmitOrderRequest,
        reason: RejectReason,
        now_ms: u64,
    ) -> SubmitResult {
        let mut order = build_order_from_request(request, now_ms);
        order.status = OrderStatus::Rejected;
        order.reason = Some(reason.as_str().to_string());
        order.updated_at_ms = now_ms;
        let event = self.make_event(&order, OrderStatus::Rejected, Some(reason));
        SubmitResult {
            order,
            trades: Vec::new(),
            events: vec![event],
        }
    }

    /// Validate, match and (if resting) post `request`. Always returns a
    /// result — rejection is data, not an error.
    pub fn submit_order(&mut self, request: SubmitOrderRequest, now_ms: u64) -> SubmitResult {
        if request.symbol != self.symbol {
            return self.reject(&request, RejectReason::SymbolMismatch, now_ms);
        }
        if request.user_id.trim().is_empty() {
            return self.reject(&request, RejectReason::MissingUserId, now_ms);
        }
        if request.quantity == 0 {
            return self.reject(&request, RejectReason::InvalidQuantity, now_ms);
        }
        if !self.is_lot_aligned(request.quantity) {
            return self.reject(&request, RejectReason::QuantityNotLotMultiple, now_ms);
        }
        // An absent min_quantity trivially satisfies the minimum-quantity check;
        // min_quantity's own well-formedness is validated further down.
        if let Some(min_quantity) = request.min_quantity {
            if min_quantity > request.quantity {
                return self.reject(&request, RejectReason::QuantityBelowMinimum, now_ms);
            }
        }
        match request.kind {
            OrderKind::Limit => {
                let price = request.price;
                match price {
                    None => return self.reject(&request, RejectReason::InvalidLimitPrice, now_ms),
                    Some(p) if p == 0 => {
                        return self.reject(&request, RejectReason::InvalidLimitPrice, now_ms)
                    }
                    Some(p) if !self.is_tick_aligned(p) => {
                        return self.reject(&request, RejectReason::PriceNotTickMultiple, now_ms)
                    }
                    _ => {}
                }
            }
            OrderKind::Market => {
                if request.price.is_some() {
                    return self.reject(&request, RejectReason::MarketOrderCannotHavePrice, now_ms);
                }
            }
        }
        if let Some(min_quantity) = request.min_quantity {
            if min_quantity == 0 {
                return self.reject(&request, RejectReason::InvalidMinQuantity, now_ms);
            }
            if !self.is_lot_aligned(min_quantity) {
                return self.reject(&request, RejectReason::MinQuantityNotLotMultiple, now_ms);
            }
        }
        if let Some(display_quantity) = request.iceberg_display_quantity {
            if request.kind != OrderKind::Limit {
                return self.reject(&request, RejectReason::IcebergRequiresLimitOrder, now_ms);
            }
            if display_quantity == 0
                || display_quantity > request.quantity
                || !self.is_lot_aligned(display_quantity)
            {
                return self.reject(
                    &request,
                    RejectReason::InvalidIcebergDisplayQuantity,
                    now_ms,
                );
            }
        }

        let time_in_force = request.time_in_force.unwrap_or(match request.kind {
            OrderKind::Market => TimeInForce::Ioc,
            OrderKind::Limit => TimeInForce::Gtc,
        });

        if time_in_force == TimeInForce::Fok {
            let crossable = self.crossable_visible_quantity(request.side, request.price);
            if crossable < request.quantity {
                return self.reject(&request, RejectReason::InsufficientLiquidityForFok, now_ms);
            }
        }

        let mut order = build_order_from_request(&request, now_ms);
        order.time_in_force = time_in_force;
        order.sequence = self.next_sequence();

        let mut trades = Vec::new();
        let mut events = Vec::new();
        let already_terminal = self.match_incoming(&mut order, &mut trades, &mut events, now_ms);

        if already_terminal {
            // Self-trade prevention already set a terminal status (and, for
            // `cancel_both`, emitted the taker's own event) before any trade
            // could occur — the TIF/kind disposition below must not run, or
            // it would overwrite the cancellation (and for GTC, repost the
            // "canceled" order right back onto the book).
        } else if order.remaining_quantity > 0 {
            match (order.kind, order.time_in_force) {
                (OrderKind::Limit, TimeInForce::Gtc) => {
                    order.status = if trades.is_empty() {
                        OrderStatus::New
                    } else {
                        OrderStatus::PartiallyFilled
                    };
                    order.displayed_remaining_quantity =
                        order.display_quantity.min(order.remaining_quantity);
                    order.reserve_remaining_quantity =
                        order.remaining_quantity - order.displayed_remaining_quantity;
                    order.updated_at_ms = now_ms;
                    self.post(&order);
                    let event = self.make_event(&order, order.status, None);
                    events.push(event);
                }
                (OrderKind::Market, _) => {
                    order.status = OrderStatus::Expired;
                    order.reason =
                        Some(RejectReason::MarketOrderUnfilledRemainder.as_str().to_string());
                    order.updated_at_ms = now_ms;
                    let event = self.make_event(
                        &order,
                        OrderStatus::Expired,
                        Some(RejectReason::MarketOrderUnfilledRemainder),
                    );
                    events.push(event);
                }
                _ => {
                    order.status = OrderStatus::Expired;
                    order.reason =
                        Some(RejectReason::TimeInForceUnfilledRemainder.as_str().to_string());
                    order.updated_at_ms = now_ms;
                    let event = self.make_event(
                        &order,
                        OrderStatus::Expired,
                        Some(RejectReason::TimeInForceUnfilledRemainder),
                    );
                    events.push(event);
                }
            }
        } else {
            order.status = OrderStatus::Filled;
            order.displayed_remaining_quantity = 0;
            order.reserve_remaining_quantity = 0;
            order.updated_at_ms = now_ms;
            let event = self.make_event(&order, OrderStatus::Filled, None);
            events.push(event);
        }

        self.orders.insert(order.id.clone(), order.clone());
        SubmitResult { order, trades, events }
    }

    /// Sum of visible quantity on the opposite side that the incoming order
    /// could trade against. Hidden iceberg reserves are deliberately
    /// excluded — the FOK check only ever sees what's displayed.
    fn crossable_visible_quantity(&self, taker_side: Side, taker_price: Option<u64>) -> u64 {
        let opposite = self.side_index(taker_side.opposite());
        let mut total = 0u64;
        for (_, level) in opposite.entries(None) {
            if let Some(limit_price) = taker_price {
                let crosses = match taker_side {
                    Side::Buy => level.price() <= limit_price,
                    Side::Sell => level.price() >= limit_price,
                };
                if !crosses {
                    break;
                }
            }
            total += level.total_visible_quantity();
        }
        total
    }

    fn level_crosses(taker_side: Side, taker_price: Option<u64>, level_price: u64) -> bool {
        match taker_price {
            None => true,
            Some(limit) => match taker_side {
                Side::Buy => level_price <= limit,
                Side::Sell => level_price >= limit,
            },
        }
    }

    /// Matches `taker` against resting liquidity until it is filled, the
    /// book stops crossing, or self-trade prevention cuts it short. Returns
    /// `true` when the taker already has a terminal status and event on
    /// return — `submit_order`'s TIF/kind disposition must be skipped in
    /// that case, since the decision has already been made here.
    fn match_incoming(
        &mut self,
        taker: &mut Order,
        trades: &mut Vec<Trade>,
        events: &mut Vec<OrderEvent>,
        now_ms: u64,
    ) -> bool {
        loop {
            if taker.remaining_quantity == 0 {
                break;
            }
            let opposite_side = taker.side.opposite();
            let best = match self.side_index(opposite_side).first() {
                Some((key, level)) => (key, level.price()),
                None => break,
            };
            let (best_key, best_price) = best;
            if !Self::level_crosses(taker.side, taker.price, best_price) {
                break;
            }

            let (maker_handle, maker_id, maker_visible) = {
                let level = self.side_index(opposite_side).get(best_key).unwrap();
                match level.front() {
                    Some(f) => f,
                    None => {
                        self.side_index_mut(opposite_side).delete(best_key);
                        continue;
                    }
                }
            };

            let mut maker = self.orders.get(&maker_id).cloned().unwrap();

            if taker.user_id == maker.user_id && taker.self_trade_prevention != SelfTradePrevention::None
            {
                match taker.self_trade_prevention {
                    SelfTradePrevention::CancelOldest => {
                        if let Some(maker_event) = self.cancel_resting(
                            &maker.id,
                            RejectReason::SelfTradePreventionCancelOldest,
                            now_ms,
                        ) {
                            events.push(maker_event);
                        }
                        continue;
                    }
                    SelfTradePrevention::CancelNewest => {
                        taker.status = OrderStatus::Canceled;
                        taker.reason = Some(
                            RejectReason::SelfTradePreventionCancelNewest
                                .as_str()
                                .to_string(),
                        );
                        taker.updated_at_ms = now_ms;
                        let event = self.make_event(
                            taker,
                            OrderStatus::Canceled,
                            Some(RejectReason::SelfTradePreventionCancelNewest),
                        );
                        events.push(event);
                        return true;
                    }
                    SelfTradePrevention::CancelBoth => {
                        let maker_event = self.cancel_resting(
                            &maker.id,
                            RejectReason::SelfTradePreventionCancelBoth,
                            now_ms,
                        );
                        taker.status = OrderStatus::Canceled;
                        taker.reason = Some(
                            RejectReason::SelfTradePreventionCancelBoth.as_str().to_string(),
                        );
                        taker.updated_at_ms = now_ms;
                        let event = self.make_event(
                            taker,
                            OrderStatus::Canceled,
                            Some(RejectReason::SelfTradePreventionCancelBoth),
                        );
                        events.push(event);
                        if let Some(maker_event) = maker_event {
                            events.push(maker_event);
                        }
                        return true;
                    }
                    SelfTradePrevention::None => unreachable!(),
                }
            }

            let executable = taker.remaining_quantity.min(maker_visible);
            if executable == 0 {
                break;
            }

            let trade_id = self.trade_log.next_id();
            let sequence = self.next_sequence();
            let trade = Trade::new(
                trade_id,
                self.symbol.clone(),
                best_price,
                executable,
                taker.side,
                taker.id.clone(),
                maker.id.clone(),
                now_ms,
                sequence,
            );
            trace!(symbol = %self.symbol, price = best_price, quantity = executable, "trade executed");
            self.trade_log.record(trade.clone());
            trades.push(trade);

            taker.remaining_quantity -= executable;
            maker.remaining_quantity -= executable;
            maker.displayed_remaining_quantity -= executable;
            maker.updated_at_ms = now_ms;

            {
                let level = self
                    .side_index_mut(opposite_side)
                    .get_mut(best_key)
                    .unwrap();
                level.reduce_visible_quantity(maker_handle, executable);
            }

            if maker.remaining_quantity == 0 {
                maker.status = OrderStatus::Filled;
                {
                    let level = self
                        .side_index_mut(opposite_side)
                        .get_mut(best_key)
                        .unwrap();
                    level.remove(maker_handle);
                    let empty = level.is_empty();
                    if empty {
                        self.side_index_mut(opposite_side).delete(best_key);
                    }
                }
                self.orders_by_id.remove(&maker.id);
                let event = self.make_event(&maker, OrderStatus::Filled, None);
                events.push(event);
            } else if maker.displayed_remaining_quantity == 0 && maker.reserve_remaining_quantity > 0
            {
                let refill = maker.display_quantity.min(maker.reserve_remaining_quantity);
                maker.reserve_remaining_quantity -= refill;
                maker.displayed_remaining_quantity = refill;
                maker.status = OrderStatus::PartiallyFilled;
                {
                    let level = self
                        .side_index_mut(opposite_side)
                        .get_mut(best_key)
                        .unwrap();
                    level.replenish_and_move_to_tail(maker_handle, refill);
                }
                let event = self.make_event(&maker, OrderStatus::PartiallyFilled, None);
                events.push(event);
            } else {
                maker.status = OrderStatus::PartiallyFilled;
            }

            self.orders.insert(maker.id.clone(), maker);
        }
        false
    }

    /// Remove a resting maker from the book mid-match and mark it canceled,
    /// returning the event for the transition. The book has no broadcast
    /// channel of its own, so folding this into the caller's `events` vector
    /// is the only way the cancellation ever becomes observable.
    fn cancel_resting(
        &mut self,
        order_id: &OrderId,
        reason: RejectReason,
        now_ms: u64,
    ) -> Option<OrderEvent> {
        let order_ref = self.orders_by_id.remove(order_id)?;
        {
            let level = self
                .side_index_mut(order_ref.side)
                .get_mut(order_ref.sort_key)
                .unwrap();
            level.remove(order_ref.node);
            let empty = level.is_empty();
            if empty {
                self.side_index_mut(order_ref.side).delete(order_ref.sort_key);
            }
        }
        let order = self.orders.get_mut(order_id)?;
        order.status = OrderStatus::Canceled;
        order.reason = Some(reason.as_str().to_string());
        order.updated_at_ms = now_ms;
        let snapshot = order.clone();
        Some(self.make_event(&snapshot, OrderStatus::Canceled, Some(reason)))
    }

    fn post(&mut self, order: &Order) {
        let sort_key = Self::sort_key(order.side, order.price.expect("posted order has price"));
        let side_index = self.side_index_mut(order.side);
        if side_index.get(sort_key).is_none() {
            side_index.upsert(
                sort_key,
                PriceLevel::new(order.price.expect("posted order has price")),
            );
        }
        let level = side_index.get_mut(sort_key).unwrap();
        let node = level.append(order.id.clone(), order.displayed_remaining_quantity);
        self.orders_by_id.insert(
            order.id.clone(),
            OrderRef {
                side: order.side,
                sort_key,
                node,
            },
        );
    }

    /// Cancel a resting order by id, optionally scoped to a user.
    pub fn cancel_order(
        &mut self,
        order_id: &OrderId,
        user_id: Option<&str>,
        now_ms: u64,
    ) -> CancelResult {
        let Some(order_ref) = self.orders_by_id.get(order_id).copied() else {
            return CancelResult {
                canceled: false,
                order: None,
                reason: Some(RejectReason::OrderNotFound),
                event: None,
            };
        };
        if let Some(uid) = user_id {
            let owner = &self.orders.get(order_id).unwrap().user_id;
            if owner != uid {
                return CancelResult {
                    canceled: false,
                    order: None,
                    reason: Some(RejectReason::UserMismatch),
                    event: None,
                };
            }
        }

        {
            let level = self
                .side_index_mut(order_ref.side)
                .get_mut(order_ref.sort_key)
                .unwrap();
            level.remove(order_ref.node);
            let empty = level.is_empty();
            if empty {
                self.side_index_mut(order_ref.side).delete(order_ref.sort_key);
            }
        }
        self.orders_by_id.remove(order_id);

        let order = self.orders.get_mut(order_id).unwrap();
        order.status = OrderStatus::Canceled;
        order.reason = Some(RejectReason::CanceledByUser.as_str().to_string());
        order.updated_at_ms = now_ms;
        let order_snapshot = order.clone();
        let event = self.make_event(&order_snapshot, OrderStatus::Canceled, Some(RejectReason::CanceledByUser));

        CancelResult {
            canceled: true,
            order: Some(order_snapshot),
            reason: None,
            event: Some(event),
        }
    }

    /// Depth-capped view of both sides.
    pub fn snapshot(&self, depth: usize) -> OrderBookSnapshot {
        OrderBookSnapshot {
            symbol: self.symbol.clone(),
            sequence: self.sequence,
            bids: self.depth_rows(Side::Buy, depth),
            asks: self.depth_rows(Side::Sell, depth),
        }
    }

    fn depth_rows(&self, side: Side, depth: usize) -> Vec<DepthRow> {
        self.side_index(side)
            .entries(Some(depth))
            .into_iter()
            .map(|(_, level)| DepthRow {
                price: level.price(),
                quantity: level.total_visible_quantity(),
                order_count: level.order_count(),
            })
            .collect()
    }

    pub fn depth(&self, depth: usize) -> OrderBookSnapshot {
        self.snapshot(depth)
    }

    pub fn trades(&mut self, limit: usize) -> Vec<Trade> {
        self.trade_log.recent(limit)
    }

    pub fn order(&self, order_id: &OrderId) -> Option<&Order> {
        self.orders.get(order_id)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

fn build_order_from_request(request: &SubmitOrderRequest, now_ms: u64) -> Order {
    let id = request
        .id
        .clone()
        .map(OrderId::from)
        .unwrap_or_else(OrderId::new);
    let display_quantity = request.iceberg_display_quantity.unwrap_or(request.quantity);
    Order {
        id,
        client_order_id: request.client_order_id.clone(),
        // Overwritten with the book's own counter once the order is accepted
        // (see `submit_order`); orders rejected before acceptance keep 0.
        sequence: 0,
        symbol: request.symbol.clone(),
        user_id: request.user_id.clone(),
        side: request.side,
        kind: request.kind,
        time_in_force: request.time_in_force.unwrap_or(TimeInForce::Gtc),
        status: OrderStatus::New,
        reason: None,
        original_quantity: request.quantity,
        remaining_quantity: request.quantity,
        display_quantity,
        displayed_remaining_quantity: display_quantity.min(request.quantity),
        reserve_remaining_quantity: request.quantity.saturating_sub(display_quantity),
        min_quantity: request.min_quantity,
        price: request.price,
        self_trade_prevention: request.self_trade_prevention.unwrap_or_default(),
        created_at_ms: now_ms,
        updated_at_ms: now_ms,
    }
}
