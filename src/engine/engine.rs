//! Multi-symbol matching engine: orchestrates per-symbol books, the command
//! log, stats, and event fan-out.

use crate::command_log::CommandLog;
use crate::engine::events::{CancelResultPayload, EngineEvent};
use crate::engine::stats::{EngineStats, StatsRecorder};
use crate::orderbook::{
    CancelRequest, OrderBook, OrderBookError, OrderBookSnapshot, OrderId, RejectReason,
    SubmitOrderRequest, Trade,
};
use crate::rng::DeterministicRng;
use std::collections::HashMap;
use std::time::Instant;
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

const EVENT_CHANNEL_CAPACITY: usize = 4_096;

/// Per-symbol configuration used when the engine constructs its books.
#[derive(Debug, Clone)]
pub struct SymbolConfig {
    pub symbol: String,
    pub lot_size: u64,
    pub tick_size: u64,
}

/// Result of `submit_order`.
pub struct SubmitResult {
    pub order: crate::orderbook::Order,
    pub trades: Vec<Trade>,
    pub events: Vec<crate::orderbook::OrderEvent>,
}

/// Result of `cancel_order`.
pub struct CancelResult {
    pub canceled: bool,
    pub order: Option<crate::orderbook::Order>,
    pub reason: Option<RejectReason>,
}

/// Outcome of a replay pass.
pub use crate::command_log::ReplayReport;

/// Orchestrates a fixed set of per-symbol order books, a command log, stats,
/// and a broadcast fan-out bus. Owns all mutable state directly — callers
/// that need to share an engine across tasks wrap it in a
/// `tokio::sync::Mutex`, per the crate's single-logical-thread concurrency
/// model.
pub struct MatchingEngine {
    books: HashMap<String, OrderBook>,
    order_symbol: HashMap<OrderId, String>,
    stats: StatsRecorder,
    command_log: CommandLog,
    events: broadcast::Sender<EngineEvent>,
    rng: DeterministicRng,
}

impl MatchingEngine {
    pub fn new(symbols: Vec<SymbolConfig>, command_log: CommandLog, seed: u64) -> Self {
        let rng = DeterministicRng::new(seed);
        let mut books = HashMap::new();
        for cfg in symbols {
            let book_rng = rng.derive(&format!("book:{}", cfg.symbol));
            books.insert(
                cfg.symbol.clone(),
                OrderBook::new(cfg.symbol.clone(), cfg.lot_size, cfg.tick_size, book_rng),
            );
        }
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            books,
            order_symbol: HashMap::new(),
            stats: StatsRecorder::new(),
            command_log,
            events,
            rng,
        }
    }

    pub fn supported_symbols(&self) -> Vec<String> {
        self.books.keys().cloned().collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    fn emit(&self, event: EngineEvent) {
        // A lagging or absent subscriber is not an engine failure: fan-out
        // is best-effort.
        if self.events.send(event).is_err() {
            warn!("engine event fan-out: no active subscribers");
        }
    }

    /// Submit an order. Appends the command to the log before applying it
    /// (so replay is exact), dispatches to the book, updates counters, and
    /// fans out events.
    pub fn submit_order(
        &mut self,
        request: SubmitOrderRequest,
        now_ms: u64,
    ) -> Result<SubmitResult, OrderBookError> {
        let Some(book) = self.books.get_mut(&request.symbol) else {
            return Err(OrderBookError::UnknownSymbol(request.symbol.clone()));
        };

        let command_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_value(&request).unwrap_or(serde_json::Value::Null);
        if let Err(e) = self.command_log.append_command(&command_id, now_ms, payload) {
            warn!(error = %e, "command log append failed");
        }

        let started = Instant::now();
        let result = book.submit_order(request, now_ms);
        self.stats
            .record_submission(result.trades.len(), started.elapsed());

        match result.order.status {
            crate::orderbook::OrderStatus::Rejected => self.stats.record_rejected(),
            crate::orderbook::OrderStatus::Expired => self.stats.record_expired(),
            _ => {}
        }

        if matches!(
            result.order.status,
            crate::orderbook::OrderStatus::New | crate::orderbook::OrderStatus::PartiallyFilled
        ) {
            self.order_symbol
                .insert(result.order.id.clone(), result.order.symbol.clone());
        }

        let snapshot = book.snapshot(usize::MAX);
        for trade in &result.trades {
            self.emit(EngineEvent::Trade(trade.clone()));
        }
        self.emit(EngineEvent::OrderBook {
            symbol: snapshot.symbol.clone(),
            snapshot,
        });
        for order_event in &result.events {
            self.emit(EngineEvent::OrderResult {
                order_event: order_event.clone(),
            });
        }

        let event_payload = serde_json::json!({
            "commandId": command_id,
            "orderId": result.order.id.0,
            "status": result.order.status,
        });
        if let Err(e) = self.command_log.append_event(now_ms, event_payload) {
            warn!(error = %e, "command log event append failed");
        }

        info!(order_id = %result.order.id, symbol = %result.order.symbol, status = ?result.order.status, "order submitted");

        Ok(SubmitResult {
            order: result.order,
            trades: result.trades,
            events: result.events,
        })
    }

    /// Cancel an order, resolving its symbol from `symbol` or the secondary
    /// `order_id -> symbol` map.
    pub fn cancel_order(&mut self, request: CancelRequest, now_ms: u64) -> CancelResult {
        let order_id = OrderId::from(request.order_id.clone());
        let symbol = request
            .symbol
            .clone()
            .or_else(|| self.order_symbol.get(&order_id).cloned());

        let Some(symbol) = symbol else {
            return CancelResult {
                canceled: false,
                order: None,
                reason: Some(RejectReason::OrderSymbolNotFound),
            };
        };

        let Some(book) = self.books.get_mut(&symbol) else {
            return CancelResult {
                canceled: false,
                order: None,
                reason: Some(RejectReason::OrderSymbolNotFound),
            };
        };

        let command_id = Uuid::new_v4().to_string();
        let payload = serde_json::to_value(&request).unwrap_or(serde_json::Value::Null);
        if let Err(e) = self.command_log.append_command(&command_id, now_ms, payload) {
            warn!(error = %e, "command log append failed");
        }

        let started = Instant::now();
        let result = book.cancel_order(&order_id, request.user_id.as_deref(), now_ms);
        if result.canceled {
            self.stats.record_cancel(started.elapsed());
            self.order_symbol.remove(&order_id);
            if let Some(event) = &result.event {
                self.emit(EngineEvent::OrderResult {
                    order_event: event.clone(),
                });
            }
        }
        self.emit(EngineEvent::CancelResult(CancelResultPayload {
            order_id: request.order_id.clone(),
            canceled: result.canceled,
            reason: result.reason.map(|r| r.as_str().to_string()),
        }));

        let event_payload = serde_json::json!({
            "commandId": command_id,
            "orderId": request.order_id,
            "canceled": result.canceled,
        });
        if let Err(e) = self.command_log.append_event(now_ms, event_payload) {
            warn!(error = %e, "command log event append failed");
        }

        info!(order_id = %request.order_id, canceled = result.canceled, "cancel processed");

        CancelResult {
            canceled: result.canceled,
            order: result.order,
            reason: result.reason,
        }
    }

    /// Re-apply every command in the log to this engine's current state,
    /// without re-persisting or re-appending to the log. Fan-out events
    /// *are* re-emitted so downstream snapshot consumers stay consistent.
    pub fn replay_from_command_log(&mut self) -> ReplayReport {
        let mut report = ReplayReport::default();
        let entries = match self.command_log.read_commands() {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "replay: could not read command log");
                return report;
            }
        };
        for entry in entries {
            match serde_json::from_value::<SubmitOrderRequest>(entry.payload.clone()) {
                Ok(request) => {
                    if let Some(book) = self.books.get_mut(&request.symbol) {
                        let result = book.submit_order(request, entry.timestamp_ms);
                        if matches!(
                            result.order.status,
                            crate::orderbook::OrderStatus::New
                                | crate::orderbook::OrderStatus::PartiallyFilled
                        ) {
                            self.order_symbol
                                .insert(result.order.id.clone(), result.order.symbol.clone());
                        }
                        for trade in &result.trades {
                            self.emit(EngineEvent::Trade(trade.clone()));
                        }
                        for order_event in &result.events {
                            self.emit(EngineEvent::OrderResult {
                                order_event: order_event.clone(),
                            });
                        }
                        report.applied += 1;
                    } else {
                        report.skipped += 1;
                    }
                }
                Err(_) => match serde_json::from_value::<CancelRequest>(entry.payload) {
                    Ok(request) => {
                        let order_id = OrderId::from(request.order_id.clone());
                        let symbol = request
                            .symbol
                            .clone()
                            .or_else(|| self.order_symbol.get(&order_id).cloned());
                        if let Some(symbol) = symbol {
                            if let Some(book) = self.books.get_mut(&symbol) {
                                let result = book.cancel_order(
                                    &order_id,
                                    request.user_id.as_deref(),
                                    entry.timestamp_ms,
                                );
                                if result.canceled {
                                    self.order_symbol.remove(&order_id);
                                    if let Some(event) = &result.event {
                                        self.emit(EngineEvent::OrderResult {
                                            order_event: event.clone(),
                                        });
                                    }
                                }
                                report.applied += 1;
                                continue;
                            }
                        }
                        report.skipped += 1;
                    }
                    Err(_) => {
                        warn!("replay: command payload did not match any known command shape");
                        report.skipped += 1;
                    }
                },
            }
        }
        report
    }

    pub fn snapshot(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, OrderBookError> {
        self.books
            .get(symbol)
            .map(|b| b.snapshot(depth))
            .ok_or_else(|| OrderBookError::UnknownSymbol(symbol.to_string()))
    }

    pub fn depth(&self, symbol: &str, depth: usize) -> Result<OrderBookSnapshot, OrderBookError> {
        self.snapshot(symbol, depth)
    }

    pub fn trades(&mut self, symbol: &str, limit: usize) -> Result<Vec<Trade>, OrderBookError> {
        self.books
            .get_mut(symbol)
            .map(|b| b.trades(limit))
            .ok_or_else(|| OrderBookError::UnknownSymbol(symbol.to_string()))
    }

    pub fn stats(&self) -> EngineStats {
        self.stats.snapshot()
    }

    pub fn derive_rng(&self, label: &str) -> DeterministicRng {
        self.rng.derive(label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orderbook::{OrderKind, OrderStatus, Side, TimeInForce};
    use tempfile::tempdir;

    fn engine(dir: &std::path::Path) -> MatchingEngine {
        let log = CommandLog::new(dir.join("commands.jsonl"));
        MatchingEngine::new(
            vec![SymbolConfig {
                symbol: "ETH-USD".to_string(),
                lot_size: 1,
                tick_size: 1,
            }],
            log,
            42,
        )
    }

    fn limit_request(id: &str, user: &str, side: Side, qty: u64, price: u64) -> SubmitOrderRequest {
        SubmitOrderRequest {
            id: Some(id.to_string()),
            client_order_id: None,
            symbol: "ETH-USD".to_string(),
            user_id: user.to_string(),
            side,
            kind: OrderKind::Limit,
            quantity: qty,
            price: Some(price),
            time_in_force: Some(TimeInForce::Gtc),
            min_quantity: None,
            iceberg_display_quantity: None,
            self_trade_prevention: None,
        }
    }

    #[test]
    fn unknown_symbol_is_a_typed_error() {
        let dir = tempdir().unwrap();
        let mut e = engine(dir.path());
        let mut req = limit_request("a", "u1", Side::Buy, 1, 1);
        req.symbol = "NOPE".to_string();
        assert!(e.submit_order(req, 0).is_err());
    }

    #[test]
    fn cancel_without_symbol_resolves_via_secondary_map() {
        let dir = tempdir().unwrap();
        let mut e = engine(dir.path());
        e.submit_order(limit_request("a", "u1", Side::Buy, 5, 100), 0)
            .unwrap();
        let result = e.cancel_order(
            CancelRequest {
                order_id: "a".to_string(),
                user_id: None,
                symbol: None,
            },
            0,
        );
        assert!(result.canceled);
    }

    #[test]
    fn cancel_unknown_order_reports_symbol_not_found() {
        let dir = tempdir().unwrap();
        let mut e = engine(dir.path());
        let result = e.cancel_order(
            CancelRequest {
                order_id: "ghost".to_string(),
                user_id: None,
                symbol: None,
            },
            0,
        );
        assert!(!result.canceled);
        assert_eq!(result.reason, Some(RejectReason::OrderSymbolNotFound));
    }

    #[test]
    fn replay_reproduces_book_state() {
        let dir = tempdir().unwrap();
        let mut e1 = engine(dir.path());
        e1.submit_order(limit_request("a", "u1", Side::Buy, 5, 100), 0)
            .unwrap();
        e1.submit_order(limit_request("b", "u2", Side::Sell, 5, 100), 1)
            .unwrap();
        let live_snapshot = e1.snapshot("ETH-USD", 10).unwrap();

        let log2 = CommandLog::new(dir.path().join("commands.jsonl"));
        let mut e2 = MatchingEngine::new(
            vec![SymbolConfig {
                symbol: "ETH-USD".to_string(),
                lot_size: 1,
                tick_size: 1,
            }],
            log2,
            42,
        );
        let report = e2.replay_from_command_log();
        assert_eq!(report.skipped, 0);
        let replayed_snapshot = e2.snapshot("ETH-USD", 10).unwrap();
        assert_eq!(live_snapshot.bids.len(), replayed_snapshot.bids.len());
        assert_eq!(live_snapshot.asks.len(), replayed_snapshot.asks.len());
    }

    #[test]
    fn replay_omits_orders_canceled_before_the_snapshot() {
        let dir = tempdir().unwrap();
        let mut e1 = engine(dir.path());
        e1.submit_order(limit_request("a", "u1", Side::Buy, 5, 100), 0)
            .unwrap();
        let cancel_result = e1.cancel_order(
            CancelRequest {
                order_id: "a".to_string(),
                user_id: None,
                symbol: None,
            },
            1,
        );
        assert!(cancel_result.canceled);
        let live_snapshot = e1.snapshot("ETH-USD", 10).unwrap();
        assert!(live_snapshot.bids.is_empty());

        let log2 = CommandLog::new(dir.path().join("commands.jsonl"));
        let mut e2 = MatchingEngine::new(
            vec![SymbolConfig {
                symbol: "ETH-USD".to_string(),
                lot_size: 1,
                tick_size: 1,
            }],
            log2,
            42,
        );
        let report = e2.replay_from_command_log();
        assert_eq!(report.skipped, 0);
        let replayed_snapshot = e2.snapshot("ETH-USD", 10).unwrap();
        assert!(replayed_snapshot.bids.is_empty());
    }

    #[test]
    fn rejected_order_increments_rejected_counter() {
        let dir = tempdir().unwrap();
        let mut e = engine(dir.path());
        let mut req = limit_request("a", "u1", Side::Buy, 5, 100);
        req.symbol = "ETH-USD".to_string();
        req.user_id = "".to_string();
        let result = e.submit_order(req, 0).unwrap();
        assert_eq!(result.order.status, OrderStatus::Rejected);
        assert_eq!(e.stats().orders_rejected, 1);
    }
}
