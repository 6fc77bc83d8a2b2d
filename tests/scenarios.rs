//! Black-box end-to-end scenarios against the public `MatchingEngine` API,
//! with the literal setups and expected values.

use clob_core::engine::{MatchingEngine, SymbolConfig};
use clob_core::mempool::{EngineCommand, MempoolConfig, TxStatus, VirtualMempool};
use clob_core::orderbook::{
    CancelRequest, OrderKind, OrderStatus, SelfTradePrevention, Side, SubmitOrderRequest,
    TimeInForce,
};
use clob_core::command_log::CommandLog;

fn engine(dir: &std::path::Path) -> MatchingEngine {
    MatchingEngine::new(
        vec![SymbolConfig {
            symbol: "ETH-USD".to_string(),
            lot_size: 1,
            tick_size: 1,
        }],
        CommandLog::new(dir.join("commands.jsonl")),
        1,
    )
}

fn limit(id: &str, user: &str, side: Side, qty: u64, price: u64) -> SubmitOrderRequest {
    SubmitOrderRequest {
        id: Some(id.to_string()),
        client_order_id: None,
        symbol: "ETH-USD".to_string(),
        user_id: user.to_string(),
        side,
        kind: OrderKind::Limit,
        quantity: qty,
        price: Some(price),
        time_in_force: None,
        min_quantity: None,
        iceberg_display_quantity: None,
        self_trade_prevention: None,
    }
}

fn market(id: &str, user: &str, side: Side, qty: u64) -> SubmitOrderRequest {
    SubmitOrderRequest {
        id: Some(id.to_string()),
        client_order_id: None,
        symbol: "ETH-USD".to_string(),
        user_id: user.to_string(),
        side,
        kind: OrderKind::Market,
        quantity: qty,
        price: None,
        time_in_force: None,
        min_quantity: None,
        iceberg_display_quantity: None,
        self_trade_prevention: None,
    }
}

#[test]
fn scenario_1_market_ioc_buy_sweeps_two_resting_sells() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    e.submit_order(limit("maker-a", "u1", Side::Sell, 5, 101), 0).unwrap();
    e.submit_order(limit("maker-b", "u2", Side::Sell, 5, 101), 0).unwrap();
    let result = e.submit_order(market("taker", "u3", Side::Buy, 6), 0).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].maker_order_id.0, "maker-a");
    assert_eq!(result.trades[0].quantity, 5);
    assert_eq!(result.trades[0].price, 101);
    assert_eq!(result.trades[1].maker_order_id.0, "maker-b");
    assert_eq!(result.trades[1].quantity, 1);
    assert_eq!(result.order.status, OrderStatus::Filled);

    let depth = e.depth("ETH-USD", 10).unwrap();
    assert_eq!(depth.best_ask(), Some(101));
    assert_eq!(depth.asks[0].quantity, 4);
}

#[test]
fn scenario_2_limit_ioc_buy_partial_fill() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    e.submit_order(limit("maker", "u1", Side::Sell, 10, 120), 0).unwrap();
    let mut req = limit("taker", "u2", Side::Buy, 3, 130);
    req.time_in_force = Some(TimeInForce::Ioc);
    let result = e.submit_order(req, 0).unwrap();

    assert_eq!(result.trades.len(), 1);
    assert_eq!(result.trades[0].quantity, 3);
    assert_eq!(result.trades[0].price, 120);
    assert_eq!(result.order.status, OrderStatus::Filled);

    let depth = e.depth("ETH-USD", 10).unwrap();
    assert_eq!(depth.asks[0].quantity, 7);
}

#[test]
fn scenario_3_fok_insufficient_liquidity_rejects_without_trading() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    e.submit_order(limit("maker", "u1", Side::Sell, 4, 100), 0).unwrap();
    let mut req = limit("taker", "u2", Side::Buy, 5, 100);
    req.time_in_force = Some(TimeInForce::Fok);
    let result = e.submit_order(req, 0).unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.order.status, OrderStatus::Rejected);
    assert_eq!(
        result.order.reason.as_deref(),
        Some("insufficient_liquidity_for_fok")
    );
    let depth = e.depth("ETH-USD", 10).unwrap();
    assert_eq!(depth.asks[0].quantity, 4);
}

#[test]
fn scenario_4_iceberg_replenishment_keeps_reserve_hidden() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    let mut maker = limit("iceberg", "u1", Side::Sell, 10, 100);
    maker.iceberg_display_quantity = Some(3);
    e.submit_order(maker, 0).unwrap();
    let result = e.submit_order(market("taker", "u2", Side::Buy, 4), 0).unwrap();

    assert_eq!(result.trades.len(), 2);
    assert_eq!(result.trades[0].quantity, 3);
    assert_eq!(result.trades[1].quantity, 1);

    let depth = e.depth("ETH-USD", 10).unwrap();
    assert_eq!(depth.asks[0].quantity, 2);
}

#[test]
fn scenario_5_self_trade_prevention_cancel_oldest() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    let mut maker = limit("maker", "same-user", Side::Sell, 5, 101);
    maker.self_trade_prevention = Some(SelfTradePrevention::CancelOldest);
    e.submit_order(maker, 0).unwrap();

    let mut taker = limit("taker", "same-user", Side::Buy, 5, 101);
    taker.time_in_force = Some(TimeInForce::Ioc);
    taker.self_trade_prevention = Some(SelfTradePrevention::CancelOldest);
    let result = e.submit_order(taker, 0).unwrap();

    assert!(result.trades.is_empty());
    assert_eq!(result.order.status, OrderStatus::Expired);
    let depth = e.depth("ETH-USD", 10).unwrap();
    assert!(depth.asks.is_empty());
}

#[tokio::test]
async fn scenario_6_mempool_gas_priority_inclusion_across_two_blocks() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    let mempool = VirtualMempool::new(MempoolConfig {
        block_interval_ms: 20,
        max_transactions_per_block: 1,
        default_confirmations: 1,
        confirmation_probability_per_block: 1.0,
        seed: 1,
    });

    let low = EngineCommand::SubmitOrder(limit("low", "u1", Side::Buy, 1, 100));
    let high = EngineCommand::SubmitOrder(limit("high", "u2", Side::Buy, 1, 100));
    let low_handle = mempool.submit(low, 1000, 0, None, 0).await;
    let high_handle = mempool.submit(high, 2000, 0, None, 0).await;

    mempool.tick(&mut e).await;
    let high_tx = mempool.get(&high_handle.tx_id).await.unwrap();
    assert_eq!(high_tx.status, TxStatus::Included);
    let low_tx = mempool.get(&low_handle.tx_id).await.unwrap();
    assert_eq!(low_tx.status, TxStatus::Pending);

    mempool.tick(&mut e).await;
    let low_tx = mempool.get(&low_handle.tx_id).await.unwrap();
    assert_eq!(low_tx.status, TxStatus::Included);

    mempool.tick(&mut e).await;
    let high_outcome = high_handle.confirmed.await.unwrap();
    let low_outcome = low_handle.confirmed.await.unwrap();
    let _ = (high_outcome, low_outcome);
    assert_eq!(mempool.get("tx-1").await.unwrap().status, TxStatus::Confirmed);
    assert_eq!(mempool.get("tx-2").await.unwrap().status, TxStatus::Confirmed);
}

#[test]
fn cancel_by_id_without_symbol_hint_uses_secondary_map() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    e.submit_order(limit("a", "u1", Side::Buy, 5, 100), 0).unwrap();
    let result = e.cancel_order(
        CancelRequest {
            order_id: "a".to_string(),
            user_id: None,
            symbol: None,
        },
        0,
    );
    assert!(result.canceled);
    let depth = e.depth("ETH-USD", 10).unwrap();
    assert!(depth.bids.is_empty());
}

#[test]
fn boundary_exactly_one_lot_and_one_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    let result = e.submit_order(limit("a", "u1", Side::Buy, 1, 1), 0).unwrap();
    assert_eq!(result.order.status, OrderStatus::New);
}

#[test]
fn boundary_empty_book_market_ioc_expires() {
    let dir = tempfile::tempdir().unwrap();
    let mut e = engine(dir.path());
    let result = e.submit_order(market("taker", "u1", Side::Buy, 1), 0).unwrap();
    assert_eq!(result.order.status, OrderStatus::Expired);
}
