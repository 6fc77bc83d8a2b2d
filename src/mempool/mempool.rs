//! Virtual mempool: gas-priority inclusion, block-cadence ticking, and
//! probabilistic confirmation.
//!
//! State lives behind a single `tokio::sync::Mutex`, mirroring the engine's
//! own single-logical-thread posture (§5): submissions, ticks, and reads all
//! serialize against the same guard. A tick is reentrancy-guarded with an
//! `AtomicBool` so a slow tick never overlaps the next timer fire — the
//! overlapping fire is simply skipped.

use crate::engine::MatchingEngine;
use crate::mempool::tx::{EngineCommand, TxOutcome, TxStatus, VirtualTransaction};
use crate::rng::DeterministicRng;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{oneshot, Mutex};
use tracing::{info, warn};

/// The forced-confirmation floor's slack, in blocks past
/// `required_confirmations`, past which a transaction confirms unconditionally
/// even if the probabilistic draw keeps missing. "+5" is an arbitrary but
/// literal escape hatch rather than a derived constant.
const FORCED_CONFIRMATION_SLACK_BLOCKS: u64 = 5;

#[derive(Debug, Clone)]
pub struct MempoolConfig {
    pub block_interval_ms: u64,
    pub max_transactions_per_block: usize,
    pub default_confirmations: u64,
    pub confirmation_probability_per_block: f64,
    pub seed: u64,
}

struct MempoolState {
    pending: VecDeque<VirtualTransaction>,
    all: HashMap<String, VirtualTransaction>,
    waiters: HashMap<String, oneshot::Sender<TxOutcome>>,
    block_number: u64,
}

/// A handle returned from `submit`: the transaction's id and a future that
/// resolves once the tx reaches a terminal state (`confirmed` or `failed`).
/// Dropping the receiver half does not remove the transaction — it keeps
/// progressing through the state machine; only the notification is lost.
pub struct SubmitHandle {
    pub tx_id: String,
    pub confirmed: oneshot::Receiver<TxOutcome>,
}

pub struct VirtualMempool {
    config: MempoolConfig,
    state: Mutex<MempoolState>,
    ticking: AtomicBool,
    next_tx_id: AtomicU64,
    rng: Mutex<DeterministicRng>,
}

impl VirtualMempool {
    pub fn new(config: MempoolConfig) -> Self {
        let rng = DeterministicRng::new(config.seed).derive("mempool");
        Self {
            state: Mutex::new(MempoolState {
                pending: VecDeque::new(),
                all: HashMap::new(),
                waiters: HashMap::new(),
                block_number: 0,
            }),
            ticking: AtomicBool::new(false),
            next_tx_id: AtomicU64::new(1),
            rng: Mutex::new(rng),
            config,
        }
    }

    /// Submit a transaction. Assigns a `tx_id`, records submission time, and
    /// queues it pending inclusion.
    pub async fn submit(
        &self,
        payload: EngineCommand,
        gas_price: u128,
        max_priority_fee_per_gas: u128,
        confirmations: Option<u64>,
        now_ms: u64,
    ) -> SubmitHandle {
        let tx_id = format!("tx-{}", self.next_tx_id.fetch_add(1, Ordering::Relaxed));
        let tx = VirtualTransaction {
            tx_id: tx_id.clone(),
            status: TxStatus::Pending,
            submitted_at_ms: now_ms,
            included_block_number: None,
            confirmed_block_number: None,
            gas_price,
            max_priority_fee_per_gas,
            required_confirmations: confirmations.unwrap_or(self.config.default_confirmations),
            payload,
            result: None,
            error: None,
        };
        let (tx_sender, rx) = oneshot::channel();
        let mut state = self.state.lock().await;
        state.all.insert(tx_id.clone(), tx.clone());
        state.pending.push_back(tx);
        state.waiters.insert(tx_id.clone(), tx_sender);
        SubmitHandle {
            tx_id,
            confirmed: rx,
        }
    }

    /// Run one block tick: advance the virtual block, include the
    /// highest-effective-gas pending transactions, execute them against
    /// `engine`, then sweep included transactions for confirmation. Skipped
    /// entirely (logged, not an error) if the previous tick hasn't finished.
    pub async fn tick(&self, engine: &mut MatchingEngine) {
        if self
            .ticking
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("mempool tick skipped: previous tick still running");
            return;
        }
        self.run_tick(engine).await;
        self.ticking.store(false, Ordering::Release);
    }

    async fn run_tick(&self, engine: &mut MatchingEngine) {
        let mut state = self.state.lock().await;
        state.block_number += 1;
        let block_number = state.block_number;

        // --- include phase ---
        let mut pending: Vec<VirtualTransaction> = state.pending.drain(..).collect();
        pending.sort_by(|a, b| {
            b.effective_gas()
                .cmp(&a.effective_gas())
                .then(a.submitted_at_ms.cmp(&b.submitted_at_ms))
        });
        let take = pending.len().min(self.config.max_transactions_per_block);
        let (to_include, rest) = pending.split_at(take);
        state.pending = rest.iter().cloned().collect();

        for tx in to_include {
            let mut tx = tx.clone();
            tx.status = TxStatus::Included;
            tx.included_block_number = Some(block_number);

            let outcome = execute_payload(engine, &tx.payload);
            match &outcome {
                Ok(result) => {
                    tx.result = Some(result.clone());
                }
                Err(message) => {
                    tx.status = TxStatus::Failed;
                    tx.error = Some(message.clone());
                    tx.result = Some(TxOutcome::Failed {
                        message: message.clone(),
                    });
                    if let Some(sender) = state.waiters.remove(&tx.tx_id) {
                        let _ = sender.send(TxOutcome::Failed {
                            message: message.clone(),
                        });
                    }
                }
            }
            info!(tx_id = %tx.tx_id, block_number, status = ?tx.status, "transaction included");
            state.all.insert(tx.tx_id.clone(), tx);
        }

        // --- confirm phase ---
        let mut rng = self.rng.lock().await;
        let included_ids: Vec<String> = state
            .all
            .values()
            .filter(|tx| tx.status == TxStatus::Included)
            .map(|tx| tx.tx_id.clone())
            .collect();

        for tx_id in included_ids {
            let should_confirm = {
                let tx = state.all.get(&tx_id).unwrap();
                let included_at = tx.included_block_number.unwrap();
                let elapsed = block_number - included_at + 1;
                if elapsed < tx.required_confirmations {
                    false
                } else {
                    rng.gen_bool(self.config.confirmation_probability_per_block)
                        || elapsed >= tx.required_confirmations + FORCED_CONFIRMATION_SLACK_BLOCKS
                }
            };
            if should_confirm {
                let tx = state.all.get_mut(&tx_id).unwrap();
                tx.status = TxStatus::Confirmed;
                tx.confirmed_block_number = Some(block_number);
                let outcome = tx.result.clone().unwrap_or(TxOutcome::Failed {
                    message: "confirmed without a recorded result".to_string(),
                });
                info!(tx_id = %tx_id, block_number, "transaction confirmed");
                if let Some(sender) = state.waiters.remove(&tx_id) {
                    let _ = sender.send(outcome);
                }
            }
        }
    }

    pub async fn get(&self, tx_id: &str) -> Option<VirtualTransaction> {
        self.state.lock().await.all.get(tx_id).cloned()
    }

    /// Newest-submitted-first, bounded list of known transactions.
    pub async fn list(&self, limit: usize) -> Vec<VirtualTransaction> {
        let state = self.state.lock().await;
        let mut all: Vec<VirtualTransaction> = state.all.values().cloned().collect();
        all.sort_by(|a, b| b.submitted_at_ms.cmp(&a.submitted_at_ms));
        all.truncate(limit);
        all
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

fn execute_payload(engine: &mut MatchingEngine, payload: &EngineCommand) -> Result<TxOutcome, String> {
    match payload {
        EngineCommand::SubmitOrder(request) => engine
            .submit_order(request.clone(), 0)
            .map(|result| TxOutcome::SubmitResult {
                order_id: result.order.id.0.clone(),
                status: format!("{:?}", result.order.status),
            })
            .map_err(|e| e.to_string()),
        EngineCommand::CancelOrder(request) => {
            let result = engine.cancel_order(request.clone(), 0);
            Ok(TxOutcome::CancelResult {
                canceled: result.canceled,
                reason: result.reason.map(|r| r.as_str().to_string()),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_log::CommandLog;
    use crate::engine::SymbolConfig;
    use crate::orderbook::{OrderKind, Side, SubmitOrderRequest, TimeInForce};
    use tempfile::tempdir;

    fn test_engine(dir: &std::path::Path) -> MatchingEngine {
        MatchingEngine::new(
            vec![SymbolConfig {
                symbol: "ETH-USD".to_string(),
                lot_size: 1,
                tick_size: 1,
            }],
            CommandLog::new(dir.join("commands.jsonl")),
            7,
        )
    }

    fn submit_request(id: &str, gas_price: u128) -> (EngineCommand, u128) {
        (
            EngineCommand::SubmitOrder(SubmitOrderRequest {
                id: Some(id.to_string()),
                client_order_id: None,
                symbol: "ETH-USD".to_string(),
                user_id: "u1".to_string(),
                side: Side::Buy,
                kind: OrderKind::Limit,
                quantity: 1,
                price: Some(100),
                time_in_force: Some(TimeInForce::Gtc),
                min_quantity: None,
                iceberg_display_quantity: None,
                self_trade_prevention: None,
            }),
            gas_price,
        )
    }

    fn config() -> MempoolConfig {
        MempoolConfig {
            block_interval_ms: 20,
            max_transactions_per_block: 1,
            default_confirmations: 1,
            confirmation_probability_per_block: 1.0,
            seed: 1,
        }
    }

    #[tokio::test]
    async fn higher_gas_is_included_first() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());
        let mempool = VirtualMempool::new(config());

        let (low_payload, low_gas) = submit_request("low", 1000);
        let (high_payload, high_gas) = submit_request("high", 2000);
        mempool.submit(low_payload, low_gas, 0, None, 0).await;
        mempool.submit(high_payload, high_gas, 0, None, 0).await;

        mempool.tick(&mut engine).await;
        let high_tx = mempool.get("tx-2").await.unwrap();
        assert_eq!(high_tx.status, TxStatus::Included);
        let low_tx = mempool.get("tx-1").await.unwrap();
        assert_eq!(low_tx.status, TxStatus::Pending);

        mempool.tick(&mut engine).await;
        let low_tx = mempool.get("tx-1").await.unwrap();
        assert_eq!(low_tx.status, TxStatus::Included);
    }

    #[tokio::test]
    async fn ties_broken_by_earliest_submission() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());
        let cfg = MempoolConfig {
            max_transactions_per_block: 1,
            ..config()
        };
        let mempool = VirtualMempool::new(cfg);
        let (a, gas) = submit_request("a", 1000);
        mempool.submit(a, gas, 0, None, 0).await;
        let (b, gas) = submit_request("b", 1000);
        mempool.submit(b, gas, 0, None, 10).await;

        mempool.tick(&mut engine).await;
        let a_tx = mempool.get("tx-1").await.unwrap();
        assert_eq!(a_tx.status, TxStatus::Included);
    }

    #[tokio::test]
    async fn confirmation_probability_one_confirms_immediately_after_floor() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());
        let mempool = VirtualMempool::new(config());
        let (payload, gas) = submit_request("a", 1000);
        let handle = mempool.submit(payload, gas, 0, Some(1), 0).await;
        mempool.tick(&mut engine).await; // include
        mempool.tick(&mut engine).await; // confirm
        let outcome = handle.confirmed.await.unwrap();
        match outcome {
            TxOutcome::SubmitResult { .. } => {}
            other => panic!("expected SubmitResult, got {other:?}"),
        }
        let tx = mempool.get("tx-1").await.unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn forced_confirmation_floor_confirms_even_at_zero_probability() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());
        let cfg = MempoolConfig {
            confirmation_probability_per_block: 0.0,
            default_confirmations: 1,
            ..config()
        };
        let mempool = VirtualMempool::new(cfg);
        let (payload, gas) = submit_request("a", 1000);
        mempool.submit(payload, gas, 0, Some(1), 0).await;
        mempool.tick(&mut engine).await; // include at block 1
        for _ in 0..6 {
            mempool.tick(&mut engine).await;
        }
        let tx = mempool.get("tx-1").await.unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
    }

    #[tokio::test]
    async fn pending_count_reflects_unincluded_transactions() {
        let dir = tempdir().unwrap();
        let mut engine = test_engine(dir.path());
        let mempool = VirtualMempool::new(config());
        let (payload, gas) = submit_request("a", 1000);
        mempool.submit(payload, gas, 0, None, 0).await;
        assert_eq!(mempool.pending_count().await, 1);
        mempool.tick(&mut engine).await;
        assert_eq!(mempool.pending_count().await, 0);
    }
}
