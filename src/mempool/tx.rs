//! Virtual transaction record and the commands it can carry.

use crate::orderbook::{CancelRequest, SubmitOrderRequest};
use serde::{Deserialize, Serialize};

/// The payload a virtual transaction executes against the engine once
/// included.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineCommand {
    SubmitOrder(SubmitOrderRequest),
    CancelOrder(CancelRequest),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TxStatus {
    Pending,
    Included,
    Confirmed,
    Failed,
}

/// Outcome recorded once a transaction's payload has executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TxOutcome {
    SubmitResult {
        order_id: String,
        status: String,
    },
    CancelResult {
        canceled: bool,
        reason: Option<String>,
    },
    Failed {
        message: String,
    },
}

/// A mempool-resident virtual transaction. Gas fields are wide unsigned
/// integers so effective-gas arithmetic never narrows them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VirtualTransaction {
    pub tx_id: String,
    pub status: TxStatus,
    pub submitted_at_ms: u64,
    pub included_block_number: Option<u64>,
    pub confirmed_block_number: Option<u64>,
    pub gas_price: u128,
    pub max_priority_fee_per_gas: u128,
    pub required_confirmations: u64,
    pub payload: EngineCommand,
    pub result: Option<TxOutcome>,
    pub error: Option<String>,
}

impl VirtualTransaction {
    /// `gas_price + max_priority_fee_per_gas`, the mempool's sole ordering
    /// key for inclusion.
    pub fn effective_gas(&self) -> u128 {
        self.gas_price + self.max_priority_fee_per_gas
    }
}
