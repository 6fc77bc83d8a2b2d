//! Virtual mempool: gas-priority inclusion, block cadence, and
//! probabilistic confirmation of simulated on-chain submission.

pub mod mempool;
pub mod tx;

pub use mempool::{MempoolConfig, SubmitHandle, VirtualMempool};
pub use tx::{EngineCommand, TxOutcome, TxStatus, VirtualTransaction};
