//! `clob-core`: a deterministic, offchain simulator of a central-limit-order-book
//! exchange.
//!
//! Three tightly coupled subsystems live here: the multi-symbol
//! [`engine::MatchingEngine`] with its per-symbol [`orderbook::OrderBook`]s,
//! the [`mempool::VirtualMempool`] that models gas-priority inclusion and
//! probabilistic confirmation of submissions, and the deterministic replay
//! substrate ([`command_log`] + [`rng::DeterministicRng`]) that makes both
//! reproducible given the same seed and command sequence.
//!
//! The HTTP/WebSocket façade, the metrics sink, and the snapshot-file
//! scheduler are out of scope — this crate is the library they would call
//! into. [`config`] loads environment-driven defaults for binaries that
//! assemble an engine; the rest of the crate never touches the environment.

pub mod command_log;
pub mod config;
pub mod engine;
pub mod mempool;
pub mod network_shim;
pub mod orderbook;
pub mod rng;
pub mod skiplist;
pub mod snapshotter;

pub mod prelude {
    pub use crate::command_log::{CommandLog, EntryType, LogEntry, ReplayReport};
    pub use crate::engine::{EngineEvent, EngineStats, MatchingEngine, SymbolConfig};
    pub use crate::mempool::{EngineCommand, MempoolConfig, TxOutcome, TxStatus, VirtualMempool};
    pub use crate::orderbook::{
        CancelRequest, Order, OrderBook, OrderId, OrderKind, OrderStatus, RejectReason,
        SelfTradePrevention, Side, SubmitOrderRequest, TimeInForce,
    };
    pub use crate::rng::DeterministicRng;
}
