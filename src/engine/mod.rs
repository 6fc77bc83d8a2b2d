//! Multi-symbol matching engine: orchestration, stats, and event fan-out.

pub mod engine;
pub mod events;
pub mod stats;

pub use engine::{CancelResult, MatchingEngine, SubmitResult, SymbolConfig};
pub use events::EngineEvent;
pub use stats::EngineStats;

pub use crate::command_log::ReplayReport;
