//! Environment-variable configuration loading for binaries/tests that
//! assemble an engine and mempool.
//!
//! The core library itself never calls `env::var` directly — only this
//! module does — so matching and mempool logic stay pure and independently
//! testable. `dotenv` loads a local `.env` file, if present, before
//! variables are read.

use crate::engine::SymbolConfig;
use crate::mempool::MempoolConfig;
use std::env;

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Load `.env` (if present) into the process environment. Safe to call more
/// than once; missing files are not an error.
pub fn load_dotenv() {
    let _ = dotenv::dotenv();
}

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub symbols: Vec<SymbolConfig>,
    pub command_log_path: String,
    pub seed: u64,
}

impl EngineConfig {
    /// Loads engine configuration from the environment. `CLOB_SYMBOLS` is a
    /// comma-separated list of `SYMBOL:LOT:TICK` triples (e.g.
    /// `ETH-USD:1:1,BTC-USD:1:1`); an empty/unset value falls back to a
    /// single `ETH-USD:1:1` book so a default engine is always constructible.
    pub fn from_env() -> Self {
        let symbols_raw: String = env_or("CLOB_SYMBOLS", "ETH-USD:1:1".to_string());
        let symbols = symbols_raw
            .split(',')
            .filter(|s| !s.trim().is_empty())
            .filter_map(parse_symbol_triple)
            .collect();
        Self {
            symbols,
            command_log_path: env_or(
                "CLOB_COMMAND_LOG_PATH",
                "./data/command_log.jsonl".to_string(),
            ),
            seed: env_or("CLOB_SEED", 42u64),
        }
    }
}

fn parse_symbol_triple(raw: &str) -> Option<SymbolConfig> {
    let mut parts = raw.trim().split(':');
    let symbol = parts.next()?.to_string();
    let lot_size = parts.next()?.parse().ok()?;
    let tick_size = parts.next()?.parse().ok()?;
    Some(SymbolConfig {
        symbol,
        lot_size,
        tick_size,
    })
}

impl MempoolConfigLoader for MempoolConfig {
    fn from_env() -> Self {
        Self {
            block_interval_ms: env_or("CLOB_MEMPOOL_BLOCK_INTERVAL_MS", 1_000u64),
            max_transactions_per_block: env_or("CLOB_MEMPOOL_MAX_TX_PER_BLOCK", 100usize),
            default_confirmations: env_or("CLOB_MEMPOOL_DEFAULT_CONFIRMATIONS", 6u64),
            confirmation_probability_per_block: env_or(
                "CLOB_MEMPOOL_CONFIRMATION_PROBABILITY",
                0.5f64,
            ),
            seed: env_or("CLOB_SEED", 42u64),
        }
    }
}

/// Small trait so `MempoolConfig::from_env()` reads naturally at call sites
/// without this module owning the `mempool` type itself.
pub trait MempoolConfigLoader {
    fn from_env() -> Self;
}
