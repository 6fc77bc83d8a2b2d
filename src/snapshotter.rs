//! Assembly and atomic publication of a point-in-time state snapshot
//! document.
//!
//! An out-of-scope HTTP/scheduler façade decides *when* to call this; this
//! module only assembles the document and writes it atomically.

use crate::engine::{EngineStats, MatchingEngine};
use crate::orderbook::OrderBookSnapshot;
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use tempfile::NamedTempFile;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateSnapshotDocument {
    pub synced_at: String,
    pub upstream_block_number: Option<u64>,
    pub stats: EngineStats,
    pub books: Vec<OrderBookSnapshot>,
}

/// Assemble a [`StateSnapshotDocument`] from the current engine state.
pub fn assemble(
    engine: &MatchingEngine,
    synced_at: String,
    upstream_block_number: Option<u64>,
    depth: usize,
) -> StateSnapshotDocument {
    let books = engine
        .supported_symbols()
        .into_iter()
        .filter_map(|symbol| engine.snapshot(&symbol, depth).ok())
        .collect();
    StateSnapshotDocument {
        synced_at,
        upstream_block_number,
        stats: engine.stats(),
        books,
    }
}

/// Write `document` to `path` atomically: serialize into a temp file in the
/// same directory, then rename over the destination. Creates the parent
/// directory if it doesn't exist.
pub fn atomic_write(document: &StateSnapshotDocument, path: &Path) -> io::Result<()> {
    let parent = path.parent().filter(|p| !p.as_os_str().is_empty());
    if let Some(parent) = parent {
        std::fs::create_dir_all(parent)?;
    }
    let dir = parent.unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut tmp, document)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_log::CommandLog;
    use crate::engine::SymbolConfig;
    use tempfile::tempdir;

    #[test]
    fn assemble_includes_all_supported_symbols() {
        let dir = tempdir().unwrap();
        let engine = MatchingEngine::new(
            vec![
                SymbolConfig {
                    symbol: "ETH-USD".to_string(),
                    lot_size: 1,
                    tick_size: 1,
                },
                SymbolConfig {
                    symbol: "BTC-USD".to_string(),
                    lot_size: 1,
                    tick_size: 1,
                },
            ],
            CommandLog::new(dir.path().join("commands.jsonl")),
            1,
        );
        let doc = assemble(&engine, "2026-08-01T00:00:00Z".to_string(), None, 10);
        assert_eq!(doc.books.len(), 2);
    }

    #[test]
    fn atomic_write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let engine = MatchingEngine::new(
            vec![SymbolConfig {
                symbol: "ETH-USD".to_string(),
                lot_size: 1,
                tick_size: 1,
            }],
            CommandLog::new(dir.path().join("commands.jsonl")),
            1,
        );
        let doc = assemble(&engine, "2026-08-01T00:00:00Z".to_string(), Some(99), 10);
        let out_path = dir.path().join("nested").join("snapshot.json");
        atomic_write(&doc, &out_path).unwrap();
        let raw = std::fs::read_to_string(&out_path).unwrap();
        let read_back: StateSnapshotDocument = serde_json::from_str(&raw).unwrap();
        assert_eq!(read_back.upstream_block_number, Some(99));
    }
}
