//! Append-only line-delimited JSON command/event log and the replay source
//! it backs.
//!
//! Plays the same role as a classic write-ahead journal — append-only,
//! total order, replay source — but with a simpler on-disk format: no CRC32
//! framing, no mmap segments, fsync not required. Corrupted or partial
//! lines are skipped on read rather than treated as a fatal error.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    Command,
    Event,
}

/// One line of the command log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(rename = "entryType")]
    pub entry_type: EntryType,
    #[serde(rename = "timestampMs")]
    pub timestamp_ms: u64,
    pub payload: serde_json::Value,
    #[serde(rename = "commandId", skip_serializing_if = "Option::is_none")]
    pub command_id: Option<String>,
}

/// Tally of a replay pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayReport {
    pub applied: u64,
    pub skipped: u64,
}

/// Append-only writer/reader over a single log file.
pub struct CommandLog {
    path: PathBuf,
}

impl CommandLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn ensure_parent_dir(&self) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(())
    }

    fn append_line(&self, entry: &LogEntry) -> io::Result<()> {
        self.ensure_parent_dir()?;
        let mut file: File = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    /// Append a command entry, tagged with a generated `command_id` so a
    /// later event entry can reference the command that produced it.
    pub fn append_command(
        &self,
        command_id: &str,
        timestamp_ms: u64,
        payload: serde_json::Value,
    ) -> io::Result<()> {
        self.append_line(&LogEntry {
            entry_type: EntryType::Command,
            timestamp_ms,
            payload,
            command_id: Some(command_id.to_string()),
        })
    }

    /// Append an event entry. Events are informational and ignored on read
    /// — only command entries are replayed.
    pub fn append_event(&self, timestamp_ms: u64, payload: serde_json::Value) -> io::Result<()> {
        self.append_line(&LogEntry {
            entry_type: EntryType::Event,
            timestamp_ms,
            payload,
            command_id: None,
        })
    }

    /// Read every command entry in file order. A missing file yields an
    /// empty list rather than an error. Corrupted or partial lines are
    /// logged at `warn!` and skipped.
    pub fn read_commands(&self) -> io::Result<Vec<LogEntry>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let reader = BufReader::new(file);
        let mut out = Vec::new();
        for (line_number, line) in reader.lines().enumerate() {
            let line = match line {
                Ok(l) => l,
                Err(e) => {
                    warn!(line_number, error = %e, "command log: unreadable line, skipping");
                    continue;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LogEntry>(&line) {
                Ok(entry) if entry.entry_type == EntryType::Command => out.push(entry),
                Ok(_) => {}
                Err(e) => {
                    warn!(line_number, error = %e, "command log: corrupt line, skipping");
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn missing_file_reads_as_empty() {
        let log = CommandLog::new("/tmp/clob-core-test-missing-does-not-exist.jsonl");
        let entries = log.read_commands().unwrap();
        assert!(entries.is_empty());
    }

    #[test]
    fn round_trips_commands_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let log = CommandLog::new(dir.path().join("commands.jsonl"));
        log.append_command("cmd-1", 1, json!({"type": "submit_order"})).unwrap();
        log.append_event(2, json!({"type": "trade"})).unwrap();
        log.append_command("cmd-2", 3, json!({"type": "cancel_order"})).unwrap();
        let entries = log.read_commands().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].command_id.as_deref(), Some("cmd-1"));
        assert_eq!(entries[1].command_id.as_deref(), Some("cmd-2"));
    }

    #[test]
    fn corrupt_lines_are_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("commands.jsonl");
        let log = CommandLog::new(&path);
        log.append_command("cmd-1", 1, json!({"a": 1})).unwrap();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(f, "{{not valid json").unwrap();
        }
        log.append_command("cmd-2", 2, json!({"a": 2})).unwrap();
        let entries = log.read_commands().unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[test]
    fn creates_parent_directory_on_first_write() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("nested").join("log.jsonl");
        let log = CommandLog::new(&nested);
        log.append_command("cmd-1", 1, json!({})).unwrap();
        assert!(nested.exists());
    }
}
