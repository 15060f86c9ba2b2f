//! Append-only JSONL audit log of accepted checkpoint mutations.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::domain::{ExecutionMode, Transition};
use crate::error::Result;
use crate::id::now_iso;

pub const JOURNAL_FILE: &str = "transitions.jsonl";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JournalEvent {
    Transition { task_id: String, transition: Transition },
    Launch { task_id: String, mode: ExecutionMode },
    Retry { task_id: String, attempt: u32 },
    Spawn { source_task: String, dedup_key: String },
    Gate { name: String, score: f64 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Checkpoint iteration the event produced
    pub iteration: u64,
    pub timestamp: String,
    #[serde(flatten)]
    pub event: JournalEvent,
}

impl JournalEntry {
    pub fn new(iteration: u64, event: JournalEvent) -> Self {
        Self {
            iteration,
            timestamp: now_iso(),
            event,
        }
    }
}

pub struct TransitionJournal {
    path: PathBuf,
}

impl TransitionJournal {
    /// Open (or create on first append) the journal at `path`.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(Self { path })
    }

    /// Journal stored beside the checkpoints in `dir`.
    pub fn in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::new(dir.as_ref().join(JOURNAL_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&self, entry: &JournalEntry) -> Result<()> {
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// All entries in write order. Blank lines are skipped.
    pub fn read_all(&self) -> Result<Vec<JournalEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let reader = BufReader::new(File::open(&self.path)?);
        let mut entries = Vec::new();
        for line in reader.lines() {
            let line = line?;
            if !line.trim().is_empty() {
                entries.push(serde_json::from_str(&line)?);
            }
        }
        Ok(entries)
    }
}
