//! Checkpoint persistence.
//!
//! The file store keeps one authoritative `checkpoint.json`, replaced
//! atomically (temp file, fsync, rename), plus a numbered snapshot per
//! iteration under `history/`.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::domain::Checkpoint;
use crate::error::{DispatchError, Result};

pub const LATEST_FILE: &str = "checkpoint.json";
pub const HISTORY_DIR: &str = "history";

/// Makes temp file names unique across concurrent saves in one process
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Durable store of scheduler snapshots.
pub trait CheckpointStore: Send + Sync {
    /// The latest checkpoint, `None` on a fresh start.
    fn load(&self) -> Result<Option<Checkpoint>>;

    /// Replace the latest checkpoint and record it in history.
    fn save(&self, checkpoint: &Checkpoint) -> Result<()>;

    /// A historical snapshot by iteration.
    fn load_at(&self, iteration: u64) -> Result<Option<Checkpoint>>;

    /// Iterations with a retained snapshot, ascending.
    fn history(&self) -> Result<Vec<u64>>;
}

/// Checkpoints as JSON files in a directory.
pub struct FileCheckpointStore {
    dir: PathBuf,
}

impl FileCheckpointStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(dir.join(HISTORY_DIR))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_FILE)
    }

    fn history_path(&self, iteration: u64) -> PathBuf {
        self.dir.join(HISTORY_DIR).join(format!("checkpoint-{}.json", iteration))
    }

    fn read(path: &Path) -> Result<Option<Checkpoint>> {
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Write to a sibling temp file, flush it to disk, then rename over `path`.
    fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| DispatchError::Storage(format!("Invalid checkpoint path: {}", path.display())))?;
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let tmp = path.with_file_name(format!(".{}.{}.{}.tmp", file_name, std::process::id(), seq));

        let result = (|| -> Result<()> {
            let mut file = File::create(&tmp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            fs::rename(&tmp, path)?;
            Ok(())
        })();

        if result.is_err() {
            let _ = fs::remove_file(&tmp);
        }
        result
    }
}

impl CheckpointStore for FileCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        Self::read(&self.latest_path())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(checkpoint)?;
        // history first: a crash between the two writes leaves the previous
        // latest intact
        Self::write_atomic(&self.history_path(checkpoint.iteration), &bytes)?;
        Self::write_atomic(&self.latest_path(), &bytes)?;
        log::debug!("Saved checkpoint iteration {} to {}", checkpoint.iteration, self.dir.display());
        Ok(())
    }

    fn load_at(&self, iteration: u64) -> Result<Option<Checkpoint>> {
        Self::read(&self.history_path(iteration))
    }

    fn history(&self) -> Result<Vec<u64>> {
        let pattern = self.dir.join(HISTORY_DIR).join("checkpoint-*.json");
        let pattern = pattern
            .to_str()
            .ok_or_else(|| DispatchError::Storage(format!("Invalid checkpoint dir: {}", self.dir.display())))?;

        let mut iterations: Vec<u64> = glob::glob(pattern)
            .map_err(|e| DispatchError::Storage(e.to_string()))?
            .filter_map(|entry| entry.ok())
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(|s| s.strip_prefix("checkpoint-"))
                    .and_then(|n| n.parse().ok())
            })
            .collect();
        iterations.sort_unstable();
        Ok(iterations)
    }
}

/// In-process store, used by tests and the simulator.
#[derive(Default)]
pub struct MemoryCheckpointStore {
    latest: RwLock<Option<Checkpoint>>,
    history: RwLock<BTreeMap<u64, Checkpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    fn load(&self) -> Result<Option<Checkpoint>> {
        let latest = self.latest.read().map_err(|e| DispatchError::Storage(e.to_string()))?;
        Ok(latest.clone())
    }

    fn save(&self, checkpoint: &Checkpoint) -> Result<()> {
        let mut history = self.history.write().map_err(|e| DispatchError::Storage(e.to_string()))?;
        let mut latest = self.latest.write().map_err(|e| DispatchError::Storage(e.to_string()))?;
        history.insert(checkpoint.iteration, checkpoint.clone());
        *latest = Some(checkpoint.clone());
        Ok(())
    }

    fn load_at(&self, iteration: u64) -> Result<Option<Checkpoint>> {
        let history = self.history.read().map_err(|e| DispatchError::Storage(e.to_string()))?;
        Ok(history.get(&iteration).cloned())
    }

    fn history(&self) -> Result<Vec<u64>> {
        let history = self.history.read().map_err(|e| DispatchError::Storage(e.to_string()))?;
        Ok(history.keys().copied().collect())
    }
}
