//! Checkpoint/resume state and the governors that mutate it.
//!
//! - **store**: durable snapshots behind the `CheckpointStore` trait
//! - **journal**: JSONL audit trail of accepted mutations
//! - **retry**: hard retry ceiling per task
//! - **spawn**: deduplicated, budgeted auto-spawn of discovered work
//! - **tracker**: owns the live checkpoint, persists before committing

pub mod journal;
pub mod retry;
pub mod spawn;
pub mod store;
pub mod tracker;

pub use journal::{JOURNAL_FILE, JournalEntry, JournalEvent, TransitionJournal};
pub use retry::{MAX_RETRIES, RetryDecision};
pub use spawn::{SpawnCandidate, SpawnDecision, evaluate as evaluate_spawn};
pub use store::{CheckpointStore, FileCheckpointStore, HISTORY_DIR, LATEST_FILE, MemoryCheckpointStore};
pub use tracker::{Tracker, TransitionOutcome};
