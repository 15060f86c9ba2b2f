//! Checkpoint record
//!
//! A snapshot of scheduler progress. Snapshots are immutable once written;
//! the tracker derives the next one with [`Checkpoint::successor`].

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::task::ExecutionMode;
use crate::id::now_iso;

/// One millionth of a US dollar. Spend is tracked in integer micro-dollars so
/// threshold checks are exact.
pub type MicroUsd = u64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Monotonic counter, bumped on every accepted transition
    pub iteration: u64,

    /// ISO 8601 time the snapshot was taken
    pub timestamp: String,

    /// Completed task ids, in completion order
    pub completed: Vec<String>,

    /// Running task id -> execution mode
    pub running: BTreeMap<String, ExecutionMode>,

    /// Latest score per quality gate
    #[serde(default)]
    pub gate_scores: BTreeMap<String, f64>,

    /// Remaining number of tasks that may be auto-spawned
    pub auto_spawn_budget: u32,

    /// Keys of discovered work already spawned
    #[serde(default)]
    pub dedup_keys: BTreeSet<String>,

    /// Task id -> retry attempts recorded
    #[serde(default)]
    pub retry_counts: BTreeMap<String, u32>,

    /// Cumulative estimated spend of completed tasks
    #[serde(default)]
    pub spent_micro_usd: MicroUsd,
}

impl Checkpoint {
    /// Iteration-zero snapshot for a fresh run.
    pub fn fresh(auto_spawn_budget: u32) -> Self {
        Self {
            iteration: 0,
            timestamp: now_iso(),
            completed: Vec::new(),
            running: BTreeMap::new(),
            gate_scores: BTreeMap::new(),
            auto_spawn_budget,
            dedup_keys: BTreeSet::new(),
            retry_counts: BTreeMap::new(),
            spent_micro_usd: 0,
        }
    }

    /// Copy with the iteration bumped and a new timestamp.
    pub fn successor(&self) -> Self {
        let mut next = self.clone();
        next.iteration += 1;
        next.timestamp = now_iso();
        next
    }

    pub fn is_completed(&self, task_id: &str) -> bool {
        self.completed.iter().any(|id| id == task_id)
    }

    pub fn is_running(&self, task_id: &str) -> bool {
        self.running.contains_key(task_id)
    }

    pub fn retry_count(&self, task_id: &str) -> u32 {
        self.retry_counts.get(task_id).copied().unwrap_or(0)
    }

    /// Number of running tasks in the given mode.
    pub fn running_in_mode(&self, mode: ExecutionMode) -> usize {
        self.running.values().filter(|m| **m == mode).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_checkpoint() {
        let cp = Checkpoint::fresh(5);
        assert_eq!(cp.iteration, 0);
        assert_eq!(cp.auto_spawn_budget, 5);
        assert!(cp.completed.is_empty());
        assert!(cp.running.is_empty());
    }

    #[test]
    fn test_successor_bumps_iteration() {
        let mut cp = Checkpoint::fresh(0);
        cp.completed.push("T01".into());
        let next = cp.successor();
        assert_eq!(next.iteration, 1);
        assert_eq!(next.completed, cp.completed);
    }

    #[test]
    fn test_running_in_mode() {
        let mut cp = Checkpoint::fresh(0);
        cp.running.insert("T01".into(), ExecutionMode::Background);
        cp.running.insert("T02".into(), ExecutionMode::Background);
        cp.running.insert("T03".into(), ExecutionMode::Foreground);
        assert_eq!(cp.running_in_mode(ExecutionMode::Background), 2);
        assert_eq!(cp.running_in_mode(ExecutionMode::Foreground), 1);
    }

    #[test]
    fn test_missing_optional_fields_default() {
        let json = r#"{
            "iteration": 3,
            "timestamp": "2026-01-17T09:30:00Z",
            "completed": ["T01"],
            "running": {"T02": "foreground"},
            "auto_spawn_budget": 2
        }"#;
        let cp: Checkpoint = serde_json::from_str(json).unwrap();
        assert_eq!(cp.iteration, 3);
        assert_eq!(cp.running.get("T02"), Some(&ExecutionMode::Foreground));
        assert!(cp.retry_counts.is_empty());
        assert_eq!(cp.spent_micro_usd, 0);
    }
}
