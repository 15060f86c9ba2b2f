//! Quota-aware batch selection.
//!
//! Given the ready pool and what is already running, picks the next batch:
//! - Sort by priority score (descending, ties keep authored order)
//! - Admit greedily while tracking background/foreground/total slots
//! - Skip, don't stop, when a task's mode-specific slot is exhausted
//! - Skip tasks whose write set overlaps a held lock or an earlier pick
//!
//! This is a greedy approximation of a bounded knapsack, not an optimal packing.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{ExecutionMode, ModelTier, Task};
use crate::graph::{LockSet, conflicts_with_locks};
use crate::scheduler::priority::{execution_mode, priority_score, select_model_tier};

/// Concurrency quotas for dispatched tasks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    pub max_parallel_background: usize,
    pub max_parallel_foreground: usize,
    pub max_total_parallel: usize,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_parallel_background: 6,
            max_parallel_foreground: 2,
            max_total_parallel: 8,
        }
    }
}

impl QuotaConfig {
    pub fn new(max_parallel_background: usize, max_parallel_foreground: usize, max_total_parallel: usize) -> Self {
        Self {
            max_parallel_background,
            max_parallel_foreground,
            max_total_parallel,
        }
    }
}

/// Running tasks by mode
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningCounts {
    pub background: usize,
    pub foreground: usize,
}

impl RunningCounts {
    pub fn from_running(running: &BTreeMap<String, ExecutionMode>) -> Self {
        let mut counts = Self::default();
        for mode in running.values() {
            counts.add(*mode);
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.background + self.foreground
    }

    pub fn get(&self, mode: ExecutionMode) -> usize {
        match mode {
            ExecutionMode::Background => self.background,
            ExecutionMode::Foreground => self.foreground,
        }
    }

    pub fn add(&mut self, mode: ExecutionMode) {
        match mode {
            ExecutionMode::Background => self.background += 1,
            ExecutionMode::Foreground => self.foreground += 1,
        }
    }
}

/// One task handed to the execution layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Launch {
    pub task_id: String,
    pub mode: ExecutionMode,
    pub tier: ModelTier,
    pub score: i32,
}

impl Launch {
    pub fn for_task(task: &Task) -> Self {
        Self {
            task_id: task.id.clone(),
            mode: execution_mode(task),
            tier: select_model_tier(task),
            score: priority_score(task),
        }
    }
}

/// Select the next batch from `ready`.
///
/// `locks` is the set of resources held by running tasks; selected tasks
/// never overlap it or each other.
pub fn select_batch(ready: &[&Task], running: RunningCounts, quotas: &QuotaConfig, locks: &LockSet) -> Vec<Launch> {
    let mut ranked: Vec<&Task> = ready.to_vec();
    // stable: equal scores keep authored order
    ranked.sort_by_key(|t| std::cmp::Reverse(priority_score(t)));
    admit(&ranked, running, quotas, locks)
}

/// Admit `candidates` in the order given, skipping any task whose mode slot
/// is exhausted or whose write set overlaps `locks` or an earlier pick.
/// Stops once the total quota is reached.
pub fn admit(candidates: &[&Task], running: RunningCounts, quotas: &QuotaConfig, locks: &LockSet) -> Vec<Launch> {
    let total_slots = quotas.max_total_parallel.saturating_sub(running.total());
    if total_slots == 0 {
        tracing::debug!(running = running.total(), "No free slots, not selecting");
        return vec![];
    }

    let mut used = running;
    let mut held = locks.clone();
    let mut batch = Vec::new();

    for task in candidates {
        if batch.len() == total_slots {
            break;
        }

        let launch = Launch::for_task(task);
        let limit = match launch.mode {
            ExecutionMode::Background => quotas.max_parallel_background,
            ExecutionMode::Foreground => quotas.max_parallel_foreground,
        };
        if used.get(launch.mode) >= limit {
            tracing::trace!(task = %task.id, mode = %launch.mode, "Mode slot exhausted, skipping");
            continue;
        }

        if conflicts_with_locks(task, &held) {
            tracing::debug!(task = %task.id, "Write set conflicts with held locks, deferring");
            continue;
        }

        held.extend(task.lock_touches().iter().cloned());
        used.add(launch.mode);
        batch.push(launch);
    }

    batch
}
