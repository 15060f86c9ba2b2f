//! Barrier scheduling: partition the whole graph into ordered waves.
//!
//! Each wave holds tasks whose dependencies completed in earlier waves and
//! whose write sets don't overlap. Packing is a single greedy pass in
//! authored order.

use serde::Serialize;
use std::collections::HashSet;

use crate::domain::Task;
use crate::graph::{LockSet, TaskGraph, conflicts_with_locks};

/// Ordered waves plus whatever could never become ready
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WavePlan {
    pub waves: Vec<Vec<String>>,
    /// Tasks left over because of a cycle or an unsatisfiable dependency
    pub unscheduled: Vec<String>,
}

impl WavePlan {
    pub fn is_complete(&self) -> bool {
        self.unscheduled.is_empty()
    }

    /// Zero-based wave index holding `task_id`.
    pub fn wave_of(&self, task_id: &str) -> Option<usize> {
        self.waves.iter().position(|w| w.iter().any(|id| id == task_id))
    }

    /// Sum over waves of the longest task in each wave.
    pub fn parallel_minutes(&self, graph: &TaskGraph) -> u64 {
        self.waves
            .iter()
            .map(|wave| {
                wave.iter()
                    .filter_map(|id| graph.get(id))
                    .map(|t| t.duration_minutes() as u64)
                    .max()
                    .unwrap_or(0)
            })
            .sum()
    }
}

/// Greedily pack `ready` into one conflict-free wave, skipping members that
/// would collide with an earlier pick. The first ready task always fits, so a
/// non-empty pool yields a non-empty wave.
pub fn pack_wave(ready: &[&Task]) -> Vec<String> {
    let mut locks = LockSet::new();
    let mut wave = Vec::new();

    for task in ready {
        if conflicts_with_locks(task, &locks) {
            continue;
        }
        locks.extend(task.lock_touches().iter().cloned());
        wave.push(task.id.clone());
    }

    wave
}

/// Group every task in the graph into waves.
///
/// Dangling dependencies count as satisfied. Terminates on cycles with the
/// cyclic remainder in `unscheduled`.
pub fn group_into_waves(graph: &TaskGraph) -> WavePlan {
    let mut plan = WavePlan::default();
    let mut done: HashSet<&str> = HashSet::new();
    let none: HashSet<&str> = HashSet::new();

    while done.len() < graph.len() {
        let ready = graph.ready_tasks(&done, &none);
        if ready.is_empty() {
            break;
        }

        let wave = pack_wave(&ready);
        for id in &wave {
            if let Some(task) = graph.get(id) {
                done.insert(task.id.as_str());
            }
        }
        plan.waves.push(wave);
    }

    plan.unscheduled = graph
        .ids()
        .filter(|id| !done.contains(id))
        .map(String::from)
        .collect();

    if !plan.unscheduled.is_empty() {
        log::warn!(
            "Wave grouping stalled with {} unscheduled task(s): {}",
            plan.unscheduled.len(),
            plan.unscheduled.join(", ")
        );
    } else {
        log::debug!("Grouped {} tasks into {} waves", graph.len(), plan.waves.len());
    }

    plan
}
