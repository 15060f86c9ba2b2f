//! The live control loop's decision step.
//!
//! One `Dispatcher` serves both strategies:
//! - continuous (default): admit ready work whenever slots free up
//! - barrier: hold until everything running has finished, then release the
//!   next conflict-free wave
//!
//! The dispatcher never mutates state. Callers record the returned launches
//! through the checkpoint tracker and re-invoke it after each report.

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

use super::select::{Launch, QuotaConfig, RunningCounts, admit, select_batch};
use super::waves::pack_wave;
use crate::budget::{BudgetStatus, PricingConfig};
use crate::domain::{Checkpoint, ExecutionMode, MicroUsd, Task};
use crate::graph::{LockSet, TaskGraph, lock_set};

/// Why the control loop should stop dispatching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    AllComplete,
    BudgetExhausted,
    GatesMet,
    /// Nothing running, nothing launchable, work remains
    Stalled,
}

/// A launch plus its estimated cost
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LaunchOrder {
    #[serde(flatten)]
    pub launch: Launch,
    pub estimated_cost: MicroUsd,
}

/// Output of one control-loop iteration
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchPlan {
    pub iteration: u64,
    pub launches: Vec<LaunchOrder>,
    /// Resources held once the launches start
    pub locks: LockSet,
    pub stop: Option<StopReason>,
    /// Unfinished tasks when the loop stalled
    pub stalled: Vec<String>,
    /// Budget state the plan was made under
    pub budget: BudgetStatus,
}

impl DispatchPlan {
    fn stopped(iteration: u64, locks: LockSet, budget: BudgetStatus, reason: StopReason) -> Self {
        Self {
            iteration,
            launches: Vec::new(),
            locks,
            stop: Some(reason),
            stalled: Vec::new(),
            budget,
        }
    }

    pub fn pairs(&self) -> Vec<(&str, ExecutionMode)> {
        self.launches
            .iter()
            .map(|o| (o.launch.task_id.as_str(), o.launch.mode))
            .collect()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Dispatcher {
    quotas: QuotaConfig,
    barrier: bool,
    pricing: PricingConfig,
}

impl Dispatcher {
    pub fn new(quotas: QuotaConfig) -> Self {
        Self {
            quotas,
            barrier: false,
            pricing: PricingConfig::default(),
        }
    }

    pub fn with_barrier(mut self, barrier: bool) -> Self {
        self.barrier = barrier;
        self
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    /// Next batch to launch given completed and running work.
    pub fn next_batch(
        &self,
        graph: &TaskGraph,
        completed: &HashSet<&str>,
        running: &BTreeMap<String, ExecutionMode>,
    ) -> Vec<Launch> {
        let running_ids: HashSet<&str> = running.keys().map(String::as_str).collect();
        let ready = graph.ready_tasks(completed, &running_ids);
        if ready.is_empty() {
            return vec![];
        }

        if self.barrier {
            if !running.is_empty() {
                tracing::trace!(running = running.len(), "Barrier held, waiting for wave to drain");
                return vec![];
            }
            // the wave keeps authored order; members past a mode quota wait
            // for the next drain
            let wave: Vec<&Task> = pack_wave(&ready).iter().filter_map(|id| graph.get(id)).collect();
            return admit(&wave, RunningCounts::default(), &self.quotas, &LockSet::new());
        }

        let locks = held_locks(graph, running);
        select_batch(&ready, RunningCounts::from_running(running), &self.quotas, &locks)
    }

    /// Decide what the control loop does next from a checkpoint.
    pub fn plan_iteration(
        &self,
        graph: &TaskGraph,
        checkpoint: &Checkpoint,
        budget: BudgetStatus,
        gates_met: bool,
    ) -> DispatchPlan {
        let iteration = checkpoint.iteration;
        let held = held_locks(graph, &checkpoint.running);

        if graph.ids().all(|id| checkpoint.is_completed(id)) {
            return DispatchPlan::stopped(iteration, held, budget, StopReason::AllComplete);
        }
        if gates_met {
            tracing::info!(iteration, "Quality gates met, stopping dispatch");
            return DispatchPlan::stopped(iteration, held, budget, StopReason::GatesMet);
        }
        if !budget.allows_dispatch() {
            tracing::warn!(iteration, "Budget exhausted, not dispatching");
            return DispatchPlan::stopped(iteration, held, budget, StopReason::BudgetExhausted);
        }
        if budget == BudgetStatus::Warning {
            tracing::warn!(iteration, "Budget warning threshold reached, still dispatching");
        }

        let completed: HashSet<&str> = checkpoint.completed.iter().map(String::as_str).collect();
        let batch = self.next_batch(graph, &completed, &checkpoint.running);

        if batch.is_empty() && checkpoint.running.is_empty() {
            let stalled: Vec<String> = graph
                .ids()
                .filter(|id| !completed.contains(id))
                .map(String::from)
                .collect();
            tracing::warn!(iteration, stalled = stalled.len(), "No ready task but work remains");
            let mut plan = DispatchPlan::stopped(iteration, held, budget, StopReason::Stalled);
            plan.stalled = stalled;
            return plan;
        }

        let mut locks = held;
        let launches: Vec<LaunchOrder> = batch
            .into_iter()
            .filter_map(|launch| {
                let task = graph.get(&launch.task_id)?;
                locks.extend(task.lock_touches().iter().cloned());
                Some(LaunchOrder {
                    estimated_cost: self.pricing.estimate(task.size_class(), launch.tier),
                    launch,
                })
            })
            .collect();

        tracing::debug!(
            iteration,
            launches = launches.len(),
            running = checkpoint.running.len(),
            barrier = self.barrier,
            "Planned dispatch"
        );

        DispatchPlan {
            iteration,
            launches,
            locks,
            stop: None,
            stalled: Vec::new(),
            budget,
        }
    }
}

/// Resources held by the running tasks that exist in the graph.
pub fn held_locks(graph: &TaskGraph, running: &BTreeMap<String, ExecutionMode>) -> LockSet {
    lock_set(running.keys().filter_map(|id| graph.get(id)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario() -> TaskGraph {
        TaskGraph::new(vec![
            Task::new("A", "a").with_effort("S"),
            Task::new("B", "b").with_effort("M").with_deps(["A"]).with_touches(["f.txt"]),
            Task::new("C", "c").with_effort("M").with_deps(["A"]).with_touches(["f.txt"]),
        ])
    }

    fn ids(batch: &[Launch]) -> Vec<&str> {
        batch.iter().map(|l| l.task_id.as_str()).collect()
    }

    #[test]
    fn test_continuous_respects_running_locks() {
        let graph = scenario();
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let completed: HashSet<&str> = ["A"].into_iter().collect();

        let batch = dispatcher.next_batch(&graph, &completed, &BTreeMap::new());
        assert_eq!(ids(&batch), vec!["B"]);

        let mut running = BTreeMap::new();
        running.insert("B".to_string(), ExecutionMode::Background);
        assert!(dispatcher.next_batch(&graph, &completed, &running).is_empty());
    }

    #[test]
    fn test_continuous_admits_while_others_run() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_effort("L"),
            Task::new("B", "b").with_effort("M"),
        ]);
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let mut running = BTreeMap::new();
        running.insert("A".to_string(), ExecutionMode::Background);
        let batch = dispatcher.next_batch(&graph, &HashSet::new(), &running);
        assert_eq!(ids(&batch), vec!["B"]);
    }

    #[test]
    fn test_barrier_waits_for_drain() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_effort("L"),
            Task::new("B", "b").with_effort("M"),
        ]);
        let dispatcher = Dispatcher::new(QuotaConfig::default()).with_barrier(true);
        let mut running = BTreeMap::new();
        running.insert("A".to_string(), ExecutionMode::Background);
        assert!(dispatcher.next_batch(&graph, &HashSet::new(), &running).is_empty());

        let completed: HashSet<&str> = ["A"].into_iter().collect();
        let batch = dispatcher.next_batch(&graph, &completed, &BTreeMap::new());
        assert_eq!(ids(&batch), vec!["B"]);
    }

    #[test]
    fn test_barrier_uses_authored_order() {
        let graph = TaskGraph::new(vec![
            Task::new("LOW", "l").with_severity(crate::domain::Severity::Low),
            Task::new("CRIT", "c").with_severity(crate::domain::Severity::Critical),
        ]);
        let dispatcher = Dispatcher::new(QuotaConfig::default()).with_barrier(true);
        let batch = dispatcher.next_batch(&graph, &HashSet::new(), &BTreeMap::new());
        assert_eq!(ids(&batch), vec!["LOW", "CRIT"]);
    }

    #[test]
    fn test_barrier_wave_honors_mode_quotas() {
        let graph = TaskGraph::new((0..5).map(|i| Task::new(format!("S{}", i), "s").with_effort("S")).collect());
        let dispatcher = Dispatcher::new(QuotaConfig::new(6, 2, 8)).with_barrier(true);

        let batch = dispatcher.next_batch(&graph, &HashSet::new(), &BTreeMap::new());
        assert_eq!(ids(&batch), vec!["S0", "S1"]);
        assert!(batch.iter().all(|l| l.mode == ExecutionMode::Foreground));

        // the leftovers go out on the next drain
        let completed: HashSet<&str> = ["S0", "S1"].into_iter().collect();
        let batch = dispatcher.next_batch(&graph, &completed, &BTreeMap::new());
        assert_eq!(ids(&batch), vec!["S2", "S3"]);
    }

    #[test]
    fn test_plan_iteration_launches_and_locks() {
        let graph = scenario();
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let mut checkpoint = Checkpoint::fresh(5);
        checkpoint.completed.push("A".to_string());
        checkpoint.iteration = 4;

        let plan = dispatcher.plan_iteration(&graph, &checkpoint, BudgetStatus::Ok, false);
        assert_eq!(plan.iteration, 4);
        assert_eq!(plan.pairs(), vec![("B", ExecutionMode::Background)]);
        assert!(plan.locks.contains("f.txt"));
        assert!(plan.launches[0].estimated_cost > 0);
        assert!(plan.stop.is_none());
        assert_eq!(plan.budget, BudgetStatus::Ok);
    }

    #[test]
    fn test_plan_iteration_reports_budget_warning() {
        let graph = scenario();
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let plan = dispatcher.plan_iteration(&graph, &Checkpoint::fresh(0), BudgetStatus::Warning, false);
        assert!(plan.stop.is_none());
        assert_eq!(plan.pairs(), vec![("A", ExecutionMode::Foreground)]);
        assert_eq!(plan.budget, BudgetStatus::Warning);
    }

    #[test]
    fn test_plan_iteration_stop_reasons() {
        let graph = scenario();
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let checkpoint = Checkpoint::fresh(5);

        let plan = dispatcher.plan_iteration(&graph, &checkpoint, BudgetStatus::Stop, false);
        assert_eq!(plan.stop, Some(StopReason::BudgetExhausted));
        assert_eq!(plan.budget, BudgetStatus::Stop);
        assert!(plan.launches.is_empty());

        let plan = dispatcher.plan_iteration(&graph, &checkpoint, BudgetStatus::Ok, true);
        assert_eq!(plan.stop, Some(StopReason::GatesMet));

        let mut done = checkpoint.clone();
        done.completed = vec!["A".into(), "B".into(), "C".into()];
        let plan = dispatcher.plan_iteration(&graph, &done, BudgetStatus::Stop, false);
        assert_eq!(plan.stop, Some(StopReason::AllComplete));
    }

    #[test]
    fn test_plan_iteration_stalls_on_cycle() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_deps(["B"]),
            Task::new("B", "b").with_deps(["A"]),
        ]);
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let plan = dispatcher.plan_iteration(&graph, &Checkpoint::fresh(0), BudgetStatus::Ok, false);
        assert_eq!(plan.stop, Some(StopReason::Stalled));
        assert_eq!(plan.stalled, vec!["A", "B"]);
    }

    #[test]
    fn test_waiting_on_running_is_not_a_stall() {
        let graph = scenario();
        let dispatcher = Dispatcher::new(QuotaConfig::default());
        let mut checkpoint = Checkpoint::fresh(0);
        checkpoint.running.insert("A".into(), ExecutionMode::Foreground);
        let plan = dispatcher.plan_iteration(&graph, &checkpoint, BudgetStatus::Ok, false);
        assert!(plan.stop.is_none());
        assert!(plan.launches.is_empty());
    }
}
