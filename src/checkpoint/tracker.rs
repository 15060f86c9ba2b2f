//! Live checkpoint state and its mutations.
//!
//! Every accepted mutation derives the successor checkpoint, persists it, and
//! only then replaces the in-memory copy. A failed save leaves the tracker
//! exactly as it was. Duplicate reports are no-ops: no iteration bump, no write.

use std::collections::{BTreeMap, HashSet};

use super::journal::{JournalEntry, JournalEvent, TransitionJournal};
use super::retry::RetryDecision;
use super::spawn::{SpawnCandidate, SpawnDecision, evaluate};
use super::store::CheckpointStore;
use crate::budget::{BudgetGovernor, PricingConfig};
use crate::domain::{Checkpoint, MicroUsd, Task, Transition};
use crate::error::{DispatchError, Result};
use crate::graph::TaskGraph;
use crate::scheduler::{LaunchOrder, execution_mode};

/// Result of applying a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    /// Persisted as this iteration
    Applied { iteration: u64 },
    /// Already in the requested state
    Unchanged,
}

impl TransitionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, TransitionOutcome::Applied { .. })
    }
}

pub struct Tracker<S: CheckpointStore> {
    store: S,
    checkpoint: Checkpoint,
    pricing: PricingConfig,
    ceiling: MicroUsd,
    journal: Option<TransitionJournal>,
}

impl<S: CheckpointStore> Tracker<S> {
    /// Resume from the store's latest checkpoint.
    ///
    /// With no checkpoint, start fresh: tasks authored as done count as
    /// completed and the spawn budget comes from `auto_spawn_budget`.
    pub fn resume(store: S, graph: &TaskGraph, auto_spawn_budget: u32) -> Result<Self> {
        let checkpoint = match store.load()? {
            Some(checkpoint) => {
                log::info!(
                    "Resuming from checkpoint iteration {} ({} completed, {} running)",
                    checkpoint.iteration,
                    checkpoint.completed.len(),
                    checkpoint.running.len()
                );
                checkpoint
            }
            None => {
                let mut fresh = Checkpoint::fresh(auto_spawn_budget);
                fresh.completed = graph
                    .tasks()
                    .iter()
                    .filter(|t| t.status.is_done())
                    .map(|t| t.id.clone())
                    .collect();
                log::info!(
                    "No checkpoint found, starting fresh with {} task(s) already done",
                    fresh.completed.len()
                );
                fresh
            }
        };

        Ok(Self {
            store,
            checkpoint,
            pricing: PricingConfig::default(),
            ceiling: 0,
            journal: None,
        })
    }

    pub fn with_pricing(mut self, pricing: PricingConfig) -> Self {
        self.pricing = pricing;
        self
    }

    /// Spend ceiling in USD. Zero, the default, disables the governor.
    pub fn with_budget(mut self, ceiling_usd: f64) -> Self {
        self.ceiling = BudgetGovernor::from_usd(ceiling_usd).ceiling();
        self
    }

    pub fn with_journal(mut self, journal: TransitionJournal) -> Self {
        self.journal = Some(journal);
        self
    }

    pub fn checkpoint(&self) -> &Checkpoint {
        &self.checkpoint
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Governor seeded with the spend recorded so far.
    pub fn budget(&self) -> BudgetGovernor {
        BudgetGovernor::new(self.ceiling).with_spent(self.checkpoint.spent_micro_usd)
    }

    /// Apply a reported status transition.
    pub fn apply(&mut self, graph: &TaskGraph, task_id: &str, transition: Transition) -> Result<TransitionOutcome> {
        let task = graph
            .get(task_id)
            .ok_or_else(|| DispatchError::UnknownTask(task_id.to_string()))?;
        let current = &self.checkpoint;

        let next = match transition {
            Transition::Completed => {
                if current.is_completed(task_id) {
                    return Ok(TransitionOutcome::Unchanged);
                }
                let mut next = current.successor();
                next.running.remove(task_id);
                next.completed.push(task_id.to_string());
                let mut governor = self.budget();
                governor.record(self.pricing.estimate_task(task));
                next.spent_micro_usd = governor.spent();
                next
            }
            Transition::Running => {
                if current.is_running(task_id) {
                    return Ok(TransitionOutcome::Unchanged);
                }
                if current.is_completed(task_id) {
                    log::warn!("Ignoring running report for completed task {}", task_id);
                    return Ok(TransitionOutcome::Unchanged);
                }
                if !self.deps_done(graph, task) {
                    log::warn!("Ignoring running report for {}: dependencies not completed", task_id);
                    return Ok(TransitionOutcome::Unchanged);
                }
                let mut next = current.successor();
                next.running.insert(task_id.to_string(), execution_mode(task));
                next
            }
            Transition::Failed => {
                if !current.is_running(task_id) && !current.is_completed(task_id) {
                    return Ok(TransitionOutcome::Unchanged);
                }
                let mut next = current.successor();
                next.running.remove(task_id);
                // explicit failure is the one way completion is retracted
                next.completed.retain(|id| id != task_id);
                next
            }
        };

        self.commit(
            next,
            vec![JournalEvent::Transition {
                task_id: task_id.to_string(),
                transition,
            }],
        )
    }

    /// Mark dispatched launches as running in a single checkpoint.
    ///
    /// Launches for unknown tasks or tasks whose dependencies are not yet
    /// completed are skipped.
    pub fn record_launches(&mut self, graph: &TaskGraph, launches: &[LaunchOrder]) -> Result<TransitionOutcome> {
        let mut next = self.checkpoint.successor();
        let mut events = Vec::new();
        for order in launches {
            let launch = &order.launch;
            if next.is_running(&launch.task_id) || next.is_completed(&launch.task_id) {
                continue;
            }
            match graph.get(&launch.task_id) {
                Some(task) if self.deps_done(graph, task) => {}
                _ => {
                    log::warn!("Skipping launch of {}: unknown or dependencies not completed", launch.task_id);
                    continue;
                }
            }
            next.running.insert(launch.task_id.clone(), launch.mode);
            events.push(JournalEvent::Launch {
                task_id: launch.task_id.clone(),
                mode: launch.mode,
            });
        }
        if events.is_empty() {
            return Ok(TransitionOutcome::Unchanged);
        }
        self.commit(next, events)
    }

    /// Record a retry attempt. The fourth attempt is refused without a write.
    pub fn record_retry(&mut self, graph: &TaskGraph, task_id: &str) -> Result<RetryDecision> {
        if !graph.contains(task_id) {
            return Err(DispatchError::UnknownTask(task_id.to_string()));
        }

        let decision = RetryDecision::for_count(self.checkpoint.retry_count(task_id));
        match decision {
            RetryDecision::Allowed { attempt } => {
                let mut next = self.checkpoint.successor();
                next.retry_counts.insert(task_id.to_string(), attempt);
                self.commit(
                    next,
                    vec![JournalEvent::Retry {
                        task_id: task_id.to_string(),
                        attempt,
                    }],
                )?;
            }
            RetryDecision::Refused { attempts } => {
                tracing::warn!(task = %task_id, attempts, "Retry ceiling reached, manual intervention required");
            }
        }
        Ok(decision)
    }

    /// Evaluate discovered work and, when accepted, consume spawn budget and
    /// remember its key.
    pub fn register_spawn(&mut self, graph: &TaskGraph, candidate: &SpawnCandidate) -> Result<SpawnDecision> {
        let source = graph
            .get(&candidate.source_task)
            .ok_or_else(|| DispatchError::UnknownTask(candidate.source_task.clone()))?;

        let decision = evaluate(candidate, source.auto_spawn_allowed, &self.checkpoint);
        match &decision {
            SpawnDecision::Accepted { dedup_key } => {
                let mut next = self.checkpoint.successor();
                next.dedup_keys.insert(dedup_key.clone());
                next.auto_spawn_budget -= 1;
                self.commit(
                    next,
                    vec![JournalEvent::Spawn {
                        source_task: candidate.source_task.clone(),
                        dedup_key: dedup_key.clone(),
                    }],
                )?;
            }
            SpawnDecision::Escalate => {
                tracing::warn!(source = %candidate.source_task, title = %candidate.title, "Critical discovery, escalating");
            }
            other => {
                tracing::debug!(source = %candidate.source_task, decision = ?other, "Spawn not accepted");
            }
        }
        Ok(decision)
    }

    /// Persist the latest score for a quality gate.
    pub fn record_gate(&mut self, name: &str, score: f64) -> Result<TransitionOutcome> {
        if !score.is_finite() {
            return Err(DispatchError::InvalidGateScore {
                gate: name.to_string(),
                score,
            });
        }
        if self.checkpoint.gate_scores.get(name) == Some(&score) {
            return Ok(TransitionOutcome::Unchanged);
        }
        let mut next = self.checkpoint.successor();
        next.gate_scores.insert(name.to_string(), score);
        self.commit(
            next,
            vec![JournalEvent::Gate {
                name: name.to_string(),
                score,
            }],
        )
    }

    /// True when there is at least one target and every target is reached.
    pub fn gates_met(&self, targets: &BTreeMap<String, f64>) -> bool {
        !targets.is_empty()
            && targets
                .iter()
                .all(|(name, target)| self.checkpoint.gate_scores.get(name).is_some_and(|score| score >= target))
    }

    fn deps_done(&self, graph: &TaskGraph, task: &Task) -> bool {
        let completed: HashSet<&str> = self.checkpoint.completed.iter().map(String::as_str).collect();
        graph.deps_satisfied(task, &completed)
    }

    fn commit(&mut self, next: Checkpoint, events: Vec<JournalEvent>) -> Result<TransitionOutcome> {
        self.store.save(&next)?;
        let iteration = next.iteration;
        self.checkpoint = next;

        if let Some(journal) = &self.journal {
            for event in events {
                if let Err(e) = journal.append(&JournalEntry::new(iteration, event)) {
                    log::warn!("Failed to append journal entry at {}: {}", journal.path().display(), e);
                }
            }
        }

        tracing::debug!(iteration, "Checkpoint committed");
        Ok(TransitionOutcome::Applied { iteration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::MemoryCheckpointStore;
    use crate::checkpoint::retry::MAX_RETRIES;
    use crate::domain::{AutoSpawnPolicy, ExecutionMode, Severity, Task, TaskStatus};
    use crate::budget::{BudgetStatus, EffortTokens, TierPricing, TierRates};
    use crate::scheduler::{Dispatcher, Launch, QuotaConfig};

    fn graph() -> TaskGraph {
        TaskGraph::new(vec![
            Task::new("A", "a").with_effort("S"),
            Task::new("B", "b").with_effort("M").with_deps(["A"]),
            Task::new("C", "c").with_effort("M").with_auto_spawn(AutoSpawnPolicy::Always),
        ])
    }

    fn tracker() -> Tracker<MemoryCheckpointStore> {
        Tracker::resume(MemoryCheckpointStore::new(), &graph(), 2).unwrap()
    }

    #[test]
    fn test_fresh_start_reconciles_done_tasks() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_status(TaskStatus::Done),
            Task::new("B", "b").with_status(TaskStatus::Doing),
        ]);
        let tracker = Tracker::resume(MemoryCheckpointStore::new(), &graph, 4).unwrap();
        assert_eq!(tracker.checkpoint().completed, vec!["A"]);
        assert_eq!(tracker.checkpoint().iteration, 0);
        assert_eq!(tracker.checkpoint().auto_spawn_budget, 4);
        assert!(tracker.store().load().unwrap().is_none());
    }

    #[test]
    fn test_resume_prefers_stored_checkpoint() {
        let store = MemoryCheckpointStore::new();
        let mut saved = Checkpoint::fresh(1);
        saved.iteration = 9;
        saved.completed = vec!["B".into()];
        store.save(&saved).unwrap();

        let tracker = Tracker::resume(store, &graph(), 5).unwrap();
        assert_eq!(tracker.checkpoint(), &saved);
    }

    #[test]
    fn test_lifecycle_bumps_iteration_and_persists() {
        let graph = graph();
        let mut tracker = tracker();

        assert_eq!(
            tracker.apply(&graph, "A", Transition::Running).unwrap(),
            TransitionOutcome::Applied { iteration: 1 }
        );
        assert_eq!(tracker.checkpoint().running.get("A"), Some(&ExecutionMode::Foreground));

        assert_eq!(
            tracker.apply(&graph, "A", Transition::Completed).unwrap(),
            TransitionOutcome::Applied { iteration: 2 }
        );
        assert!(tracker.checkpoint().running.is_empty());
        assert_eq!(tracker.checkpoint().completed, vec!["A"]);
        assert!(tracker.checkpoint().spent_micro_usd > 0);

        let stored = tracker.store().load().unwrap().unwrap();
        assert_eq!(&stored, tracker.checkpoint());
        assert_eq!(tracker.store().history().unwrap(), vec![1, 2]);
    }

    #[test]
    fn test_duplicate_transitions_are_noops() {
        let graph = graph();
        let mut tracker = tracker();
        tracker.apply(&graph, "A", Transition::Completed).unwrap();
        let spent = tracker.checkpoint().spent_micro_usd;

        assert_eq!(
            tracker.apply(&graph, "A", Transition::Completed).unwrap(),
            TransitionOutcome::Unchanged
        );
        assert_eq!(tracker.checkpoint().iteration, 1);
        assert_eq!(tracker.checkpoint().spent_micro_usd, spent);
        assert_eq!(
            tracker.apply(&graph, "A", Transition::Running).unwrap(),
            TransitionOutcome::Unchanged
        );
        assert_eq!(
            tracker.apply(&graph, "B", Transition::Failed).unwrap(),
            TransitionOutcome::Unchanged
        );
        assert_eq!(tracker.store().history().unwrap(), vec![1]);
    }

    #[test]
    fn test_failure_releases_and_retracts() {
        let graph = graph();
        let mut tracker = tracker();
        tracker.apply(&graph, "A", Transition::Completed).unwrap();
        tracker.apply(&graph, "B", Transition::Running).unwrap();
        assert!(tracker.checkpoint().is_running("B"));
        tracker.apply(&graph, "B", Transition::Failed).unwrap();
        assert!(!tracker.checkpoint().is_running("B"));

        tracker.apply(&graph, "A", Transition::Failed).unwrap();
        assert!(!tracker.checkpoint().is_completed("A"));
    }

    #[test]
    fn test_unknown_task_is_error() {
        let mut tracker = tracker();
        let err = tracker.apply(&graph(), "Z", Transition::Completed).unwrap_err();
        assert!(matches!(err, DispatchError::UnknownTask(id) if id == "Z"));
    }

    #[test]
    fn test_retry_ceiling() {
        let graph = graph();
        let mut tracker = tracker();
        for expected in 1..=MAX_RETRIES {
            assert_eq!(
                tracker.record_retry(&graph, "B").unwrap(),
                RetryDecision::Allowed { attempt: expected }
            );
            assert_eq!(tracker.checkpoint().retry_count("B"), expected);
        }
        let iteration = tracker.checkpoint().iteration;
        assert_eq!(
            tracker.record_retry(&graph, "B").unwrap(),
            RetryDecision::Refused { attempts: 3 }
        );
        assert_eq!(tracker.checkpoint().iteration, iteration);
    }

    #[test]
    fn test_record_launches_single_iteration() {
        let graph = graph();
        let mut tracker = tracker();
        let orders: Vec<LaunchOrder> = ["A", "C"]
            .iter()
            .map(|id| LaunchOrder {
                launch: Launch::for_task(graph.get(id).unwrap()),
                estimated_cost: 0,
            })
            .collect();
        assert_eq!(
            tracker.record_launches(&graph, &orders).unwrap(),
            TransitionOutcome::Applied { iteration: 1 }
        );
        assert_eq!(tracker.checkpoint().running.len(), 2);
        assert_eq!(tracker.record_launches(&graph, &orders).unwrap(), TransitionOutcome::Unchanged);
    }

    #[test]
    fn test_running_requires_completed_dependencies() {
        let graph = graph();
        let mut tracker = tracker();
        assert_eq!(
            tracker.apply(&graph, "B", Transition::Running).unwrap(),
            TransitionOutcome::Unchanged
        );
        assert!(tracker.checkpoint().running.is_empty());
        assert_eq!(tracker.checkpoint().iteration, 0);

        let early = LaunchOrder {
            launch: Launch::for_task(graph.get("B").unwrap()),
            estimated_cost: 0,
        };
        assert_eq!(
            tracker.record_launches(&graph, std::slice::from_ref(&early)).unwrap(),
            TransitionOutcome::Unchanged
        );
        assert!(tracker.store().load().unwrap().is_none());

        tracker.apply(&graph, "A", Transition::Completed).unwrap();
        assert!(tracker.record_launches(&graph, &[early]).unwrap().is_applied());
        assert!(tracker.checkpoint().is_running("B"));
    }

    #[test]
    fn test_register_spawn_consumes_budget() {
        let graph = graph();
        let mut tracker = tracker();
        let first = SpawnCandidate::new("C", "Refactor parser").with_severity(Severity::High);
        assert!(matches!(
            tracker.register_spawn(&graph, &first).unwrap(),
            SpawnDecision::Accepted { .. }
        ));
        assert_eq!(tracker.checkpoint().auto_spawn_budget, 1);
        assert!(matches!(
            tracker.register_spawn(&graph, &first).unwrap(),
            SpawnDecision::Duplicate { .. }
        ));

        let second = SpawnCandidate::new("C", "Add tests");
        tracker.register_spawn(&graph, &second).unwrap();
        let third = SpawnCandidate::new("C", "Update docs");
        assert_eq!(
            tracker.register_spawn(&graph, &third).unwrap(),
            SpawnDecision::BudgetExhausted
        );
        assert_eq!(tracker.checkpoint().dedup_keys.len(), 2);
    }

    #[test]
    fn test_gates() {
        let mut tracker = tracker();
        let mut targets = BTreeMap::new();
        assert!(!tracker.gates_met(&targets));

        targets.insert("coverage".to_string(), 0.8);
        targets.insert("lint".to_string(), 1.0);
        tracker.record_gate("coverage", 0.9).unwrap();
        assert!(!tracker.gates_met(&targets));
        tracker.record_gate("lint", 1.0).unwrap();
        assert!(tracker.gates_met(&targets));

        assert_eq!(tracker.record_gate("lint", 1.0).unwrap(), TransitionOutcome::Unchanged);
    }

    #[test]
    fn test_non_finite_gate_score_is_rejected() {
        let mut tracker = tracker();
        tracker.record_gate("coverage", 0.5).unwrap();
        for score in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = tracker.record_gate("coverage", score).unwrap_err();
            assert!(matches!(err, DispatchError::InvalidGateScore { ref gate, .. } if gate == "coverage"));
        }
        assert_eq!(tracker.checkpoint().iteration, 1);
        assert_eq!(tracker.checkpoint().gate_scores.get("coverage"), Some(&0.5));

        // the stored checkpoint still loads
        let stored = tracker.store().load().unwrap().unwrap();
        assert_eq!(&stored, tracker.checkpoint());
    }

    #[test]
    fn test_budget_seeded_from_checkpoint() {
        let graph = graph();
        let mut tracker = tracker();
        tracker.apply(&graph, "A", Transition::Completed).unwrap();
        let governor = tracker.budget();
        assert_eq!(governor.spent(), tracker.checkpoint().spent_micro_usd);
        assert_eq!(governor.ceiling(), 0);
        assert_eq!(governor.status(), BudgetStatus::Ok);
    }

    // every task estimates to $4.00: 1M tokens at $4 per million either way
    fn four_dollar_pricing() -> PricingConfig {
        let rates = TierRates::new(4.0, 4.0);
        PricingConfig {
            tiers: TierPricing {
                fast: rates,
                balanced: rates,
                capable: rates,
            },
            tokens: EffortTokens {
                s: 1_000_000,
                m: 1_000_000,
                l: 1_000_000,
                xl: 1_000_000,
            },
        }
    }

    #[test]
    fn test_completion_spend_crosses_budget_thresholds() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_effort("M"),
            Task::new("B", "b").with_effort("M"),
            Task::new("C", "c").with_effort("M"),
        ]);
        let mut tracker = Tracker::resume(MemoryCheckpointStore::new(), &graph, 0)
            .unwrap()
            .with_pricing(four_dollar_pricing())
            .with_budget(10.0);
        let dispatcher = Dispatcher::new(QuotaConfig::default());

        tracker.apply(&graph, "A", Transition::Completed).unwrap();
        assert_eq!(tracker.checkpoint().spent_micro_usd, 4_000_000);
        assert_eq!(tracker.budget().status(), BudgetStatus::Ok);

        tracker.apply(&graph, "B", Transition::Completed).unwrap();
        assert_eq!(tracker.budget().status(), BudgetStatus::Warning);
        let plan = dispatcher.plan_iteration(&graph, tracker.checkpoint(), tracker.budget().status(), false);
        assert_eq!(plan.budget, BudgetStatus::Warning);
        assert_eq!(plan.pairs().len(), 1);

        tracker.apply(&graph, "C", Transition::Completed).unwrap();
        let governor = tracker.budget();
        assert_eq!(governor.status(), BudgetStatus::Stop);
        assert!((governor.fraction_consumed() - 1.2).abs() < 1e-9);
        assert_eq!(tracker.store().load().unwrap().unwrap().spent_micro_usd, 12_000_000);
    }
}
