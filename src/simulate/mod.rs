//! Discrete-event forecast of the dispatcher.
//!
//! Runs the same `Dispatcher` selection the live loop uses, in virtual
//! minutes, with each task taking exactly its effort duration. Nothing is
//! executed and no checkpoint is written.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

use crate::domain::{ExecutionMode, ModelTier};
use crate::graph::TaskGraph;
use crate::scheduler::Dispatcher;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Re-check interval when ready work is blocked only by quotas
    pub probe_interval_minutes: u64,
    pub max_iterations: u64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            probe_interval_minutes: 15,
            max_iterations: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduledTask {
    pub task_id: String,
    pub start: u64,
    pub end: u64,
    pub mode: ExecutionMode,
    pub tier: ModelTier,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Started,
    Finished,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEvent {
    pub time: u64,
    pub kind: EventKind,
    pub task_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SimulationOutcome {
    Completed,
    /// Work remained but nothing was running or launchable
    Deadlock,
    IterationCap,
}

/// A task ranked by how many tasks directly depend on it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Bottleneck {
    pub task_id: String,
    pub dependents: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SimulationReport {
    pub outcome: SimulationOutcome,
    /// Virtual minutes until the last task finished
    pub makespan: u64,
    pub iterations: u64,
    /// Per-task intervals in start order
    pub schedule: Vec<ScheduledTask>,
    pub timeline: Vec<TimelineEvent>,
    pub bottlenecks: Vec<Bottleneck>,
    /// Tasks that never finished
    pub unfinished: Vec<String>,
}

impl SimulationReport {
    pub fn interval(&self, task_id: &str) -> Option<(u64, u64)> {
        self.schedule
            .iter()
            .find(|s| s.task_id == task_id)
            .map(|s| (s.start, s.end))
    }

    /// Highest concurrency reached at any instant.
    pub fn peak_parallelism(&self) -> usize {
        let mut peak = 0;
        let mut current: usize = 0;
        for event in &self.timeline {
            match event.kind {
                EventKind::Started => {
                    current += 1;
                    peak = peak.max(current);
                }
                EventKind::Finished => current = current.saturating_sub(1),
            }
        }
        peak
    }
}

/// Tasks with at least one dependent, most depended-upon first. Ties keep
/// authored order.
pub fn rank_bottlenecks(graph: &TaskGraph) -> Vec<Bottleneck> {
    let dependents = graph.dependents();
    let mut ranked: Vec<Bottleneck> = graph
        .ids()
        .map(|id| Bottleneck {
            task_id: id.to_string(),
            dependents: dependents.get(id).map_or(0, Vec::len),
        })
        .filter(|b| b.dependents > 0)
        .collect();
    ranked.sort_by(|a, b| b.dependents.cmp(&a.dependents));
    ranked
}

pub struct Simulator {
    dispatcher: Dispatcher,
    config: SimulationConfig,
}

impl Simulator {
    pub fn new(dispatcher: Dispatcher, config: SimulationConfig) -> Self {
        Self { dispatcher, config }
    }

    pub fn run(&self, graph: &TaskGraph) -> SimulationReport {
        let probe = self.config.probe_interval_minutes.max(1);
        let mut now: u64 = 0;
        let mut iterations: u64 = 0;
        let mut completed: Vec<String> = Vec::new();
        let mut running: BTreeMap<String, ExecutionMode> = BTreeMap::new();
        let mut ends: BTreeMap<String, u64> = BTreeMap::new();
        let mut schedule = Vec::new();
        let mut timeline = Vec::new();

        let outcome = loop {
            if completed.len() >= graph.len() {
                break SimulationOutcome::Completed;
            }
            if iterations >= self.config.max_iterations {
                log::warn!("Simulation hit iteration cap of {}", self.config.max_iterations);
                break SimulationOutcome::IterationCap;
            }
            iterations += 1;

            // retire everything whose end time has passed, earliest first
            let mut finished: Vec<(u64, String)> = ends
                .iter()
                .filter(|(_, end)| **end <= now)
                .map(|(id, end)| (*end, id.clone()))
                .collect();
            finished.sort();
            for (end, id) in finished {
                ends.remove(&id);
                running.remove(&id);
                timeline.push(TimelineEvent {
                    time: end,
                    kind: EventKind::Finished,
                    task_id: id.clone(),
                });
                completed.push(id);
            }
            if completed.len() >= graph.len() {
                continue;
            }

            let done: HashSet<&str> = completed.iter().map(String::as_str).collect();
            let running_ids: HashSet<&str> = running.keys().map(String::as_str).collect();
            let pool = graph.ready_tasks(&done, &running_ids).len();
            let batch = self.dispatcher.next_batch(graph, &done, &running);

            for launch in batch.iter() {
                let duration = graph.get(&launch.task_id).map_or(0, |t| t.duration_minutes() as u64);
                let end = now + duration;
                running.insert(launch.task_id.clone(), launch.mode);
                ends.insert(launch.task_id.clone(), end);
                timeline.push(TimelineEvent {
                    time: now,
                    kind: EventKind::Started,
                    task_id: launch.task_id.clone(),
                });
                schedule.push(ScheduledTask {
                    task_id: launch.task_id.clone(),
                    start: now,
                    end,
                    mode: launch.mode,
                    tier: launch.tier,
                });
            }

            let Some(next_end) = ends.values().min().copied() else {
                log::warn!(
                    "Simulation deadlocked at minute {} with {} task(s) unfinished",
                    now,
                    graph.len() - completed.len()
                );
                break SimulationOutcome::Deadlock;
            };

            now = if batch.is_empty() && pool > 0 {
                // blocked only by quotas or locks; probe again, never past the
                // next completion
                (now + probe).min(next_end)
            } else {
                next_end
            };
        };

        let finished: HashSet<&str> = completed.iter().map(String::as_str).collect();
        let unfinished: Vec<String> = graph
            .ids()
            .filter(|id| !finished.contains(id))
            .map(String::from)
            .collect();
        let makespan = timeline
            .iter()
            .filter(|e| e.kind == EventKind::Finished)
            .map(|e| e.time)
            .max()
            .unwrap_or(0);

        log::debug!(
            "Simulation {:?}: makespan {} min over {} iterations",
            outcome,
            makespan,
            iterations
        );

        SimulationReport {
            outcome,
            makespan,
            iterations,
            schedule,
            timeline,
            bottlenecks: rank_bottlenecks(graph),
            unfinished,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Task;
    use crate::scheduler::QuotaConfig;

    fn simulator(quotas: QuotaConfig, barrier: bool) -> Simulator {
        Simulator::new(
            Dispatcher::new(quotas).with_barrier(barrier),
            SimulationConfig::default(),
        )
    }

    fn scenario() -> TaskGraph {
        TaskGraph::new(vec![
            Task::new("A", "a").with_effort("S"),
            Task::new("B", "b").with_effort("M").with_deps(["A"]).with_touches(["f.txt"]),
            Task::new("C", "c").with_effort("M").with_deps(["A"]).with_touches(["f.txt"]),
        ])
    }

    #[test]
    fn test_conflicting_tasks_serialize() {
        let report = simulator(QuotaConfig::default(), false).run(&scenario());
        assert_eq!(report.outcome, SimulationOutcome::Completed);
        assert_eq!(report.interval("A"), Some((0, 30)));
        assert_eq!(report.interval("B"), Some((30, 180)));
        assert_eq!(report.interval("C"), Some((180, 330)));
        assert_eq!(report.makespan, 330);
        assert!(report.unfinished.is_empty());
    }

    #[test]
    fn test_independent_tasks_overlap() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_effort("L"),
            Task::new("B", "b").with_effort("M"),
            Task::new("C", "c").with_effort("M"),
        ]);
        let report = simulator(QuotaConfig::default(), false).run(&graph);
        assert_eq!(report.makespan, 480);
        assert_eq!(report.peak_parallelism(), 3);
    }

    #[test]
    fn test_total_quota_limits_parallelism() {
        let graph = TaskGraph::new((0..4).map(|i| Task::new(format!("T{}", i), "t").with_effort("M")).collect());
        let report = simulator(QuotaConfig::new(6, 2, 2), false).run(&graph);
        assert_eq!(report.peak_parallelism(), 2);
        assert_eq!(report.makespan, 300);
    }

    #[test]
    fn test_barrier_waits_for_slowest() {
        // continuous: C starts when B finishes at 150; barrier: waits for A at 480
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_effort("L"),
            Task::new("B", "b").with_effort("M"),
            Task::new("C", "c").with_effort("M").with_deps(["B"]),
        ]);
        let continuous = simulator(QuotaConfig::default(), false).run(&graph);
        let barrier = simulator(QuotaConfig::default(), true).run(&graph);
        assert_eq!(continuous.interval("C"), Some((150, 300)));
        assert_eq!(continuous.makespan, 480);
        assert_eq!(barrier.interval("C"), Some((480, 630)));
        assert_eq!(barrier.makespan, 630);
    }

    #[test]
    fn test_cycle_deadlocks() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a").with_effort("S"),
            Task::new("B", "b").with_deps(["A", "C"]),
            Task::new("C", "c").with_deps(["B"]),
        ]);
        let report = simulator(QuotaConfig::default(), false).run(&graph);
        assert_eq!(report.outcome, SimulationOutcome::Deadlock);
        assert_eq!(report.unfinished, vec!["B", "C"]);
        assert_eq!(report.makespan, 30);
    }

    #[test]
    fn test_iteration_cap() {
        let graph = TaskGraph::new((0..5).map(|i| Task::new(format!("T{}", i), "t")).collect());
        let sim = Simulator::new(
            Dispatcher::new(QuotaConfig::new(1, 1, 1)),
            SimulationConfig {
                probe_interval_minutes: 15,
                max_iterations: 2,
            },
        );
        let report = sim.run(&graph);
        assert_eq!(report.outcome, SimulationOutcome::IterationCap);
        assert_eq!(report.iterations, 2);
    }

    #[test]
    fn test_empty_graph_completes_immediately() {
        let report = simulator(QuotaConfig::default(), false).run(&TaskGraph::default());
        assert_eq!(report.outcome, SimulationOutcome::Completed);
        assert_eq!(report.makespan, 0);
        assert_eq!(report.iterations, 0);
    }

    #[test]
    fn test_bottleneck_ranking() {
        let graph = TaskGraph::new(vec![
            Task::new("A", "a"),
            Task::new("B", "b").with_deps(["A"]),
            Task::new("C", "c").with_deps(["A", "B"]),
            Task::new("D", "d").with_deps(["A"]),
        ]);
        let ranked = rank_bottlenecks(&graph);
        assert_eq!(
            ranked,
            vec![
                Bottleneck {
                    task_id: "A".into(),
                    dependents: 3
                },
                Bottleneck {
                    task_id: "B".into(),
                    dependents: 1
                },
            ]
        );
    }
}
