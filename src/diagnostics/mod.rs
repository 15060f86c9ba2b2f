//! Advisory plan diagnostics.
//!
//! Estimates, lock plan, bottlenecks and anti-pattern warnings. Nothing here
//! blocks dispatch.

use std::collections::BTreeMap;
use std::fmt;

use crate::domain::SizeClass;
use crate::graph::{CriticalPath, TaskGraph, analyze, lock_plan};
use crate::scheduler::{WavePlan, group_into_waves};
use crate::simulate::{Bottleneck, rank_bottlenecks};

/// Below this parallel speedup the plan is flagged as mostly serial
pub const LOW_SPEEDUP_THRESHOLD: f64 = 1.2;
/// An XL task touching more resources than this should be split
pub const OVERSIZED_TOUCH_LIMIT: usize = 5;
/// A resource with this many writers serializes too much work
pub const HOTSPOT_WRITERS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimates {
    /// Every task back to back
    pub serial_minutes: u64,
    /// Sum over waves of the longest task in the wave
    pub parallel_minutes: u64,
    pub speedup: f64,
}

impl Estimates {
    pub fn new(serial_minutes: u64, parallel_minutes: u64) -> Self {
        let speedup = if parallel_minutes > 0 {
            serial_minutes as f64 / parallel_minutes as f64
        } else {
            1.0
        };
        Self {
            serial_minutes,
            parallel_minutes,
            speedup,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlanWarning {
    LowSpeedup { speedup: f64 },
    OversizedTask { task_id: String, touches: usize },
    LockHotspot { resource: String, writers: Vec<String> },
    DanglingDependency { task_id: String, dependency: String },
    Unscheduled { task_ids: Vec<String> },
}

impl fmt::Display for PlanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanWarning::LowSpeedup { speedup } => write!(
                f,
                "Parallel speedup {:.2}x is below {:.1}x; the plan is mostly serial",
                speedup, LOW_SPEEDUP_THRESHOLD
            ),
            PlanWarning::OversizedTask { task_id, touches } => {
                write!(f, "Task {} is XL and touches {} resources; consider splitting it", task_id, touches)
            }
            PlanWarning::LockHotspot { resource, writers } => write!(
                f,
                "Resource {} is written by {} tasks ({}); they will run one at a time",
                resource,
                writers.len(),
                writers.join(", ")
            ),
            PlanWarning::DanglingDependency { task_id, dependency } => write!(
                f,
                "Task {} depends on {} which is not in the plan; treated as satisfied",
                task_id, dependency
            ),
            PlanWarning::Unscheduled { task_ids } => {
                write!(f, "Tasks never become ready: {}", task_ids.join(", "))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub critical_path: CriticalPath,
    pub waves: WavePlan,
    pub estimates: Estimates,
    pub lock_plan: BTreeMap<String, Vec<String>>,
    pub bottlenecks: Vec<Bottleneck>,
    pub warnings: Vec<PlanWarning>,
}

/// Analyse a plan without changing it.
pub fn diagnose(graph: &TaskGraph) -> Diagnostics {
    let critical_path = analyze(graph).critical;
    let waves = group_into_waves(graph);
    let estimates = Estimates::new(graph.serial_minutes(), waves.parallel_minutes(graph));
    let lock_plan = lock_plan(graph);

    let mut warnings = Vec::new();

    if graph.len() > 1 && estimates.speedup < LOW_SPEEDUP_THRESHOLD {
        warnings.push(PlanWarning::LowSpeedup {
            speedup: estimates.speedup,
        });
    }

    for task in graph.tasks() {
        let touches = task.lock_touches().len();
        if task.size_class() == SizeClass::XL && touches > OVERSIZED_TOUCH_LIMIT {
            warnings.push(PlanWarning::OversizedTask {
                task_id: task.id.clone(),
                touches,
            });
        }
    }

    for (resource, writers) in &lock_plan {
        if writers.len() >= HOTSPOT_WRITERS {
            warnings.push(PlanWarning::LockHotspot {
                resource: resource.clone(),
                writers: writers.clone(),
            });
        }
    }

    for (task_id, dependency) in graph.dangling_dependencies() {
        warnings.push(PlanWarning::DanglingDependency { task_id, dependency });
    }

    if !waves.unscheduled.is_empty() {
        warnings.push(PlanWarning::Unscheduled {
            task_ids: waves.unscheduled.clone(),
        });
    }

    for warning in &warnings {
        log::debug!("Plan warning: {}", warning);
    }

    Diagnostics {
        critical_path,
        waves,
        estimates,
        lock_plan,
        bottlenecks: rank_bottlenecks(graph),
        warnings,
    }
}
