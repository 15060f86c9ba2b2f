//! Scheduling: scoring, batch selection, wave grouping and the dispatcher.
//!
//! This module provides:
//! - **Priority scoring**: critical path, severity, read-only and effort
//!   weights, plus execution mode and model tier selection.
//! - **Batch selection**: greedy, quota-aware, lock-respecting choice of the
//!   next tasks to launch.
//! - **Wave grouping**: offline barrier partition of the whole graph.
//! - **Dispatcher**: one control-loop step over a checkpoint, in continuous
//!   or barrier mode.
//!
//! # Example
//!
//! ```ignore
//! use swarm_dispatch::scheduler::{Dispatcher, QuotaConfig};
//!
//! let dispatcher = Dispatcher::new(QuotaConfig::default());
//! let plan = dispatcher.plan_iteration(&graph, &checkpoint, budget.status(), false);
//! for (task, mode) in plan.pairs() {
//!     println!("{task} {mode}");
//! }
//! ```

mod dispatcher;
mod priority;
mod select;
mod waves;

pub use dispatcher::{DispatchPlan, Dispatcher, LaunchOrder, StopReason, held_locks};
pub use priority::{
    CRITICAL_PATH_BONUS, EFFORT_L, EFFORT_M, EFFORT_S, EFFORT_XL, READ_ONLY_BONUS, SEVERITY_CRITICAL, SEVERITY_HIGH,
    SEVERITY_LOW, SEVERITY_MEDIUM, effort_weight, execution_mode, priority_score, select_model_tier, severity_weight,
};
pub use select::{Launch, QuotaConfig, RunningCounts, admit, select_batch};
pub use waves::{WavePlan, group_into_waves, pack_wave};
