//! Task graph model and the analyses both schedulers build on.
//!
//! - **model**: ordered task set with dependency helpers
//! - **validate**: cycle detection, unknown-dependency and duplicate checks,
//!   topological order
//! - **critical_path**: longest effort-weighted dependency chain
//! - **conflict**: write-set overlap and lock inference

pub mod conflict;
pub mod critical_path;
pub mod model;
pub mod validate;

pub use conflict::{LockSet, conflicts, conflicts_with_locks, has_conflict, lock_plan, lock_set};
pub use critical_path::{CriticalPath, PathAnalysis, analyze, mark_critical_path};
pub use model::{Dependents, TaskGraph};
pub use validate::{DanglingPolicy, ValidatedGraph, find_cycles, topological_order, validate_graph};
