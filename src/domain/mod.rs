//! Domain types for swarm-dispatch
//!
//! - Task: the schedulable unit and its classification enums
//! - Effort: authored size and its duration mapping
//! - TaskStatus / Transition: authored lifecycle and reported state changes
//! - Checkpoint: durable snapshot of scheduler progress

pub mod checkpoint;
pub mod effort;
pub mod status;
pub mod task;

pub use checkpoint::{Checkpoint, MicroUsd};
pub use effort::{DEFAULT_EFFORT_MINUTES, Effort, SizeClass};
pub use status::{TaskStatus, Transition};
pub use task::{AutoSpawnPolicy, ConcurrencyClass, ExecutionMode, ModelTier, Severity, Task};
