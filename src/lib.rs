//! swarm-dispatch - dependency-aware dispatch for parallel agent swarms
//!
//! A plan is a set of tasks with dependencies, effort estimates and the
//! resources they touch. swarm-dispatch validates the plan, decides which
//! tasks may run together without write conflicts, releases them under
//! concurrency quotas and a spend ceiling, and checkpoints every transition
//! so an interrupted run resumes where it stopped.

pub mod budget;
pub mod checkpoint;
pub mod diagnostics;
pub mod domain;
pub mod error;
pub mod graph;
pub mod id;
pub mod plan;
pub mod scheduler;
pub mod simulate;

pub use error::{DispatchError, Result};
