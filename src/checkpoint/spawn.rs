//! Auto-spawn of work discovered while a task runs.
//!
//! A discovery is accepted only once (by content key), only while the spawn
//! budget lasts, and only when the source task's policy permits it. Critical
//! discoveries always go to a human.

use serde::{Deserialize, Serialize};

use crate::domain::{AutoSpawnPolicy, Checkpoint, Severity, Task};
use crate::id::dedup_key;

/// Follow-up work reported by a running task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpawnCandidate {
    pub title: String,
    #[serde(default)]
    pub touches: Vec<String>,
    #[serde(default)]
    pub severity: Severity,
    pub source_task: String,
}

impl SpawnCandidate {
    pub fn new(source_task: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            touches: Vec::new(),
            severity: Severity::default(),
            source_task: source_task.into(),
        }
    }

    pub fn with_touches<I, S>(mut self, touches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.touches = touches.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn dedup_key(&self) -> String {
        dedup_key(&self.title, &self.touches)
    }

    /// Task record for an accepted candidate. It depends on its source task.
    pub fn into_task(self, id: impl Into<String>) -> Task {
        Task::new(id, self.title)
            .with_deps([self.source_task])
            .with_touches(self.touches)
            .with_severity(self.severity)
            .with_auto_spawn(AutoSpawnPolicy::Never)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum SpawnDecision {
    Accepted { dedup_key: String },
    /// Same key spawned before
    Duplicate { dedup_key: String },
    BudgetExhausted,
    /// Source task policy forbids it
    NotAllowed,
    /// Critical discovery; stop and ask a human
    Escalate,
}

/// Decide what to do with `candidate` without mutating anything.
pub fn evaluate(candidate: &SpawnCandidate, policy: AutoSpawnPolicy, checkpoint: &Checkpoint) -> SpawnDecision {
    let key = candidate.dedup_key();
    if checkpoint.dedup_keys.contains(&key) {
        return SpawnDecision::Duplicate { dedup_key: key };
    }
    if candidate.severity == Severity::Critical {
        return SpawnDecision::Escalate;
    }

    let permitted = match policy {
        AutoSpawnPolicy::Never => false,
        AutoSpawnPolicy::SafeOnly => candidate.severity <= Severity::Medium,
        AutoSpawnPolicy::Always => true,
    };
    if !permitted {
        return SpawnDecision::NotAllowed;
    }

    if checkpoint.auto_spawn_budget == 0 {
        return SpawnDecision::BudgetExhausted;
    }

    SpawnDecision::Accepted { dedup_key: key }
}
