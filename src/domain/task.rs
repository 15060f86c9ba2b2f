//! Task record and its classification enums
//!
//! A Task is the unit of schedulable work. Records arrive from plan ingestion;
//! the only field refined here is `is_on_critical_path`, which graph analysis sets.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::effort::{Effort, SizeClass};
use super::status::TaskStatus;

/// Write behaviour of a task, governs conflicts and execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConcurrencyClass {
    /// Never takes a lock, its `touches` are ignored
    ReadOnly,
    /// Writes resources private to this task
    #[default]
    WriteLocal,
    /// Writes resources other work also depends on
    WriteShared,
}

impl ConcurrencyClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConcurrencyClass::ReadOnly => "read-only",
            ConcurrencyClass::WriteLocal => "write-local",
            ConcurrencyClass::WriteShared => "write-shared",
        }
    }
}

impl fmt::Display for ConcurrencyClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the execution layer should run a dispatched task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Supervised, may prompt the user
    Foreground,
    /// Isolated, runs unattended
    Background,
}

impl ExecutionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionMode::Foreground => "foreground",
            ExecutionMode::Background => "background",
        }
    }
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Execution tier, ordered from cheapest to most capable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Fast,
    Balanced,
    Capable,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelTier::Fast => "fast",
            ModelTier::Balanced => "balanced",
            ModelTier::Capable => "capable",
        }
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether work discovered while running a task may be spawned automatically
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoSpawnPolicy {
    Never,
    /// Only low/medium severity discoveries
    #[default]
    SafeOnly,
    Always,
}

/// The unit of schedulable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Stable identifier, e.g. "T01"
    #[serde(default)]
    pub id: String,

    #[serde(default)]
    pub title: String,

    #[serde(default)]
    pub owner_role: String,

    /// Tasks that must be completed first
    #[serde(default)]
    pub depends_on: Vec<String>,

    /// Resources this task writes
    #[serde(default)]
    pub touches: Vec<String>,

    #[serde(default)]
    pub concurrency_class: ConcurrencyClass,

    /// Forces foreground execution
    #[serde(default)]
    pub needs_user_input: bool,

    #[serde(default)]
    pub effort: Effort,

    #[serde(default)]
    pub severity: Severity,

    /// Explicit tier override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_preference: Option<ModelTier>,

    /// Set by critical path analysis, never authored
    #[serde(default)]
    pub is_on_critical_path: bool,

    #[serde(default)]
    pub status: TaskStatus,

    /// Free-text hint about follow-up work this task may surface
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discoveries_expected: Option<String>,

    #[serde(default)]
    pub auto_spawn_allowed: AutoSpawnPolicy,
}

impl Task {
    /// Create a write-local, medium-severity task with no dependencies.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            owner_role: String::new(),
            depends_on: Vec::new(),
            touches: Vec::new(),
            concurrency_class: ConcurrencyClass::default(),
            needs_user_input: false,
            effort: Effort::default(),
            severity: Severity::default(),
            model_preference: None,
            is_on_critical_path: false,
            status: TaskStatus::default(),
            discoveries_expected: None,
            auto_spawn_allowed: AutoSpawnPolicy::default(),
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.owner_role = role.into();
        self
    }

    pub fn with_deps<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_touches<I, S>(mut self, touches: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.touches = touches.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_class(mut self, class: ConcurrencyClass) -> Self {
        self.concurrency_class = class;
        self
    }

    pub fn with_effort(mut self, effort: impl Into<Effort>) -> Self {
        self.effort = effort.into();
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn with_user_input(mut self, needs_user_input: bool) -> Self {
        self.needs_user_input = needs_user_input;
        self
    }

    pub fn with_model(mut self, tier: ModelTier) -> Self {
        self.model_preference = Some(tier);
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_auto_spawn(mut self, policy: AutoSpawnPolicy) -> Self {
        self.auto_spawn_allowed = policy;
        self
    }

    pub fn is_read_only(&self) -> bool {
        self.concurrency_class == ConcurrencyClass::ReadOnly
    }

    /// Resources this task locks while running. Empty for read-only tasks,
    /// whatever they declare.
    pub fn lock_touches(&self) -> &[String] {
        if self.is_read_only() { &[] } else { &self.touches }
    }

    pub fn duration_minutes(&self) -> u32 {
        self.effort.minutes()
    }

    pub fn size_class(&self) -> SizeClass {
        self.effort.size_class()
    }
}
