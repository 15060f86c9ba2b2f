//! Priority scoring, execution mode and model tier selection.
//!
//! Tasks are prioritized by:
//! - Critical path bonus (+100)
//! - Severity weight (critical=50, high=30, medium=10, low=5)
//! - Read-only bonus (+20, they never block anything)
//! - Effort weight favoring small tasks (S=30, M=20, L=10, XL=5)

use crate::domain::{ConcurrencyClass, ExecutionMode, ModelTier, Severity, SizeClass, Task};

pub const CRITICAL_PATH_BONUS: i32 = 100;

pub const SEVERITY_CRITICAL: i32 = 50;
pub const SEVERITY_HIGH: i32 = 30;
pub const SEVERITY_MEDIUM: i32 = 10;
pub const SEVERITY_LOW: i32 = 5;

pub const READ_ONLY_BONUS: i32 = 20;

pub const EFFORT_S: i32 = 30;
pub const EFFORT_M: i32 = 20;
pub const EFFORT_L: i32 = 10;
pub const EFFORT_XL: i32 = 5;

pub fn severity_weight(severity: Severity) -> i32 {
    match severity {
        Severity::Critical => SEVERITY_CRITICAL,
        Severity::High => SEVERITY_HIGH,
        Severity::Medium => SEVERITY_MEDIUM,
        Severity::Low => SEVERITY_LOW,
    }
}

pub fn effort_weight(size: SizeClass) -> i32 {
    match size {
        SizeClass::S => EFFORT_S,
        SizeClass::M => EFFORT_M,
        SizeClass::L => EFFORT_L,
        SizeClass::XL => EFFORT_XL,
    }
}

/// Dispatch priority. Higher scores are dispatched first.
pub fn priority_score(task: &Task) -> i32 {
    let mut score = severity_weight(task.severity) + effort_weight(task.size_class());

    if task.is_on_critical_path {
        score += CRITICAL_PATH_BONUS;
    }
    if task.is_read_only() {
        score += READ_ONLY_BONUS;
    }

    score
}

/// Supervised (foreground) when the task needs a human, is high stakes,
/// writes shared resources, or is too small to be worth backgrounding.
pub fn execution_mode(task: &Task) -> ExecutionMode {
    let foreground = task.needs_user_input
        || matches!(task.severity, Severity::Critical | Severity::High)
        || task.concurrency_class == ConcurrencyClass::WriteShared
        || task.size_class() == SizeClass::S;

    if foreground {
        ExecutionMode::Foreground
    } else {
        ExecutionMode::Background
    }
}

/// Explicit preference wins. Otherwise read-only work gets the cheapest tier,
/// security/audit roles and interactive architecture work get the most
/// capable, everything else the balanced tier.
pub fn select_model_tier(task: &Task) -> ModelTier {
    if let Some(tier) = task.model_preference {
        return tier;
    }
    if task.is_read_only() {
        return ModelTier::Fast;
    }

    let role = task.owner_role.to_lowercase();
    if role.contains("security") || role.contains("audit") {
        return ModelTier::Capable;
    }
    if role.contains("architect") && task.needs_user_input {
        return ModelTier::Capable;
    }

    ModelTier::Balanced
}
