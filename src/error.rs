//! Error types for swarm-dispatch
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// A single problem found while validating a task set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationIssue {
    /// The dependency graph contains a cycle. `path` starts and ends with the same id.
    #[error("Dependency cycle: {}", .path.join(" -> "))]
    Cycle { path: Vec<String> },

    /// A task depends on an id that is not part of the task set
    #[error("Task {task} depends on unknown task {dependency}")]
    UnknownDependency { task: String, dependency: String },

    /// A required field is empty
    #[error("Task {task} missing required field: {field}")]
    MissingField { task: String, field: String },

    /// Two tasks share an id
    #[error("Duplicate task id: {0}")]
    DuplicateId(String),
}

/// All error types that can occur in swarm-dispatch
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The planning pass found one or more validation issues
    #[error("Validation failed: {}", join_issues(.0))]
    Validation(Vec<ValidationIssue>),

    /// Task id not present in the graph
    #[error("Unknown task: {0}")]
    UnknownTask(String),

    /// Plan document with an unusable shape
    #[error("Invalid plan: {0}")]
    InvalidPlan(String),

    /// Status string that does not map onto the task lifecycle
    #[error("Invalid status: {0}")]
    InvalidStatus(String),

    /// Gate score that cannot be stored, e.g. NaN
    #[error("Invalid score {score} for gate {gate}")]
    InvalidGateScore { gate: String, score: f64 },

    /// Checkpoint/journal persistence error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues.iter().map(|i| i.to_string()).collect::<Vec<_>>().join("; ")
}

/// Result type alias for swarm-dispatch operations
pub type Result<T> = std::result::Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cycle_issue_display() {
        let issue = ValidationIssue::Cycle {
            path: vec!["T1".into(), "T2".into(), "T1".into()],
        };
        assert_eq!(issue.to_string(), "Dependency cycle: T1 -> T2 -> T1");
    }

    #[test]
    fn test_unknown_dependency_display() {
        let issue = ValidationIssue::UnknownDependency {
            task: "T3".into(),
            dependency: "T9".into(),
        };
        assert_eq!(issue.to_string(), "Task T3 depends on unknown task T9");
    }

    #[test]
    fn test_validation_error_joins_issues() {
        let err = DispatchError::Validation(vec![
            ValidationIssue::DuplicateId("T1".into()),
            ValidationIssue::MissingField {
                task: "T2".into(),
                field: "owner_role".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "Validation failed: Duplicate task id: T1; Task T2 missing required field: owner_role"
        );
    }

    #[test]
    fn test_invalid_status_error() {
        let err = DispatchError::InvalidStatus("WAITING".to_string());
        assert_eq!(err.to_string(), "Invalid status: WAITING");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: DispatchError = io_err.into();
        assert!(matches!(err, DispatchError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: DispatchError = json_err.into();
        assert!(matches!(err, DispatchError::Json(_)));
    }
}
