//! Task lifecycle statuses and reported transitions.

use crate::error::{DispatchError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle tag authored on a task.
///
/// External authoring uses several spellings; they are normalized on read.
/// An unrecognized spelling is kept as `Unrecognized` so plan checks can warn
/// about it. The scheduler treats it like `Todo`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
    Blocked,
    Unrecognized(String),
}

impl TaskStatus {
    pub fn parse(raw: &str) -> Self {
        match normalize(raw).as_str() {
            "" | "TODO" | "PENDING" => TaskStatus::Todo,
            "DOING" | "RUNNING" | "IN_PROGRESS" => TaskStatus::Doing,
            "DONE" | "COMPLETE" | "COMPLETED" | "SUCCESS" => TaskStatus::Done,
            "BLOCKED" | "FAILED" => TaskStatus::Blocked,
            _ => TaskStatus::Unrecognized(raw.trim().to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Todo => "TODO",
            TaskStatus::Doing => "DOING",
            TaskStatus::Done => "DONE",
            TaskStatus::Blocked => "BLOCKED",
            TaskStatus::Unrecognized(raw) => raw,
        }
    }

    pub fn is_done(&self) -> bool {
        matches!(self, TaskStatus::Done)
    }

    pub fn is_recognized(&self) -> bool {
        !matches!(self, TaskStatus::Unrecognized(_))
    }
}

impl From<String> for TaskStatus {
    fn from(raw: String) -> Self {
        TaskStatus::parse(&raw)
    }
}

impl From<TaskStatus> for String {
    fn from(status: TaskStatus) -> Self {
        status.as_str().to_string()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state change reported by the execution layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    /// DONE / COMPLETE / SUCCESS
    Completed,
    /// RUNNING / IN_PROGRESS
    Running,
    /// FAILED / BLOCKED
    Failed,
}

impl FromStr for Transition {
    type Err = DispatchError;

    fn from_str(raw: &str) -> Result<Self> {
        match normalize(raw).as_str() {
            "DONE" | "COMPLETE" | "COMPLETED" | "SUCCESS" => Ok(Transition::Completed),
            "RUNNING" | "IN_PROGRESS" | "DOING" => Ok(Transition::Running),
            "FAILED" | "BLOCKED" => Ok(Transition::Failed),
            _ => Err(DispatchError::InvalidStatus(raw.to_string())),
        }
    }
}

impl fmt::Display for Transition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Transition::Completed => "completed",
            Transition::Running => "running",
            Transition::Failed => "failed",
        };
        f.write_str(s)
    }
}

fn normalize(raw: &str) -> String {
    raw.trim().to_uppercase().replace(['-', ' '], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_aliases() {
        assert_eq!(TaskStatus::parse("todo"), TaskStatus::Todo);
        assert_eq!(TaskStatus::parse("RUNNING"), TaskStatus::Doing);
        assert_eq!(TaskStatus::parse("Complete"), TaskStatus::Done);
        assert_eq!(TaskStatus::parse("SUCCESS"), TaskStatus::Done);
        assert_eq!(TaskStatus::parse("failed"), TaskStatus::Blocked);
        assert_eq!(TaskStatus::parse(""), TaskStatus::Todo);
    }

    #[test]
    fn test_status_unrecognized_is_kept() {
        let status = TaskStatus::parse("Waiting on design");
        assert_eq!(status, TaskStatus::Unrecognized("Waiting on design".into()));
        assert!(!status.is_recognized());
        assert_eq!(status.to_string(), "Waiting on design");
    }

    #[test]
    fn test_status_serde() {
        let status: TaskStatus = serde_json::from_str("\"in progress\"").unwrap();
        assert_eq!(status, TaskStatus::Doing);
        assert_eq!(serde_json::to_string(&TaskStatus::Done).unwrap(), "\"DONE\"");
    }

    #[test]
    fn test_transition_parse() {
        assert_eq!("DONE".parse::<Transition>().unwrap(), Transition::Completed);
        assert_eq!("success".parse::<Transition>().unwrap(), Transition::Completed);
        assert_eq!("IN_PROGRESS".parse::<Transition>().unwrap(), Transition::Running);
        assert_eq!("in-progress".parse::<Transition>().unwrap(), Transition::Running);
        assert_eq!("BLOCKED".parse::<Transition>().unwrap(), Transition::Failed);
    }

    #[test]
    fn test_transition_parse_rejects_unknown() {
        let err = "WAITING".parse::<Transition>().unwrap_err();
        assert!(matches!(err, DispatchError::InvalidStatus(s) if s == "WAITING"));
    }
}
