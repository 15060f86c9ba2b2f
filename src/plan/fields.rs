//! Field-level checks on ingested task records.

use std::collections::HashSet;
use std::fmt;

use super::parser::PlanDocument;
use crate::domain::{Task, TaskStatus};
use crate::error::ValidationIssue;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldWarning {
    /// No effort given; scheduled at the default duration
    MissingEffort { task: String },
    /// No concurrency class given; treated as write-local
    ImplicitClass { task: String },
    /// Status spelling outside the lifecycle; treated as TODO
    NonCanonicalStatus { task: String, status: String },
}

impl fmt::Display for FieldWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldWarning::MissingEffort { task } => {
                write!(f, "Task {} has no usable effort, assuming 2h", task)
            }
            FieldWarning::ImplicitClass { task } => {
                write!(f, "Task {} has no concurrency_class, assuming write-local", task)
            }
            FieldWarning::NonCanonicalStatus { task, status } => {
                write!(f, "Task {} has unrecognized status '{}', treating as TODO", task, status)
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<FieldWarning>,
}

impl FieldReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Label for a task in messages: its id, or its 1-based position if it has none.
fn label(task: &Task, index: usize) -> String {
    if task.id.trim().is_empty() {
        format!("#{}", index + 1)
    } else {
        task.id.clone()
    }
}

pub fn check_fields(doc: &PlanDocument) -> FieldReport {
    let mut report = FieldReport::default();
    let mut seen: HashSet<&str> = HashSet::new();
    let mut reported: HashSet<&str> = HashSet::new();
    let implicit: HashSet<&str> = doc.implicit_class.iter().map(String::as_str).collect();

    for (index, task) in doc.tasks.iter().enumerate() {
        let name = label(task, index);

        for (field, value) in [("id", &task.id), ("title", &task.title), ("owner_role", &task.owner_role)] {
            if value.trim().is_empty() {
                report.errors.push(ValidationIssue::MissingField {
                    task: name.clone(),
                    field: field.to_string(),
                });
            }
        }

        if !task.id.is_empty() && !seen.insert(task.id.as_str()) && reported.insert(task.id.as_str()) {
            report.errors.push(ValidationIssue::DuplicateId(task.id.clone()));
        }

        if !task.effort.is_specified() {
            report.warnings.push(FieldWarning::MissingEffort { task: name.clone() });
        }
        if implicit.contains(task.id.as_str()) {
            report.warnings.push(FieldWarning::ImplicitClass { task: name.clone() });
        }
        if let TaskStatus::Unrecognized(status) = &task.status {
            report.warnings.push(FieldWarning::NonCanonicalStatus {
                task: name,
                status: status.clone(),
            });
        }
    }

    report
}
