//! Structured plan ingestion.
//!
//! Accepts either a bare list of task records or a document with an optional
//! `track` name and a `tasks` list, as JSON or YAML. Free-form authoring
//! syntaxes belong behind their own `PlanParser`.

use serde_yaml::Value;
use std::path::Path;

use crate::domain::Task;
use crate::error::{DispatchError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanFormat {
    Json,
    Yaml,
}

impl PlanFormat {
    /// `.json` is JSON; everything else is read as YAML, which also accepts JSON.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()).map(|e| e.to_lowercase()) {
            Some(ext) if ext == "json" => PlanFormat::Json,
            _ => PlanFormat::Yaml,
        }
    }
}

/// Parsed plan
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlanDocument {
    pub track: Option<String>,
    pub tasks: Vec<Task>,
    /// Ids of tasks that did not author a concurrency class
    pub implicit_class: Vec<String>,
}

/// Turns plan text into task records.
pub trait PlanParser {
    fn parse(&self, text: &str) -> Result<PlanDocument>;
}

#[derive(Debug, Clone, Copy)]
pub struct StructuredPlanParser {
    format: PlanFormat,
}

impl StructuredPlanParser {
    pub fn new(format: PlanFormat) -> Self {
        Self { format }
    }

    fn to_value(&self, text: &str) -> Result<Value> {
        match self.format {
            PlanFormat::Json => {
                let json: serde_json::Value = serde_json::from_str(text)?;
                Ok(serde_yaml::to_value(json)?)
            }
            PlanFormat::Yaml => Ok(serde_yaml::from_str(text)?),
        }
    }
}

impl PlanParser for StructuredPlanParser {
    fn parse(&self, text: &str) -> Result<PlanDocument> {
        if text.trim().is_empty() {
            return Ok(PlanDocument::default());
        }
        let root = self.to_value(text)?;

        let (track, records) = match root {
            Value::Sequence(records) => (None, records),
            Value::Mapping(mut map) => {
                let track = match map.remove("track") {
                    Some(Value::String(s)) => Some(s),
                    Some(Value::Null) | None => None,
                    Some(other) => {
                        return Err(DispatchError::InvalidPlan(format!("track must be a string, got {:?}", other)));
                    }
                };
                match map.remove("tasks") {
                    Some(Value::Sequence(records)) => (track, records),
                    Some(Value::Null) | None => (track, Vec::new()),
                    Some(_) => return Err(DispatchError::InvalidPlan("tasks must be a list".to_string())),
                }
            }
            Value::Null => (None, Vec::new()),
            _ => {
                return Err(DispatchError::InvalidPlan(
                    "expected a task list or a mapping with a tasks key".to_string(),
                ));
            }
        };

        let mut doc = PlanDocument {
            track,
            ..Default::default()
        };
        for record in records {
            let authored_class = record.get("concurrency_class").is_some_and(|v| !v.is_null());
            let task: Task = serde_yaml::from_value(record)?;
            if !authored_class {
                doc.implicit_class.push(task.id.clone());
            }
            doc.tasks.push(task);
        }

        log::debug!("Parsed plan with {} task(s)", doc.tasks.len());
        Ok(doc)
    }
}

/// Read and parse a plan file, choosing the format by extension.
pub fn load_plan(path: impl AsRef<Path>) -> Result<PlanDocument> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)?;
    StructuredPlanParser::new(PlanFormat::from_path(path)).parse(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ConcurrencyClass, Effort};
    use tempfile::TempDir;

    const YAML_PLAN: &str = r#"
track: backend
tasks:
  - id: T01
    title: Schema
    owner_role: backend-dev
    effort: S
    touches: [db/schema.sql]
  - id: T02
    title: API
    owner_role: backend-dev
    depends_on: [T01]
    concurrency_class: write-shared
    effort: 3h
"#;

    #[test]
    fn test_parse_yaml_document() {
        let doc = StructuredPlanParser::new(PlanFormat::Yaml).parse(YAML_PLAN).unwrap();
        assert_eq!(doc.track.as_deref(), Some("backend"));
        assert_eq!(doc.tasks.len(), 2);
        assert_eq!(doc.tasks[1].concurrency_class, ConcurrencyClass::WriteShared);
        assert_eq!(doc.tasks[1].effort, Effort::Minutes(180));
        assert_eq!(doc.implicit_class, vec!["T01"]);
    }

    #[test]
    fn test_parse_json_list() {
        let json = r#"[{"id": "A", "title": "a", "concurrency_class": "read-only"}, {"id": "B", "title": "b"}]"#;
        let doc = StructuredPlanParser::new(PlanFormat::Json).parse(json).unwrap();
        assert!(doc.track.is_none());
        assert_eq!(doc.tasks[0].concurrency_class, ConcurrencyClass::ReadOnly);
        assert_eq!(doc.implicit_class, vec!["B"]);
    }

    #[test]
    fn test_parse_rejects_scalar() {
        let err = StructuredPlanParser::new(PlanFormat::Yaml).parse("42").unwrap_err();
        assert!(matches!(err, DispatchError::InvalidPlan(_)));
    }

    #[test]
    fn test_empty_plan() {
        let doc = StructuredPlanParser::new(PlanFormat::Yaml).parse("").unwrap();
        assert!(doc.tasks.is_empty());
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(PlanFormat::from_path(Path::new("plan.JSON")), PlanFormat::Json);
        assert_eq!(PlanFormat::from_path(Path::new("plan.yml")), PlanFormat::Yaml);
        assert_eq!(PlanFormat::from_path(Path::new("plan")), PlanFormat::Yaml);
    }

    #[test]
    fn test_load_plan_from_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("plan.yaml");
        std::fs::write(&path, YAML_PLAN).unwrap();
        let doc = load_plan(&path).unwrap();
        assert_eq!(doc.tasks[0].id, "T01");
    }
}
