//! Plan ingestion: structured task lists in, task records out.

pub mod fields;
pub mod parser;

pub use fields::{FieldReport, FieldWarning, check_fields};
pub use parser::{PlanDocument, PlanFormat, PlanParser, StructuredPlanParser, load_plan};
