//! Shared types for the retail analytics copilot.
//!
//! Everything the pipeline produces for one question lives here: the
//! route decision, retrieved passages, planner constraints, SQL attempts,
//! the final answer with its citations and confidence, and the sealed trace.

pub mod answer;
pub mod attempt;
pub mod citation;
pub mod confidence;
pub mod constraints;
pub mod error;
pub mod passage;
pub mod question;
pub mod report;
pub mod route;
pub mod rows;
pub mod trace;

pub use answer::FinalAnswer;
pub use attempt::{AttemptOutcome, AttemptSource, SqlAttempt, MAX_SQL_ATTEMPTS};
pub use citation::{Citation, CitationSet};
pub use confidence::{compute_confidence, ConfidenceInput, ConfidenceOutput, ConfidencePolicy};
pub use constraints::{Constraints, DateRange, KpiFormula};
pub use error::{AgentError, ErrorKind, ExecutionError, GenerationError};
pub use passage::RetrievedPassage;
pub use question::{FieldKind, FieldSpec, FormatHint, Question};
pub use report::{BatchReport, ErrorRecord, QuestionOutcome};
pub use route::{Route, RouteDecision};
pub use rows::{CellValue, SqlRows};
pub use trace::{Trace, TraceEntry, TraceRecorder, TraceStep};

/// Crate version, embedded in batch reports.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
