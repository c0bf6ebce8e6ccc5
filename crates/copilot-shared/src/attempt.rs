//! SQL attempts recorded by the generate/execute/repair loop.

use crate::error::ErrorKind;
use serde::{Deserialize, Serialize};

/// Hard ceiling on attempts per question, first attempt included
pub const MAX_SQL_ATTEMPTS: u8 = 3;

/// Where an attempt's SQL came from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AttemptSource {
    /// Exact match in the template catalog
    Template { name: String },
    /// Text generator, first attempt
    Generator,
    /// Text generator, prompted with the previous failure
    Repair,
}

impl std::fmt::Display for AttemptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Template { name } => write!(f, "template ({})", name),
            Self::Generator => write!(f, "generator"),
            Self::Repair => write!(f, "repair"),
        }
    }
}

/// Result of one attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success { columns: Vec<String>, row_count: usize },
    Error { kind: ErrorKind, message: String },
}

/// One pass through GENERATE → EXECUTE. Never overwritten once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlAttempt {
    /// 1-based
    pub attempt: u8,
    /// Absent when the generator produced no statement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    /// Prompt sent to the generator (absent for template attempts)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    pub source: AttemptSource,
    pub outcome: AttemptOutcome,
}

impl SqlAttempt {
    pub fn succeeded(&self) -> bool {
        matches!(self.outcome, AttemptOutcome::Success { .. })
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Error { message, .. } => Some(message),
            AttemptOutcome::Success { .. } => None,
        }
    }
}

/// Number of repairs (attempts beyond the first)
pub fn repair_count(attempts: &[SqlAttempt]) -> usize {
    attempts.len().saturating_sub(1)
}
