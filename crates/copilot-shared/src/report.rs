//! Batch output records.

use crate::attempt::SqlAttempt;
use crate::citation::CitationSet;
use crate::constraints::Constraints;
use crate::error::{AgentError, ErrorKind};
use crate::route::Route;
use crate::trace::Trace;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialisable error entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&AgentError> for ErrorRecord {
    fn from(e: &AgentError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// One output record per input question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionOutcome {
    pub id: String,
    /// False when the question ended with a fatal error
    pub success: bool,
    pub route: Route,
    /// Null when unresolved
    pub final_answer: Option<serde_json::Value>,
    pub citations: CitationSet,
    pub confidence: f64,
    pub explanation: String,
    /// Final successful SQL, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sql_attempts: Vec<SqlAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constraints: Option<Constraints>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorRecord>,
    /// Non-fatal conditions encountered along the way
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ErrorRecord>,
    pub trace: Trace,
}

/// Whole-batch summary. A failed question never aborts the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub succeeded: usize,
    pub failed: usize,
    pub results: Vec<QuestionOutcome>,
}

impl BatchReport {
    pub fn new() -> Self {
        Self {
            version: crate::VERSION.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            succeeded: 0,
            failed: 0,
            results: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: QuestionOutcome) {
        if outcome.success {
            self.succeeded += 1;
        } else {
            self.failed += 1;
        }
        self.results.push(outcome);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Overall status: the batch ran to completion
    pub fn completed(&self) -> bool {
        self.finished_at.is_some()
    }

    /// Percentage of questions answered, 0.0 for an empty batch
    pub fn success_rate(&self) -> f64 {
        let total = self.succeeded + self.failed;
        if total == 0 {
            0.0
        } else {
            self.succeeded as f64 / total as f64 * 100.0
        }
    }
}

impl Default for BatchReport {
    fn default() -> Self {
        Self::new()
    }
}
