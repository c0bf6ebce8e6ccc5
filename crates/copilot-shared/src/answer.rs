//! The terminal answer for a question.

use crate::citation::CitationSet;
use serde::{Deserialize, Serialize};

/// Typed, cited answer. Produced at most once per question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalAnswer {
    /// Value shaped by the question's format hint
    pub value: serde_json::Value,
    pub citations: CitationSet,
    /// Heuristic score in [0, 1]
    pub confidence: f64,
    /// One-line description of where the value came from
    pub explanation: String,
}

impl FinalAnswer {
    /// Compact value rendering for terminal output
    pub fn display_value(&self) -> String {
        match &self.value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}
