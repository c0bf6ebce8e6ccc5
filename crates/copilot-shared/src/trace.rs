//! Per-question execution trace for auditable processing.
//!
//! One `TraceRecorder` is created when a question enters the pipeline and
//! is owned by that run alone. Entries are append-only. `seal()` consumes
//! the recorder, so a finished `Trace` cannot be written to again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum length of an input/output summary
pub const MAX_SUMMARY_LEN: usize = 240;

/// Pipeline step that produced a trace entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraceStep {
    Route,
    Retrieve,
    Plan,
    GenerateSql,
    ExecuteSql,
    Repair,
    Synthesize,
    /// Non-fatal condition (ambiguous route, empty retrieval, SQL branch failure)
    Warning,
    Finalize,
}

impl std::fmt::Display for TraceStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Route => "route",
            Self::Retrieve => "retrieve",
            Self::Plan => "plan",
            Self::GenerateSql => "generate_sql",
            Self::ExecuteSql => "execute_sql",
            Self::Repair => "repair",
            Self::Synthesize => "synthesize",
            Self::Warning => "warning",
            Self::Finalize => "finalize",
        };
        write!(f, "{}", s)
    }
}

/// One step log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: TraceStep,
    pub timestamp: DateTime<Utc>,
    pub input_summary: String,
    pub output_summary: String,
}

/// Append-only recorder, owned by exactly one run
#[derive(Debug)]
pub struct TraceRecorder {
    run_id: Uuid,
    question_id: String,
    started_at: DateTime<Utc>,
    entries: Vec<TraceEntry>,
}

impl TraceRecorder {
    pub fn new(question_id: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            question_id: question_id.to_string(),
            started_at: Utc::now(),
            entries: Vec::new(),
        }
    }

    /// Append a step. Summaries are truncated to `MAX_SUMMARY_LEN`.
    pub fn record(&mut self, step: TraceStep, input: &str, output: &str) {
        self.entries.push(TraceEntry {
            step,
            timestamp: Utc::now(),
            input_summary: truncate_summary(input, MAX_SUMMARY_LEN),
            output_summary: truncate_summary(output, MAX_SUMMARY_LEN),
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Close the trace. The recorder is consumed.
    pub fn seal(self) -> Trace {
        Trace {
            run_id: self.run_id,
            question_id: self.question_id,
            started_at: self.started_at,
            sealed_at: Utc::now(),
            entries: self.entries,
        }
    }
}

/// Sealed, read-only trace of one question's run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trace {
    pub run_id: Uuid,
    pub question_id: String,
    pub started_at: DateTime<Utc>,
    pub sealed_at: DateTime<Utc>,
    entries: Vec<TraceEntry>,
}

impl Trace {
    pub fn entries(&self) -> &[TraceEntry] {
        &self.entries
    }

    /// Steps in order, for assertions and compact display
    pub fn steps(&self) -> Vec<TraceStep> {
        self.entries.iter().map(|e| e.step).collect()
    }

    pub fn count(&self, step: TraceStep) -> usize {
        self.entries.iter().filter(|e| e.step == step).count()
    }
}

impl std::fmt::Display for Trace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let steps: Vec<String> = self.entries.iter().map(|e| e.step.to_string()).collect();
        write!(f, "{}: {}", self.question_id, steps.join(" -> "))
    }
}

/// Truncate to at most `max_len` bytes on a char boundary, preferring a
/// word boundary, and mark the cut with "..."
pub fn truncate_summary(text: &str, max_len: usize) -> String {
    let text = text.trim();
    if text.len() <= max_len {
        return text.to_string();
    }

    let mut cut = max_len;
    while cut > 0 && !text.is_char_boundary(cut) {
        cut -= 1;
    }
    let truncated = &text[..cut];
    // Find last space
    if let Some(last_space) = truncated.rfind(' ') {
        format!("{}...", &truncated[..last_space])
    } else {
        format!("{}...", truncated)
    }
}
