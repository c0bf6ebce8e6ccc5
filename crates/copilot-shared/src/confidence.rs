//! Confidence scoring for final answers.
//!
//! Pure function with test-locked behavior. This is a heuristic, not a
//! learned estimate: the score is reproducible from the SQL attempt count
//! and the top retrieval score alone.
//! Reason codes (not text) for determinism.

use serde::{Deserialize, Serialize};

/// Reason codes for confidence degradation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceReason {
    /// SQL needed one or more repairs
    RepairAttempts,
    /// Best retrieved passage scored below threshold
    LowRetrievalScore,
}

impl ConfidenceReason {
    /// User-facing explanation (single line, lowercase start)
    pub fn explanation(&self) -> &'static str {
        match self {
            Self::RepairAttempts => "SQL needed repair before it ran",
            Self::LowRetrievalScore => "retrieved documents were weak matches",
        }
    }
}

/// Penalty configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidencePolicy {
    /// Subtracted once per attempt beyond the first
    pub repair_penalty: f64,
    /// Subtracted when retrieval ran and the top score is below threshold
    pub low_retrieval_penalty: f64,
    pub low_retrieval_threshold: f64,
}

impl Default for ConfidencePolicy {
    fn default() -> Self {
        Self {
            repair_penalty: 0.15,
            low_retrieval_penalty: 0.2,
            low_retrieval_threshold: 0.1,
        }
    }
}

/// Raw signals for one answer
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ConfidenceInput {
    /// Total SQL attempts recorded (0 when the SQL stage did not run)
    pub sql_attempts: usize,
    /// Whether retrieval ran for this question
    pub retrieval_ran: bool,
    /// Score of the top-ranked passage (0.0 when none)
    pub top_passage_score: f64,
}

/// Breakdown item for debug output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponent {
    pub name: String,
    pub delta: f64,
    pub reason: ConfidenceReason,
}

/// Output of confidence computation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceOutput {
    /// Final score in [0.0, 1.0], rounded to 2 decimals
    pub score: f64,
    pub reasons: Vec<ConfidenceReason>,
    pub breakdown: Vec<ScoreComponent>,
}

impl ConfidenceOutput {
    /// Explanation of the largest penalty, if any
    pub fn primary_explanation(&self) -> Option<&'static str> {
        self.breakdown
            .iter()
            .min_by(|a, b| a.delta.partial_cmp(&b.delta).unwrap_or(std::cmp::Ordering::Equal))
            .map(|c| c.reason.explanation())
    }
}

/// Pure function: compute confidence from inputs.
/// Test-locked behavior - changes here require golden test updates.
pub fn compute_confidence(input: &ConfidenceInput, policy: &ConfidencePolicy) -> ConfidenceOutput {
    let mut score: f64 = 1.0;
    let mut reasons = Vec::new();
    let mut breakdown = Vec::new();

    // Negative penalties in config would make the score rise with repairs
    let repair_penalty = policy.repair_penalty.max(0.0);
    let retrieval_penalty = policy.low_retrieval_penalty.max(0.0);

    // === Repairs ===
    let repairs = input.sql_attempts.saturating_sub(1);
    if repairs > 0 && repair_penalty > 0.0 {
        let delta = -(repair_penalty * repairs as f64);
        score += delta;
        breakdown.push(ScoreComponent {
            name: "repair_attempts".to_string(),
            delta,
            reason: ConfidenceReason::RepairAttempts,
        });
        reasons.push(ConfidenceReason::RepairAttempts);
    }

    // === Retrieval quality (only if retrieval ran) ===
    if input.retrieval_ran
        && input.top_passage_score < policy.low_retrieval_threshold
        && retrieval_penalty > 0.0
    {
        let delta = -retrieval_penalty;
        score += delta;
        breakdown.push(ScoreComponent {
            name: "low_retrieval_score".to_string(),
            delta,
            reason: ConfidenceReason::LowRetrievalScore,
        });
        reasons.push(ConfidenceReason::LowRetrievalScore);
    }

    // Clamp to valid range
    let score = (score.clamp(0.0, 1.0) * 100.0).round() / 100.0;

    ConfidenceOutput {
        score,
        reasons,
        breakdown,
    }
}

// Golden tests are in tests/confidence_tests.rs
