//! Golden tests for confidence scoring.
//!
//! These tests lock exact behavior. Changes require explicit approval.

use copilot_shared::confidence::{
    compute_confidence, ConfidenceInput, ConfidencePolicy, ConfidenceReason,
};

// === GOLDEN TESTS: Scoring function ===

/// GOLDEN: clean_sql_answer
/// one attempt, no retrieval
#[test]
fn golden_clean_sql_answer() {
    let input = ConfidenceInput {
        sql_attempts: 1,
        retrieval_ran: false,
        top_passage_score: 0.0,
    };
    let output = compute_confidence(&input, &ConfidencePolicy::default());

    assert_eq!(output.score, 1.0);
    assert!(output.reasons.is_empty());
    assert!(output.primary_explanation().is_none());
}

/// GOLDEN: two_repairs
/// attempts=3 → 1.0 - 2 * 0.15 = 0.70
#[test]
fn golden_two_repairs() {
    let input = ConfidenceInput {
        sql_attempts: 3,
        ..Default::default()
    };
    let output = compute_confidence(&input, &ConfidencePolicy::default());

    assert_eq!(output.score, 0.7);
    assert_eq!(output.reasons, vec![ConfidenceReason::RepairAttempts]);
}

/// GOLDEN: weak_retrieval
/// retrieval ran, top score 0.05 < 0.1 → 1.0 - 0.2 = 0.80
#[test]
fn golden_weak_retrieval() {
    let input = ConfidenceInput {
        sql_attempts: 0,
        retrieval_ran: true,
        top_passage_score: 0.05,
    };
    let output = compute_confidence(&input, &ConfidencePolicy::default());

    assert_eq!(output.score, 0.8);
    assert_eq!(output.reasons, vec![ConfidenceReason::LowRetrievalScore]);
    assert_eq!(
        output.primary_explanation(),
        Some("retrieved documents were weak matches")
    );
}

/// GOLDEN: low score ignored when retrieval did not run
#[test]
fn golden_retrieval_not_run() {
    let input = ConfidenceInput {
        sql_attempts: 1,
        retrieval_ran: false,
        top_passage_score: 0.0,
    };
    assert_eq!(compute_confidence(&input, &ConfidencePolicy::default()).score, 1.0);
}

/// GOLDEN: hybrid_worst_case
/// attempts=3, weak retrieval → 1.0 - 0.30 - 0.20 = 0.50
#[test]
fn golden_hybrid_worst_case() {
    let input = ConfidenceInput {
        sql_attempts: 3,
        retrieval_ran: true,
        top_passage_score: 0.0,
    };
    let output = compute_confidence(&input, &ConfidencePolicy::default());

    assert_eq!(output.score, 0.5);
    assert_eq!(output.breakdown.len(), 2);
    assert_eq!(
        output.primary_explanation(),
        Some("SQL needed repair before it ran")
    );
}

#[test]
fn test_floor_at_zero() {
    let policy = ConfidencePolicy {
        repair_penalty: 0.6,
        low_retrieval_penalty: 0.6,
        low_retrieval_threshold: 0.5,
    };
    let input = ConfidenceInput {
        sql_attempts: 3,
        retrieval_ran: true,
        top_passage_score: 0.1,
    };
    assert_eq!(compute_confidence(&input, &policy).score, 0.0);
}

#[test]
fn test_score_always_in_unit_interval() {
    let policies = [
        ConfidencePolicy::default(),
        ConfidencePolicy {
            repair_penalty: -1.0,
            low_retrieval_penalty: -1.0,
            low_retrieval_threshold: 2.0,
        },
        ConfidencePolicy {
            repair_penalty: 5.0,
            low_retrieval_penalty: 5.0,
            low_retrieval_threshold: 1.0,
        },
    ];
    for policy in &policies {
        for attempts in 0..=3 {
            for &score in &[0.0, 0.05, 0.5, 1.0] {
                for &ran in &[false, true] {
                    let input = ConfidenceInput {
                        sql_attempts: attempts,
                        retrieval_ran: ran,
                        top_passage_score: score,
                    };
                    let out = compute_confidence(&input, policy);
                    assert!((0.0..=1.0).contains(&out.score), "{:?} -> {}", input, out.score);
                }
            }
        }
    }
}

#[test]
fn test_non_increasing_in_attempts() {
    let policy = ConfidencePolicy::default();
    for &ran in &[false, true] {
        let mut previous = f64::INFINITY;
        for attempts in 0..=3 {
            let input = ConfidenceInput {
                sql_attempts: attempts,
                retrieval_ran: ran,
                top_passage_score: 0.4,
            };
            let score = compute_confidence(&input, &policy).score;
            assert!(score <= previous, "attempts={} raised score", attempts);
            previous = score;
        }
    }
}
