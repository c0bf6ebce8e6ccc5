//! Retrieved document passages.

use serde::{Deserialize, Serialize};

/// One scored chunk returned by the retriever
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedPassage {
    /// Source document id (file stem, e.g. `product_policy`)
    pub doc_id: String,
    /// Chunk id, unique across the corpus (e.g. `product_policy::chunk2`)
    pub chunk_id: String,
    pub text: String,
    /// Relevance in [0, 1]
    pub score: f64,
}

impl RetrievedPassage {
    pub fn new(doc_id: &str, chunk_id: &str, text: &str, score: f64) -> Self {
        Self {
            doc_id: doc_id.to_string(),
            chunk_id: chunk_id.to_string(),
            text: text.to_string(),
            score: clamp_score(score),
        }
    }
}

/// Clamp a raw retriever score into [0, 1]; NaN becomes 0.
pub fn clamp_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Highest score in a ranked sequence, 0.0 when empty
pub fn top_score(passages: &[RetrievedPassage]) -> f64 {
    passages.iter().map(|p| p.score).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_clamped() {
        assert_eq!(RetrievedPassage::new("d", "d::chunk0", "t", 1.7).score, 1.0);
        assert_eq!(RetrievedPassage::new("d", "d::chunk0", "t", -0.2).score, 0.0);
        assert_eq!(clamp_score(f64::NAN), 0.0);
    }

    #[test]
    fn test_top_score() {
        let passages = vec![
            RetrievedPassage::new("a", "a::chunk0", "x", 0.3),
            RetrievedPassage::new("b", "b::chunk0", "y", 0.8),
        ];
        assert_eq!(top_score(&passages), 0.8);
        assert_eq!(top_score(&[]), 0.0);
    }
}
