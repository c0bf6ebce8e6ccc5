//! Document retriever boundary and the adapter the pipeline calls.

use copilot_shared::passage::clamp_score;
use copilot_shared::{AgentError, RetrievedPassage};
use thiserror::Error;
use tracing::{debug, warn};

/// Retriever failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RetrievalError {
    #[error("documents directory not found: {0}")]
    MissingDirectory(String),

    #[error("no markdown documents in {0}")]
    NoDocuments(String),

    #[error("IO error: {0}")]
    Io(String),

    #[error("retriever unavailable: {0}")]
    Unavailable(String),
}

/// Ranked passage search over a document corpus
pub trait Retriever {
    /// Up to `top_k` passages, most relevant first
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError>;
}

/// What the adapter hands back to the pipeline
#[derive(Debug, Clone, Default)]
pub struct Retrieval {
    pub passages: Vec<RetrievedPassage>,
    /// Set when nothing usable came back; processing continues
    pub warning: Option<AgentError>,
}

/// Normalises retriever output: clamped scores, stable descending order, top-k cap
#[derive(Debug, Clone, Copy)]
pub struct RetrieverAdapter {
    top_k: usize,
}

impl RetrieverAdapter {
    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    pub fn retrieve(&self, retriever: &dyn Retriever, text: &str) -> Retrieval {
        let mut passages = match retriever.search(text, self.top_k) {
            Ok(p) => p,
            Err(e) => {
                warn!("Retriever failed: {}", e);
                return Retrieval {
                    passages: vec![],
                    warning: Some(AgentError::RetrievalEmpty(e.to_string())),
                };
            }
        };

        for p in &mut passages {
            p.score = clamp_score(p.score);
        }
        // sort_by is stable: equal scores keep retriever order
        passages.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        passages.truncate(self.top_k);

        if passages.is_empty() {
            return Retrieval {
                passages,
                warning: Some(AgentError::RetrievalEmpty(format!(
                    "no passages matched '{}'",
                    text
                ))),
            };
        }

        debug!(
            "Retrieved {} passages, top={} ({:.3})",
            passages.len(),
            passages[0].chunk_id,
            passages[0].score
        );
        Retrieval {
            passages,
            warning: None,
        }
    }
}

/// Retriever returning a fixed passage list (or a fixed error) for tests
pub struct StaticRetriever {
    result: Result<Vec<RetrievedPassage>, RetrievalError>,
}

impl StaticRetriever {
    pub fn new(passages: Vec<RetrievedPassage>) -> Self {
        Self {
            result: Ok(passages),
        }
    }

    pub fn empty() -> Self {
        Self::new(vec![])
    }

    pub fn failing(error: RetrievalError) -> Self {
        Self { result: Err(error) }
    }
}

impl Retriever for StaticRetriever {
    fn search(&self, _query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        self.result
            .clone()
            .map(|p| p.into_iter().take(top_k).collect())
    }
}
