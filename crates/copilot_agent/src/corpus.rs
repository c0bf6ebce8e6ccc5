//! Lexical document corpus over a directory of markdown files.
//!
//! Paragraph chunking, then TF-IDF (unigrams + bigrams, smoothed idf,
//! L2-normalised) with cosine scoring. Chunk ids are `{file_stem}::chunk{n}`,
//! numbered per document.

use crate::config::RetrievalConfig;
use crate::retriever::{RetrievalError, Retriever};
use copilot_shared::RetrievedPassage;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs;
use std::path::Path;
use tracing::{info, warn};
use walkdir::WalkDir;

static TOKEN_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[a-z0-9]+").expect("valid regex"));
static SENTENCE_END_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[.!?]+").expect("valid regex"));

const STOP_WORDS: &[&str] = &[
    "a", "about", "after", "all", "also", "an", "and", "any", "are", "as", "at", "be", "been",
    "but", "by", "can", "could", "did", "do", "does", "each", "for", "from", "had", "has", "have",
    "how", "i", "if", "in", "into", "is", "it", "its", "many", "me", "much", "my", "no", "not",
    "of", "on", "or", "our", "per", "so", "such", "than", "that", "the", "their", "then", "there",
    "these", "they", "this", "to", "use", "using", "was", "we", "were", "what", "when", "where",
    "which", "who", "why", "will", "with", "would", "you", "your",
];

/// Lowercased content tokens with stop words removed
pub fn tokenize(text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    TOKEN_RE
        .find_iter(&lower)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORDS.contains(t))
        .map(|t| t.to_string())
        .collect()
}

/// Unigrams plus adjacent bigrams
fn terms(text: &str) -> Vec<String> {
    let tokens = tokenize(text);
    let mut out = tokens.clone();
    for pair in tokens.windows(2) {
        out.push(format!("{} {}", pair[0], pair[1]));
    }
    out
}

/// One indexed chunk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentChunk {
    pub id: String,
    pub doc_id: String,
    pub text: String,
}

/// Corpus summary for `doctor`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusStats {
    pub total_chunks: usize,
    pub total_docs: usize,
    pub chunks_per_doc: BTreeMap<String, usize>,
    pub avg_chunk_len: f64,
}

/// Split one document into chunks
pub fn chunk_document(
    doc_id: &str,
    text: &str,
    chunk_size: usize,
    min_paragraph_len: usize,
) -> Vec<DocumentChunk> {
    let mut pieces: Vec<String> = Vec::new();
    let normalized = text.replace("\r\n", "\n");

    for para in normalized.split("\n\n").map(str::trim).filter(|p| !p.is_empty()) {
        if para.chars().count() < min_paragraph_len {
            continue;
        }
        if para.chars().count() <= chunk_size {
            pieces.push(para.to_string());
            continue;
        }
        // Long paragraph: pack sentences up to chunk_size
        let mut current = String::new();
        for sentence in SENTENCE_END_RE.split(para).map(str::trim).filter(|s| !s.is_empty()) {
            if !current.is_empty() && current.chars().count() + sentence.chars().count() >= chunk_size {
                pieces.push(current.trim().to_string());
                current.clear();
            }
            current.push_str(sentence);
            current.push_str(". ");
        }
        if !current.trim().is_empty() {
            pieces.push(current.trim().to_string());
        }
    }

    pieces
        .into_iter()
        .enumerate()
        .map(|(i, text)| DocumentChunk {
            id: format!("{}::chunk{}", doc_id, i),
            doc_id: doc_id.to_string(),
            text,
        })
        .collect()
}

/// Sparse L2-normalised vector
/// Ordered by term index so float sums add up in the same order every run
type SparseVec = BTreeMap<usize, f64>;

/// TF-IDF index over markdown chunks
#[derive(Debug, Clone)]
pub struct DocCorpus {
    chunks: Vec<DocumentChunk>,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<SparseVec>,
}

impl DocCorpus {
    /// Load every `.md` file directly under `dir`, in file-name order
    pub fn load(dir: &Path, config: &RetrievalConfig) -> Result<Self, RetrievalError> {
        if !dir.is_dir() {
            return Err(RetrievalError::MissingDirectory(dir.display().to_string()));
        }

        let mut chunks = Vec::new();
        let mut docs = 0usize;
        for entry in WalkDir::new(dir)
            .max_depth(1)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if !entry.file_type().is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let stem = match path.file_stem().and_then(|s| s.to_str()) {
                Some(s) => s.to_string(),
                None => continue,
            };
            match fs::read_to_string(path) {
                Ok(content) => {
                    docs += 1;
                    chunks.extend(chunk_document(
                        &stem,
                        &content,
                        config.chunk_size,
                        config.min_paragraph_len,
                    ));
                }
                Err(e) => warn!("Could not load {}: {}", path.display(), e),
            }
        }

        if docs == 0 {
            return Err(RetrievalError::NoDocuments(dir.display().to_string()));
        }
        info!("Loaded {} chunks from {} documents", chunks.len(), docs);
        Ok(Self::from_chunks(chunks))
    }

    /// Build the index from prepared chunks
    pub fn from_chunks(chunks: Vec<DocumentChunk>) -> Self {
        let chunk_terms: Vec<Vec<String>> = chunks.iter().map(|c| terms(&c.text)).collect();

        let mut vocabulary: HashMap<String, usize> = HashMap::new();
        let mut df: Vec<usize> = Vec::new();
        for doc_terms in &chunk_terms {
            let unique: HashSet<&String> = doc_terms.iter().collect();
            // Deterministic ids: insert in first-seen order
            for term in doc_terms {
                if !vocabulary.contains_key(term) {
                    vocabulary.insert(term.clone(), df.len());
                    df.push(0);
                }
            }
            for term in unique {
                df[vocabulary[term]] += 1;
            }
        }

        let n = chunks.len() as f64;
        let idf: Vec<f64> = df
            .iter()
            .map(|&d| ((1.0 + n) / (1.0 + d as f64)).ln() + 1.0)
            .collect();

        let vectors = chunk_terms
            .iter()
            .map(|t| weigh(t, &vocabulary, &idf))
            .collect();

        Self {
            chunks,
            vocabulary,
            idf,
            vectors,
        }
    }

    pub fn chunks(&self) -> &[DocumentChunk] {
        &self.chunks
    }

    pub fn chunk(&self, id: &str) -> Option<&DocumentChunk> {
        self.chunks.iter().find(|c| c.id == id)
    }

    pub fn stats(&self) -> CorpusStats {
        let mut chunks_per_doc = BTreeMap::new();
        for c in &self.chunks {
            *chunks_per_doc.entry(c.doc_id.clone()).or_insert(0) += 1;
        }
        let total_len: usize = self.chunks.iter().map(|c| c.text.chars().count()).sum();
        CorpusStats {
            total_chunks: self.chunks.len(),
            total_docs: chunks_per_doc.len(),
            chunks_per_doc,
            avg_chunk_len: if self.chunks.is_empty() {
                0.0
            } else {
                total_len as f64 / self.chunks.len() as f64
            },
        }
    }

    /// Cosine score of every chunk against the query
    fn scores(&self, query: &str) -> Vec<f64> {
        let q = weigh(&terms(query), &self.vocabulary, &self.idf);
        self.vectors
            .iter()
            .map(|v| q.iter().map(|(k, w)| w * v.get(k).unwrap_or(&0.0)).sum())
            .collect()
    }
}

/// Raw term counts times idf, L2-normalised; unknown terms dropped
fn weigh(terms: &[String], vocabulary: &HashMap<String, usize>, idf: &[f64]) -> SparseVec {
    let mut v = SparseVec::new();
    for t in terms {
        if let Some(&i) = vocabulary.get(t) {
            *v.entry(i).or_insert(0.0) += idf[i];
        }
    }
    let norm = v.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm > 0.0 {
        for w in v.values_mut() {
            *w /= norm;
        }
    }
    v
}

impl Retriever for DocCorpus {
    /// Chunks with no term overlap are not returned
    fn search(&self, query: &str, top_k: usize) -> Result<Vec<RetrievedPassage>, RetrievalError> {
        let mut ranked: Vec<(usize, f64)> = self
            .scores(query)
            .into_iter()
            .enumerate()
            .filter(|(_, s)| *s > 0.0)
            .collect();
        ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        Ok(ranked
            .into_iter()
            .take(top_k)
            .map(|(i, score)| {
                let c = &self.chunks[i];
                RetrievedPassage::new(&c.doc_id, &c.id, &c.text, score)
            })
            .collect())
    }
}
