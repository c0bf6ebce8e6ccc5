//! Answer provenance.
//!
//! A citation is either a database table the final SQL read from, or a
//! document chunk the answer (or its constraints) came from. On the wire
//! both are plain strings: `Orders`, `product_policy::chunk2`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Separator between document id and chunk index in chunk ids
pub const CHUNK_SEPARATOR: &str = "::";

/// A single citation
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Citation {
    /// Table referenced by the successful SQL
    Table { name: String },
    /// Document chunk
    Chunk { doc_id: String, chunk_id: String },
}

impl Citation {
    pub fn table(name: &str) -> Self {
        Self::Table {
            name: name.to_string(),
        }
    }

    /// Build from a chunk id; the document id is the part before `::`
    pub fn chunk(chunk_id: &str) -> Self {
        let doc_id = chunk_id
            .split(CHUNK_SEPARATOR)
            .next()
            .unwrap_or(chunk_id)
            .to_string();
        Self::Chunk {
            doc_id,
            chunk_id: chunk_id.to_string(),
        }
    }

    /// Wire form
    pub fn reference(&self) -> String {
        match self {
            Self::Table { name } => name.clone(),
            Self::Chunk { chunk_id, .. } => chunk_id.clone(),
        }
    }

    /// Display form for terminal output
    pub fn display(&self) -> String {
        match self {
            Self::Table { name } => format!("table {}", name),
            Self::Chunk { doc_id, chunk_id } => format!("doc {} ({})", doc_id, chunk_id),
        }
    }

    pub fn is_table(&self) -> bool {
        matches!(self, Self::Table { .. })
    }
}

impl From<String> for Citation {
    fn from(s: String) -> Self {
        if s.contains(CHUNK_SEPARATOR) {
            Self::chunk(&s)
        } else {
            Self::Table { name: s }
        }
    }
}

impl From<Citation> for String {
    fn from(c: Citation) -> Self {
        c.reference()
    }
}

/// Ordered, de-duplicated citation collection for an answer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitationSet {
    citations: BTreeSet<Citation>,
}

impl CitationSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a citation (duplicates are ignored)
    pub fn add(&mut self, citation: Citation) {
        self.citations.insert(citation);
    }

    pub fn cite_table(&mut self, name: &str) {
        self.add(Citation::table(name));
    }

    pub fn cite_chunk(&mut self, chunk_id: &str) {
        self.add(Citation::chunk(chunk_id));
    }

    /// Union with another set
    pub fn extend(&mut self, other: &CitationSet) {
        for c in &other.citations {
            self.citations.insert(c.clone());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.citations.is_empty()
    }

    pub fn len(&self) -> usize {
        self.citations.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Citation> {
        self.citations.iter()
    }

    pub fn contains_reference(&self, reference: &str) -> bool {
        self.citations.iter().any(|c| c.reference() == reference)
    }

    /// Wire references, sorted
    pub fn references(&self) -> Vec<String> {
        self.citations.iter().map(|c| c.reference()).collect()
    }

    /// "Sources:" footer for terminal output
    pub fn format_footer(&self) -> Option<String> {
        if self.citations.is_empty() {
            return None;
        }
        let mut lines = vec!["Sources:".to_string()];
        for citation in &self.citations {
            lines.push(format!("  - {}", citation.display()));
        }
        Some(lines.join("\n"))
    }
}
