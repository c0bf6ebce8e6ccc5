//! Deterministic router - classifies a question into rag / sql / hybrid.
//!
//! Two keyword families (database words, document words) plus a short list
//! of phrases that point at the documents. Keywords match whole words,
//! case-insensitive, with a plain inflection allowed ("return" also hits
//! "returned", "sum" does not hit "Summer"). Answer-format instructions
//! such as "Return a float" are ignored. Never fails: a question matching
//! nothing goes to hybrid, flagged ambiguous.

use crate::config::RouterConfig;
use copilot_shared::{Route, RouteDecision};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::info;

/// "Return an integer.", "Return list[{...}]", "Return {a:str}"
static ANSWER_INSTRUCTION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\breturn\s+(?:(?:an?|the)\s+)?(?:int\b|integer\b|float\b|str\b|string\b|number\b|list\b|dict\b|\{|\[)[^?!]*?(?:\.(?:\s|$)|$)",
    )
    .expect("valid regex")
});

/// One compiled keyword
#[derive(Debug, Clone)]
struct Keyword {
    text: String,
    pattern: Regex,
}

impl Keyword {
    fn compile(text: &str) -> Option<Self> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let pattern = Regex::new(&format!(
            r"(?i)\b{}(?:s|es|ed|ing)?\b",
            regex::escape(text)
        ))
        .ok()?;
        Some(Self {
            text: text.to_lowercase(),
            pattern,
        })
    }
}

fn compile_all(words: &[String]) -> Vec<Keyword> {
    words.iter().filter_map(|w| Keyword::compile(w)).collect()
}

fn matches(keywords: &[Keyword], question: &str) -> Vec<String> {
    keywords
        .iter()
        .filter(|k| k.pattern.is_match(question))
        .map(|k| k.text.clone())
        .collect()
}

/// Question text without its answer-format instruction
fn strip_instructions(question: &str) -> String {
    ANSWER_INSTRUCTION_RE.replace_all(question, " ").into_owned()
}

/// Keyword router
#[derive(Debug, Clone)]
pub struct Router {
    sql_keywords: Vec<Keyword>,
    doc_keywords: Vec<Keyword>,
    rag_phrases: Vec<Keyword>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new(&RouterConfig::default())
    }
}

impl Router {
    pub fn new(config: &RouterConfig) -> Self {
        Self {
            sql_keywords: compile_all(&config.sql_keywords),
            doc_keywords: compile_all(&config.doc_keywords),
            rag_phrases: compile_all(&config.rag_phrases),
        }
    }

    /// Classify a question. Total and deterministic.
    pub fn classify(&self, question: &str) -> RouteDecision {
        let text = strip_instructions(question);
        let sql_signals = matches(&self.sql_keywords, &text);
        let doc_signals = matches(&self.doc_keywords, &text);
        let phrases = matches(&self.rag_phrases, &text);

        // A document phrase never outweighs a database keyword
        let (route, rationale, ambiguous) = if !phrases.is_empty() && sql_signals.is_empty() {
            (
                Route::Rag,
                format!("document phrase '{}' without database keywords", phrases[0]),
                false,
            )
        } else {
            match (sql_signals.is_empty(), doc_signals.is_empty()) {
                (false, false) => (
                    Route::Hybrid,
                    "both database and document keywords".to_string(),
                    false,
                ),
                (false, true) => (Route::Sql, "database keywords only".to_string(), false),
                (true, false) => (Route::Rag, "document keywords only".to_string(), false),
                (true, true) => (
                    Route::Hybrid,
                    "no keywords matched, defaulting to hybrid".to_string(),
                    true,
                ),
            }
        };

        info!(
            "Deterministic router: route={}, sql={:?}, doc={:?}",
            route, sql_signals, doc_signals
        );

        RouteDecision {
            route,
            rationale,
            ambiguous,
            sql_signals,
            doc_signals,
        }
    }
}
