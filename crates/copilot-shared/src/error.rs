//! Error types for the copilot pipeline.
//!
//! Every collaborator failure is converted into one of these at the
//! component boundary. `ErrorKind` is the stable code written to outputs.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A statement the executor could not run.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("SQL execution failed: {message}")]
pub struct ExecutionError {
    /// Message reported by the database (or the timeout guard)
    pub message: String,
    /// The failing statement, verbatim
    pub sql: String,
}

impl ExecutionError {
    pub fn new(message: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            sql: sql.into(),
        }
    }
}

/// Text generator failures
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenerationError {
    #[error("text generator is disabled in configuration")]
    Disabled,

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("request timeout after {0} seconds")]
    Timeout(u64),

    #[error("text generator returned an empty response")]
    EmptyResponse,
}

/// Pipeline errors, one variant per taxonomy entry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AgentError {
    #[error("question matched no routing keywords, defaulted to hybrid")]
    RoutingAmbiguous,

    #[error("retrieval returned no passages: {0}")]
    RetrievalEmpty(String),

    #[error("no SQL statement could be extracted from generator output")]
    NoSqlExtracted {
        /// Leading part of the raw output, for the trace
        excerpt: String,
    },

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error("generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("SQL repair exhausted after {attempts} attempts: {last_error}")]
    RepairExhausted { attempts: u8, last_error: String },

    #[error("no usable answer: {0}")]
    UnresolvedAnswer(String),

    #[error("schema error: {0}")]
    Schema(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Serialisable error code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    RoutingAmbiguous,
    RetrievalEmpty,
    NoSqlExtracted,
    Execution,
    Generation,
    RepairExhausted,
    UnresolvedAnswer,
    Schema,
    Config,
    Io,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::RoutingAmbiguous => "routing_ambiguous",
            Self::RetrievalEmpty => "retrieval_empty",
            Self::NoSqlExtracted => "no_sql_extracted",
            Self::Execution => "execution",
            Self::Generation => "generation",
            Self::RepairExhausted => "repair_exhausted",
            Self::UnresolvedAnswer => "unresolved_answer",
            Self::Schema => "schema",
            Self::Config => "config",
            Self::Io => "io",
        };
        write!(f, "{}", s)
    }
}

impl AgentError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AgentError::RoutingAmbiguous => ErrorKind::RoutingAmbiguous,
            AgentError::RetrievalEmpty(_) => ErrorKind::RetrievalEmpty,
            AgentError::NoSqlExtracted { .. } => ErrorKind::NoSqlExtracted,
            AgentError::Execution(_) => ErrorKind::Execution,
            AgentError::Generation(_) => ErrorKind::Generation,
            AgentError::RepairExhausted { .. } => ErrorKind::RepairExhausted,
            AgentError::UnresolvedAnswer(_) => ErrorKind::UnresolvedAnswer,
            AgentError::Schema(_) => ErrorKind::Schema,
            AgentError::Config(_) => ErrorKind::Config,
            AgentError::Io(_) => ErrorKind::Io,
        }
    }

    /// Terminal for the whole question (as opposed to one branch).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::UnresolvedAnswer(_) | AgentError::Config(_) | AgentError::Io(_)
        )
    }

    /// Can the repair loop try again after this error?
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            AgentError::Execution(_) | AgentError::NoSqlExtracted { .. }
        )
    }
}
