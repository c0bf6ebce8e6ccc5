//! Route classification output.

use serde::{Deserialize, Serialize};

/// Processing path for a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    /// Documents only
    Rag,
    /// Database only
    Sql,
    /// Documents feed constraints into SQL
    Hybrid,
}

impl Route {
    pub fn uses_retrieval(&self) -> bool {
        matches!(self, Route::Rag | Route::Hybrid)
    }

    pub fn uses_sql(&self) -> bool {
        matches!(self, Route::Sql | Route::Hybrid)
    }

    /// Parse from string (config and test corpora)
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "rag" => Some(Self::Rag),
            "sql" => Some(Self::Sql),
            "hybrid" => Some(Self::Hybrid),
            _ => None,
        }
    }
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Rag => "rag",
            Self::Sql => "sql",
            Self::Hybrid => "hybrid",
        };
        write!(f, "{}", s)
    }
}

/// Router verdict. Produced once per question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub route: Route,
    /// Short human-readable reason (for trace and debug output)
    pub rationale: String,
    /// True when no keyword family matched and the default route was used
    #[serde(default)]
    pub ambiguous: bool,
    /// SQL-family keywords found in the question
    #[serde(default)]
    pub sql_signals: Vec<String>,
    /// Document-family keywords found in the question
    #[serde(default)]
    pub doc_signals: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_branches() {
        assert!(Route::Rag.uses_retrieval());
        assert!(!Route::Rag.uses_sql());
        assert!(Route::Sql.uses_sql());
        assert!(!Route::Sql.uses_retrieval());
        assert!(Route::Hybrid.uses_sql() && Route::Hybrid.uses_retrieval());
    }

    #[test]
    fn test_route_round_trip_names() {
        for route in [Route::Rag, Route::Sql, Route::Hybrid] {
            assert_eq!(Route::from_str(&route.to_string()), Some(route));
        }
        assert_eq!(Route::from_str("graph"), None);
    }
}
