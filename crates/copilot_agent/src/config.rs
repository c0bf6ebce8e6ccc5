//! Configuration management for the copilot.
//!
//! Loads settings from an explicit path, ./copilot.toml, or defaults.
//! Every field has a serde default so partial files are valid.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use copilot_shared::{AgentError, ConfidencePolicy, KpiFormula, MAX_SQL_ATTEMPTS};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Config file looked up in the working directory
pub const LOCAL_CONFIG_PATH: &str = "copilot.toml";

/// Text generator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// When false every generation call fails with `Disabled`
    #[serde(default = "default_llm_enabled")]
    pub enabled: bool,

    /// Ollama-style base URL (`/api/generate` is appended)
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_model")]
    pub model: String,

    /// HTTP timeout per generation call
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Token cap per completion
    #[serde(default = "default_num_predict")]
    pub num_predict: u32,
}

fn default_llm_enabled() -> bool {
    true
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "phi3.5:3.8b-mini-instruct-q4_K_M".to_string()
}

fn default_llm_timeout() -> u64 {
    90
}

fn default_temperature() -> f32 {
    0.1
}

fn default_num_predict() -> u32 {
    1000
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: default_llm_enabled(),
            endpoint: default_endpoint(),
            model: default_model(),
            timeout_secs: default_llm_timeout(),
            temperature: default_temperature(),
            num_predict: default_num_predict(),
        }
    }
}

/// Document corpus and retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    #[serde(default = "default_docs_dir")]
    pub docs_dir: String,

    /// Passages kept per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Paragraphs longer than this are split on sentence boundaries
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Paragraphs shorter than this are skipped (headings, separators)
    #[serde(default = "default_min_paragraph_len")]
    pub min_paragraph_len: usize,
}

fn default_docs_dir() -> String {
    "docs".to_string()
}

fn default_top_k() -> usize {
    3
}

fn default_chunk_size() -> usize {
    500
}

fn default_min_paragraph_len() -> usize {
    20
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            docs_dir: default_docs_dir(),
            top_k: default_top_k(),
            chunk_size: default_chunk_size(),
            min_paragraph_len: default_min_paragraph_len(),
        }
    }
}

/// Database and SQL loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqlConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Attempts per question, first included (capped at 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u8,

    /// Statements running longer than this are interrupted
    #[serde(default = "default_statement_timeout")]
    pub statement_timeout_ms: u64,
}

fn default_db_path() -> String {
    "data/northwind.sqlite".to_string()
}

fn default_max_attempts() -> u8 {
    MAX_SQL_ATTEMPTS
}

fn default_statement_timeout() -> u64 {
    5_000
}

impl Default for SqlConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_attempts: default_max_attempts(),
            statement_timeout_ms: default_statement_timeout(),
        }
    }
}

/// Router keyword families
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Words that point at the database
    #[serde(default = "default_sql_keywords")]
    pub sql_keywords: Vec<String>,

    /// Words that point at the documents
    #[serde(default = "default_doc_keywords")]
    pub doc_keywords: Vec<String>,

    /// Phrases that force `rag` when no database keyword is present
    #[serde(default = "default_rag_phrases")]
    pub rag_phrases: Vec<String>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_sql_keywords() -> Vec<String> {
    strings(&[
        "revenue",
        "sales",
        "top",
        "total",
        "quantity",
        "highest",
        "lowest",
        "average order value",
        "aov",
        "margin",
        "customer",
        "orders",
        "products",
        "all-time",
        "rank",
        "count",
        "sum",
    ])
}

fn default_doc_keywords() -> Vec<String> {
    strings(&[
        "policy",
        "policies",
        "return",
        "definition",
        "defined",
        "kpi",
        "calendar",
        "campaign",
        "during",
        "summer",
        "winter",
        "guideline",
    ])
}

fn default_rag_phrases() -> Vec<String> {
    strings(&["according to", "as defined in", "per the policy"])
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            sql_keywords: default_sql_keywords(),
            doc_keywords: default_doc_keywords(),
            rag_phrases: default_rag_phrases(),
        }
    }
}

/// Named marketing campaign with a fixed date window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignConfig {
    pub name: String,
    /// Extra spellings matched the same way as the name
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Inclusive, `YYYY-MM-DD`
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Named KPI and the formula it resolves to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiConfig {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub formula: KpiFormula,
}

/// Planner lookup tables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    #[serde(default = "default_campaigns")]
    pub campaigns: Vec<CampaignConfig>,

    /// Category names as stored in the database
    #[serde(default = "default_categories")]
    pub categories: Vec<String>,

    #[serde(default = "default_kpis")]
    pub kpis: Vec<KpiConfig>,

    /// Map a bare year in the question to a calendar-year range
    #[serde(default = "default_detect_years")]
    pub detect_years: bool,
}

fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default()
}

fn default_campaigns() -> Vec<CampaignConfig> {
    vec![
        CampaignConfig {
            name: "Summer Beverages 1997".to_string(),
            aliases: strings(&["Summer Beverages"]),
            start: ymd(1997, 6, 1),
            end: ymd(1997, 6, 30),
        },
        CampaignConfig {
            name: "Winter Classics 1997".to_string(),
            aliases: strings(&["Winter Classics"]),
            start: ymd(1997, 12, 1),
            end: ymd(1997, 12, 31),
        },
    ]
}

fn default_categories() -> Vec<String> {
    strings(&[
        "Beverages",
        "Condiments",
        "Confections",
        "Dairy Products",
        "Grains/Cereals",
        "Meat/Poultry",
        "Produce",
        "Seafood",
    ])
}

fn default_kpis() -> Vec<KpiConfig> {
    vec![
        KpiConfig {
            name: "Average Order Value".to_string(),
            aliases: strings(&["AOV"]),
            formula: KpiFormula::AverageOrderValue,
        },
        KpiConfig {
            name: "Gross Margin".to_string(),
            aliases: strings(&["GM"]),
            formula: KpiFormula::GrossMargin,
        },
        KpiConfig {
            name: "Revenue".to_string(),
            aliases: vec![],
            formula: KpiFormula::Revenue,
        },
    ]
}

fn default_detect_years() -> bool {
    true
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            campaigns: default_campaigns(),
            categories: default_categories(),
            kpis: default_kpis(),
            detect_years: default_detect_years(),
        }
    }
}

/// Full copilot configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub sql: SqlConfig,

    /// Confidence penalties
    #[serde(default)]
    pub confidence: ConfidencePolicy,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub planner: PlannerConfig,
}

impl Config {
    /// Load config from an explicit path, else ./copilot.toml, else defaults.
    /// An explicit path that cannot be read or parsed is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from_path(path);
        }
        let local = Path::new(LOCAL_CONFIG_PATH);
        if local.exists() {
            return Self::load_from_path(local);
        }
        warn!("Config not found, using defaults");
        Ok(Config::default())
    }

    /// Load config from specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Reject values the pipeline cannot honour
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.sql.max_attempts == 0 || self.sql.max_attempts > MAX_SQL_ATTEMPTS {
            return Err(AgentError::Config(format!(
                "sql.max_attempts must be between 1 and {}, got {}",
                MAX_SQL_ATTEMPTS, self.sql.max_attempts
            )));
        }
        if self.retrieval.top_k == 0 {
            return Err(AgentError::Config("retrieval.top_k must be at least 1".into()));
        }
        if self.retrieval.chunk_size == 0 {
            return Err(AgentError::Config("retrieval.chunk_size must be at least 1".into()));
        }
        for campaign in &self.planner.campaigns {
            if campaign.start > campaign.end {
                return Err(AgentError::Config(format!(
                    "campaign '{}' starts after it ends",
                    campaign.name
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.retrieval.top_k, 3);
        assert_eq!(config.sql.max_attempts, 3);
        assert_eq!(config.confidence.repair_penalty, 0.15);
        assert_eq!(config.planner.campaigns.len(), 2);
        assert_eq!(config.planner.categories.len(), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_toml_partial() {
        let toml_str = r#"
[llm]
model = "qwen2.5:7b-instruct"
timeout_secs = 5

[confidence]
repair_penalty = 0.2
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.llm.model, "qwen2.5:7b-instruct");
        assert_eq!(config.llm.timeout_secs, 5);
        // Defaults for missing fields
        assert_eq!(config.llm.endpoint, "http://localhost:11434");
        assert_eq!(config.confidence.repair_penalty, 0.2);
        assert_eq!(config.confidence.low_retrieval_penalty, 0.2);
        assert_eq!(config.retrieval.chunk_size, 500);
    }

    #[test]
    fn test_parse_planner_tables() {
        let toml_str = r#"
[planner]
categories = ["Beverages"]
detect_years = false

[[planner.campaigns]]
name = "Spring Promo 1998"
start = "1998-03-01"
end = "1998-03-31"

[[planner.kpis]]
name = "Average Order Value"
aliases = ["AOV"]
formula = "average_order_value"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.planner.campaigns.len(), 1);
        assert_eq!(config.planner.campaigns[0].start, ymd(1998, 3, 1));
        assert_eq!(config.planner.kpis[0].formula, KpiFormula::AverageOrderValue);
        assert!(!config.planner.detect_years);
    }

    #[test]
    fn test_validate_rejects_attempt_ceiling() {
        let mut config = Config::default();
        config.sql.max_attempts = 4;
        assert!(matches!(config.validate(), Err(AgentError::Config(_))));
        config.sql.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copilot.toml");
        fs::write(&path, "[retrieval]\ntop_k = 5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.retrieval.top_k, 5);
    }

    #[test]
    fn test_explicit_missing_path_is_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("absent.toml"))).is_err());
    }

    #[test]
    fn test_invalid_campaign_rejected_on_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        fs::write(
            &path,
            "[[planner.campaigns]]\nname = \"x\"\nstart = \"1997-02-01\"\nend = \"1997-01-01\"\n",
        )
        .unwrap();
        assert!(Config::load(Some(&path)).is_err());
    }
}
