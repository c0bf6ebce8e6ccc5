//! Configuration overrides and concrete collaborators.

use anyhow::{Context, Result};
use copilot_agent::config::Config;
use copilot_agent::retriever::RetrievalError;
use copilot_agent::{Agent, Collaborators, DocCorpus, OllamaGenerator, SqliteDatabase};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Command-line values that win over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub docs_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub model: Option<String>,
    pub top_k: Option<usize>,
    pub no_llm: bool,
}

impl Overrides {
    pub fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.docs_dir {
            config.retrieval.docs_dir = dir.display().to_string();
        }
        if let Some(path) = &self.db_path {
            config.sql.db_path = path.display().to_string();
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(top_k) = self.top_k {
            config.retrieval.top_k = top_k;
        }
        if self.no_llm {
            config.llm.enabled = false;
        }
    }
}

/// Load the config file, apply overrides, validate the result
pub fn load_config(path: Option<&Path>, overrides: &Overrides) -> Result<Config> {
    let mut config = Config::load(path)?;
    overrides.apply(&mut config);
    config.validate().context("invalid configuration")?;
    Ok(config)
}

/// Concrete collaborators for one CLI invocation
pub struct Runtime {
    pub config: Config,
    pub corpus: DocCorpus,
    pub db: SqliteDatabase,
    pub generator: OllamaGenerator,
}

impl Runtime {
    /// A missing or empty docs directory is not fatal: questions that need
    /// documents then fail individually with an empty-retrieval warning.
    pub fn new(config: Config) -> Result<Self> {
        let docs_dir = Path::new(&config.retrieval.docs_dir);
        let corpus = match DocCorpus::load(docs_dir, &config.retrieval) {
            Ok(corpus) => corpus,
            Err(e @ (RetrievalError::MissingDirectory(_) | RetrievalError::NoDocuments(_))) => {
                warn!("{}; continuing without documents", e);
                DocCorpus::from_chunks(Vec::new())
            }
            Err(e) => return Err(e).context("loading document corpus"),
        };
        info!(
            "Corpus: {} chunks from {}",
            corpus.chunks().len(),
            docs_dir.display()
        );

        let db = SqliteDatabase::new(&config.sql.db_path, config.sql.statement_timeout_ms);
        let generator =
            OllamaGenerator::new(config.llm.clone()).context("building text generator client")?;

        Ok(Self {
            config,
            corpus,
            db,
            generator,
        })
    }

    pub fn agent(&self) -> Agent<'_> {
        Agent::new(
            &self.config,
            Collaborators {
                retriever: &self.corpus,
                schema: &self.db,
                executor: &self.db,
                generator: &self.generator,
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overrides_win() {
        let mut config = Config::default();
        let overrides = Overrides {
            docs_dir: Some(PathBuf::from("/tmp/docs")),
            db_path: Some(PathBuf::from("/tmp/nw.sqlite")),
            model: Some("llama3".into()),
            top_k: Some(5),
            no_llm: true,
        };
        overrides.apply(&mut config);
        assert_eq!(config.retrieval.docs_dir, "/tmp/docs");
        assert_eq!(config.sql.db_path, "/tmp/nw.sqlite");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.retrieval.top_k, 5);
        assert!(!config.llm.enabled);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("copilot.toml");
        std::fs::write(&path, "[llm]\nenabled = false\n").unwrap();
        let overrides = Overrides {
            top_k: Some(0),
            ..Default::default()
        };
        assert!(load_config(Some(&path), &overrides).is_err());
    }

    #[test]
    fn test_missing_docs_dir_is_not_fatal() {
        let mut config = Config::default();
        config.retrieval.docs_dir = "/nonexistent/docs".into();
        config.llm.enabled = false;
        let runtime = Runtime::new(config).unwrap();
        assert!(runtime.corpus.chunks().is_empty());
    }
}
