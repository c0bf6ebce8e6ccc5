//! Retail copilot agent - question pipeline library.
//!
//! Router, retrieval, planning, SQL generation with bounded repair, and
//! answer synthesis. Collaborators (documents, database, text generator)
//! sit behind traits so the pipeline runs against fakes in tests.

pub mod config;
pub mod corpus;
pub mod database;
pub mod generator;
pub mod pipeline;
pub mod planner;
#[cfg(test)]
pub mod planner_tests;
pub mod prompts;
pub mod retriever;
pub mod router;
pub mod sql_extract;
pub mod sql_stage;
pub mod synthesizer;
pub mod templates;

pub use config::Config;
pub use corpus::DocCorpus;
pub use database::{SchemaInspector, SqlExecutor, SqliteDatabase};
pub use generator::{FakeGenerator, OllamaGenerator, TextGenerator};
pub use pipeline::{Agent, Collaborators};
pub use retriever::{Retriever, StaticRetriever};
pub use router::Router;
