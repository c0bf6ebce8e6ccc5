//! copilotctl - retail analytics copilot CLI
//!
//! Runs question batches, single questions, routing checks and
//! environment diagnostics.

use anyhow::Result;
use clap::{Parser, Subcommand};
use copilotctl::commands;
use copilotctl::runtime::{load_config, Overrides, Runtime};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

// Version is embedded at build time
const VERSION: &str = env!("COPILOT_VERSION");

#[derive(Parser)]
#[command(name = "copilotctl")]
#[command(about = "Retail analytics copilot - documents and SQL, cited", long_about = None)]
#[command(version = VERSION)]
struct Cli {
    /// Config file (default: ./copilot.toml if present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Markdown documents directory
    #[arg(long, global = true)]
    docs_dir: Option<PathBuf>,

    /// SQLite database file
    #[arg(long, global = true)]
    db_path: Option<PathBuf>,

    /// Text generator model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Passages retrieved per question
    #[arg(long, global = true)]
    top_k: Option<usize>,

    /// Disable the text generator (template SQL and documents only)
    #[arg(long, global = true)]
    no_llm: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer every question in a JSONL file
    Batch {
        /// Input JSONL: {"id", "question", "format_hint"} per line
        #[arg(long)]
        batch: PathBuf,

        /// Output JSONL, one result per question
        #[arg(long)]
        out: PathBuf,

        /// Also write the whole batch report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Answer a single question
    Ask {
        question: String,

        /// Expected answer shape: int, float, str, list, dict, {name:type}
        #[arg(long, default_value = "str")]
        format_hint: String,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show how a question would be routed
    Route {
        question: String,

        #[arg(long)]
        json: bool,
    },

    /// Check database, documents and text generator
    Doctor,
}

fn main() -> Result<()> {
    // Logs on stderr; stdout carries answers and JSON
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let overrides = Overrides {
        docs_dir: cli.docs_dir,
        db_path: cli.db_path,
        model: cli.model,
        top_k: cli.top_k,
        no_llm: cli.no_llm,
    };
    let config = load_config(cli.config.as_deref(), &overrides)?;

    match cli.command {
        Commands::Route { question, json } => commands::route(&config, &question, json),
        Commands::Batch { batch, out, report } => {
            let runtime = Runtime::new(config)?;
            commands::batch(&runtime, &batch, &out, report.as_deref()).map(|_| ())
        }
        Commands::Ask {
            question,
            format_hint,
            json,
        } => {
            let runtime = Runtime::new(config)?;
            commands::ask(&runtime, &question, &format_hint, json)
        }
        Commands::Doctor => {
            let runtime = Runtime::new(config)?;
            if commands::doctor(&runtime) {
                Ok(())
            } else {
                std::process::exit(1);
            }
        }
    }
}
