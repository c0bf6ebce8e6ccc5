//! Subcommand implementations.

use crate::display::{check_line, outcome_line, print_outcome, print_route, progress_bar, summary_line};
use crate::jsonl::{read_questions, write_outcomes};
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use copilot_agent::config::Config;
use copilot_agent::{Router, SchemaInspector};
use copilot_shared::{BatchReport, FormatHint, Question};
use std::path::Path;
use tracing::info;

/// Run a JSONL batch and write one outcome per line.
/// Question failures are reported, never fatal.
pub fn batch(runtime: &Runtime, input: &Path, output: &Path, report_path: Option<&Path>) -> Result<BatchReport> {
    let questions = read_questions(input)?;
    info!("Loaded {} questions from {}", questions.len(), input.display());

    let agent = runtime.agent();
    let bar = progress_bar(questions.len());
    let report = agent.run_batch_with(&questions, |outcome| {
        bar.println(outcome_line(outcome));
        bar.inc(1);
    });
    bar.finish_and_clear();

    write_outcomes(output, &report.results)?;
    if let Some(path) = report_path {
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    }

    eprintln!("{}", summary_line(&report));
    eprintln!("Results written to {}", output.display());
    Ok(report)
}

/// Answer one question
pub fn ask(runtime: &Runtime, text: &str, format_hint: &str, json: bool) -> Result<()> {
    let question = Question::new("ask", text, FormatHint::parse(format_hint));
    let outcome = runtime.agent().run(&question);
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }
    Ok(())
}

/// Show the routing decision without running anything
pub fn route(config: &Config, text: &str, json: bool) -> Result<()> {
    let decision = Router::new(&config.router).classify(text);
    if json {
        println!("{}", serde_json::to_string_pretty(&decision)?);
    } else {
        print_route(&decision);
    }
    Ok(())
}

/// Check database, corpus and text generator. Returns true when all pass.
pub fn doctor(runtime: &Runtime) -> bool {
    let mut all_ok = true;

    let db_ok = runtime.db.ping();
    let db_detail = match runtime.db.table_names() {
        Ok(names) if db_ok => format!("{} ({} tables)", runtime.db.path().display(), names.len()),
        Ok(_) => format!("{} (cannot connect)", runtime.db.path().display()),
        Err(e) => e.to_string(),
    };
    all_ok &= db_ok;
    println!("{}", check_line(db_ok, "database", &db_detail));

    let stats = runtime.corpus.stats();
    let corpus_ok = stats.total_chunks > 0;
    all_ok &= corpus_ok;
    println!(
        "{}",
        check_line(
            corpus_ok,
            "corpus",
            &format!(
                "{} ({} docs, {} chunks, avg {:.0} chars)",
                runtime.config.retrieval.docs_dir, stats.total_docs, stats.total_chunks, stats.avg_chunk_len
            ),
        )
    );
    for (doc, chunks) in &stats.chunks_per_doc {
        println!("             {}: {} chunks", doc, chunks);
    }

    let llm = &runtime.config.llm;
    if !llm.enabled {
        println!("{}", check_line(true, "llm", "disabled (templates only)"));
    } else {
        let (ok, detail) = match runtime.generator.ping() {
            Ok(true) => (true, format!("{} at {}", llm.model, llm.endpoint)),
            Ok(false) => (false, format!("model {} not pulled at {}", llm.model, llm.endpoint)),
            Err(e) => (false, format!("{} ({})", llm.endpoint, e)),
        };
        all_ok &= ok;
        println!("{}", check_line(ok, "llm", &detail));
    }

    all_ok
}
