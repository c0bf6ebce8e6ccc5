//! JSONL batch input and output.

use anyhow::{Context, Result};
use copilot_shared::{Question, QuestionOutcome};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

/// Parse questions, one JSON object per line. Blank lines are skipped;
/// a malformed line is an error naming its line number.
pub fn parse_questions(text: &str) -> Result<Vec<Question>> {
    let mut questions = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let question: Question = serde_json::from_str(line)
            .with_context(|| format!("invalid question on line {}", idx + 1))?;
        questions.push(question);
    }
    Ok(questions)
}

pub fn read_questions(path: &Path) -> Result<Vec<Question>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("Failed to open {}", path.display()))?;
    parse_questions(&text)
}

/// Write any serialisable records as JSONL
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let file = File::create(path).with_context(|| format!("Failed to create {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for record in records {
        serde_json::to_writer(&mut out, record)?;
        out.write_all(b"\n")?;
    }
    out.flush()
        .with_context(|| format!("Failed to write {}", path.display()))
}

pub fn write_outcomes(path: &Path, outcomes: &[QuestionOutcome]) -> Result<()> {
    write_jsonl(path, outcomes)
}
