//! Terminal output. Status lines go to stderr so stdout stays clean for
//! JSON output.

use copilot_shared::{BatchReport, Citation, QuestionOutcome, RouteDecision};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;

/// Longest answer text shown on a status line
const VALUE_PREVIEW_LEN: usize = 60;

fn preview(text: &str) -> String {
    if text.chars().count() <= VALUE_PREVIEW_LEN {
        text.to_string()
    } else {
        let cut: String = text.chars().take(VALUE_PREVIEW_LEN).collect();
        format!("{}...", cut)
    }
}

fn answer_text(outcome: &QuestionOutcome) -> String {
    match &outcome.final_answer {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "null".to_string(),
    }
}

/// `✓ id [route] value (confidence)` or `✗ id [route] error`
pub fn outcome_line(outcome: &QuestionOutcome) -> String {
    if outcome.success {
        format!(
            "{} {} [{}] {} ({:.2})",
            "✓".green(),
            outcome.id,
            outcome.route,
            preview(&answer_text(outcome)),
            outcome.confidence
        )
    } else {
        let error = outcome
            .error
            .as_ref()
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_else(|| "failed".to_string());
        format!(
            "{} {} [{}] {}",
            "✗".red(),
            outcome.id,
            outcome.route,
            preview(&error).red()
        )
    }
}

/// `Success rate: 2/3 (66.7%)`
pub fn summary_line(report: &BatchReport) -> String {
    format!(
        "Success rate: {}/{} ({:.1}%)",
        report.succeeded,
        report.succeeded + report.failed,
        report.success_rate()
    )
}

pub fn progress_bar(len: usize) -> ProgressBar {
    let bar = ProgressBar::new(len as u64);
    if let Ok(style) =
        ProgressStyle::default_bar().template("{spinner:.magenta} [{bar:30.cyan/blue}] {pos}/{len} {msg}")
    {
        bar.set_style(style.progress_chars("=> "));
    }
    bar
}

/// Full single-question display for `ask`
pub fn print_outcome(outcome: &QuestionOutcome) {
    let conf_str = format!("{:.2}", outcome.confidence);
    let (conf_colored, indicator) = if !outcome.success {
        (conf_str.bright_red().to_string(), "[FAILED]".bright_red().to_string())
    } else if outcome.confidence >= 0.9 {
        (conf_str.bright_green().to_string(), "[OK]".bright_green().to_string())
    } else if outcome.confidence >= 0.7 {
        (conf_str.yellow().to_string(), "[PARTIAL]".yellow().to_string())
    } else {
        (conf_str.bright_red().to_string(), "[LOW]".bright_red().to_string())
    };

    println!();
    println!("{}  Route: {}  Confidence: {}", indicator, outcome.route, conf_colored);
    println!();
    println!("{}", answer_text(outcome).bold());
    println!("{}", outcome.explanation.dimmed());

    if !outcome.citations.is_empty() {
        println!();
        println!("[CITATIONS]");
        for citation in outcome.citations.iter() {
            println!("  * {}", Citation::display(citation).cyan());
        }
    }

    if let Some(sql) = &outcome.sql {
        println!();
        println!("[SQL]");
        for line in sql.lines() {
            println!("  {}", line);
        }
    }

    if !outcome.warnings.is_empty() {
        println!();
        for w in &outcome.warnings {
            println!("[NOTE] {}", w.message.yellow());
        }
    }
    if let Some(error) = &outcome.error {
        println!();
        println!("[ERROR] {}", error.message.red());
    }
    println!();
}

pub fn print_route(decision: &RouteDecision) {
    let mut line = format!("{}  {}", decision.route.to_string().bold(), decision.rationale);
    if decision.ambiguous {
        line.push_str(&format!("  {}", "(ambiguous)".yellow()));
    }
    println!("{}", line);
    if !decision.sql_signals.is_empty() {
        println!("  sql: {}", decision.sql_signals.join(", "));
    }
    if !decision.doc_signals.is_empty() {
        println!("  doc: {}", decision.doc_signals.join(", "));
    }
}

/// `[ok]`/`[fail]` line for `doctor`
pub fn check_line(ok: bool, label: &str, detail: &str) -> String {
    if ok {
        format!("{} {:<10} {}", "[ok]  ".green(), label, detail)
    } else {
        format!("{} {:<10} {}", "[fail]".red(), label, detail.red())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_shared::{CitationSet, ErrorKind, ErrorRecord, Route, TraceRecorder};

    fn outcome(success: bool) -> QuestionOutcome {
        QuestionOutcome {
            id: "q1".into(),
            success,
            route: Route::Rag,
            final_answer: success.then(|| serde_json::json!(14)),
            citations: CitationSet::new(),
            confidence: if success { 1.0 } else { 0.0 },
            explanation: String::new(),
            sql: None,
            sql_attempts: vec![],
            constraints: None,
            error: (!success).then(|| ErrorRecord {
                kind: ErrorKind::UnresolvedAnswer,
                message: "no usable answer".into(),
            }),
            warnings: vec![],
            trace: TraceRecorder::new("q1").seal(),
        }
    }

    #[test]
    fn test_outcome_lines() {
        let ok = outcome_line(&outcome(true));
        assert!(ok.contains("q1 [rag] 14 (1.00)"));
        assert!(ok.contains('✓'));

        let failed = outcome_line(&outcome(false));
        assert!(failed.contains('✗'));
        assert!(failed.contains("unresolved_answer: no usable answer"));
    }

    #[test]
    fn test_summary_line() {
        let mut report = BatchReport::new();
        report.push(outcome(true));
        report.push(outcome(true));
        report.push(outcome(false));
        assert_eq!(summary_line(&report), "Success rate: 2/3 (66.7%)");
    }

    #[test]
    fn test_preview_truncates() {
        let long = "x".repeat(100);
        assert_eq!(preview(&long).chars().count(), VALUE_PREVIEW_LEN + 3);
    }
}
