//! Answer synthesis.
//!
//! Turns SQL rows or retrieved passages into a value shaped by the
//! question's format hint, attaches citations and scores confidence.
//! SQL wins when it produced usable rows; otherwise the best-matching
//! passage line is mined for a value of the hinted type.

use crate::corpus::tokenize;
use crate::sql_stage::SqlSuccess;
use copilot_shared::confidence::compute_confidence;
use copilot_shared::passage::top_score;
use copilot_shared::{
    AgentError, CellValue, CitationSet, ConfidenceInput, ConfidencePolicy, Constraints, FieldKind,
    FieldSpec, FinalAnswer, FormatHint, Question, RetrievedPassage, Route, SqlAttempt, SqlRows,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// FROM/JOIN targets: "quoted", [bracketed], `backticked` or bare
static TABLE_REF_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(?:from|join)\s+(?:"([^"]+)"|\[([^\]]+)\]|`([^`]+)`|([A-Za-z_][A-Za-z0-9_]*))"#)
        .expect("valid regex")
});
static DAYS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\b(\d+)\s*days?\b").expect("valid regex"));
static INTEGER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+)\b").expect("valid regex"));
static NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(\d+(?:\.\d+)?)\b").expect("valid regex"));

/// Words are compared on this many leading characters ("returned" ~ "returns")
const STEM_LEN: usize = 5;

/// Everything known about a question once the branches have run
pub struct SynthesisInput<'a> {
    pub question: &'a Question,
    pub route: Route,
    /// Empty when retrieval did not run or found nothing
    pub passages: &'a [RetrievedPassage],
    pub retrieval_ran: bool,
    pub constraints: Option<&'a Constraints>,
    pub sql: Option<&'a SqlSuccess>,
    pub attempts: &'a [SqlAttempt],
}

/// Value found in a passage line
#[derive(Debug, Clone, PartialEq)]
struct DocValue {
    value: Value,
    chunk_id: String,
}

pub struct Synthesizer {
    policy: ConfidencePolicy,
    /// Schema table names used to canonicalise citations
    table_names: Vec<String>,
}

impl Synthesizer {
    pub fn new(policy: ConfidencePolicy, table_names: Vec<String>) -> Self {
        Self { policy, table_names }
    }

    pub fn synthesize(&self, input: &SynthesisInput<'_>) -> Result<FinalAnswer, AgentError> {
        let hint = &input.question.format_hint;

        let from_sql = input
            .sql
            .filter(|_| input.route.uses_sql())
            .and_then(|s| value_from_rows(hint, &s.rows).map(|v| (v, s)));

        let (value, citations, source) = if let Some((value, sql)) = from_sql {
            let mut citations = CitationSet::new();
            for table in self.tables_in(&sql.sql) {
                citations.cite_table(&table);
            }
            if input.route == Route::Hybrid {
                for chunk in input.constraints.map(|c| c.evidence.as_slice()).unwrap_or(&[]) {
                    citations.cite_chunk(chunk);
                }
            }
            let source = format!("Computed from {} database rows", sql.rows.row_count());
            (value, citations, source)
        } else if let Some(found) = input
            .route
            .uses_retrieval()
            .then(|| value_from_passages(&input.question.text, hint, input.passages, input.constraints))
            .flatten()
        {
            let mut citations = CitationSet::new();
            citations.cite_chunk(&found.chunk_id);
            if input.route == Route::Hybrid {
                for chunk in input.constraints.map(|c| c.evidence.as_slice()).unwrap_or(&[]) {
                    citations.cite_chunk(chunk);
                }
            }
            let source = format!("Extracted from {}", found.chunk_id);
            (found.value, citations, source)
        } else {
            return Err(AgentError::UnresolvedAnswer(unresolved_reason(input)));
        };

        let confidence = compute_confidence(
            &ConfidenceInput {
                sql_attempts: input.attempts.len(),
                retrieval_ran: input.retrieval_ran,
                top_passage_score: top_score(input.passages),
            },
            &self.policy,
        );

        let mut explanation = source;
        if let Some(c) = input.constraints.filter(|c| !c.is_empty()) {
            explanation.push_str(&format!(" ({})", c.summary()));
        }
        if let Some(penalty) = confidence.primary_explanation() {
            explanation.push_str(&format!("; {}", penalty));
        }

        debug!("Synthesized {} with confidence {:.2}", value, confidence.score);
        Ok(FinalAnswer {
            value,
            citations,
            confidence: confidence.score,
            explanation,
        })
    }

    /// Tables referenced by FROM/JOIN, mapped to schema names. Without a
    /// schema every reference is kept as written.
    pub fn tables_in(&self, sql: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for caps in TABLE_REF_RE.captures_iter(sql) {
            let Some(raw) = (1..=4).find_map(|i| caps.get(i)).map(|m| m.as_str().trim()) else {
                continue;
            };
            let canonical = if self.table_names.is_empty() {
                Some(raw.to_string())
            } else {
                self.table_names
                    .iter()
                    .find(|t| t.eq_ignore_ascii_case(raw))
                    .cloned()
            };
            // CTE names and other non-tables fall out here
            if let Some(name) = canonical {
                if seen.insert(name.to_lowercase()) {
                    out.push(name);
                }
            }
        }
        out
    }
}

fn unresolved_reason(input: &SynthesisInput<'_>) -> String {
    let mut parts = Vec::new();
    if input.route.uses_sql() {
        parts.push(match input.sql {
            Some(s) if s.rows.is_empty() => "SQL returned no rows".to_string(),
            Some(_) => format!("SQL rows do not fit format hint {}", input.question.format_hint),
            None => "SQL branch failed".to_string(),
        });
    }
    if input.route.uses_retrieval() {
        parts.push(if input.passages.is_empty() {
            "no passages retrieved".to_string()
        } else {
            format!("no {} value found in passages", input.question.format_hint)
        });
    }
    parts.join("; ")
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

/// Cell as JSON with reals rounded to 2 decimals
fn cell_json(cell: &CellValue) -> Value {
    match cell {
        CellValue::Real(r) => Value::from(round2(*r)),
        other => other.to_json(),
    }
}

fn typed_cell(cell: &CellValue, kind: FieldKind) -> Value {
    match kind {
        FieldKind::Int => cell.as_i64().map(Value::from).unwrap_or(Value::Null),
        FieldKind::Float => cell.as_f64().map(|v| Value::from(round2(v))).unwrap_or(Value::Null),
        FieldKind::Str => cell.as_text().map(Value::String).unwrap_or(Value::Null),
    }
}

/// One row as an object: hint field names when they line up with the
/// columns, column names otherwise
fn record(columns: &[String], row: &[CellValue], fields: &[FieldSpec]) -> Value {
    let mut map = Map::new();
    if !fields.is_empty() && fields.len() == columns.len() {
        for (field, cell) in fields.iter().zip(row) {
            map.insert(field.name.clone(), typed_cell(cell, field.kind));
        }
    } else {
        for (column, cell) in columns.iter().zip(row) {
            map.insert(column.clone(), cell_json(cell));
        }
    }
    Value::Object(map)
}

/// Shape result rows per the hint. `None` when the rows cannot carry a
/// value of that type (including an empty result).
pub fn value_from_rows(hint: &FormatHint, rows: &SqlRows) -> Option<Value> {
    if rows.is_empty() {
        return None;
    }
    match hint {
        FormatHint::Int => rows.first_cell()?.as_i64().map(Value::from),
        FormatHint::Float => rows.first_cell()?.as_f64().map(|v| Value::from(round2(v))),
        FormatHint::Str => rows.first_cell()?.as_text().map(Value::String),
        FormatHint::Dict { fields } => {
            let row = rows.rows.first()?;
            Some(record(&rows.columns, row, fields))
        }
        FormatHint::List { fields } => {
            let items = if rows.columns.len() == 1 {
                rows.rows
                    .iter()
                    .filter_map(|r| r.first())
                    .map(|cell| match fields.first() {
                        Some(f) => typed_cell(cell, f.kind),
                        None => cell_json(cell),
                    })
                    .collect()
            } else {
                rows.rows
                    .iter()
                    .map(|r| record(&rows.columns, r, fields))
                    .collect()
            };
            Some(Value::Array(items))
        }
    }
}

fn stem(word: &str) -> String {
    word.chars().take(STEM_LEN).collect()
}

fn stems(text: &str) -> HashSet<String> {
    tokenize(text).iter().map(|w| stem(w)).collect()
}

/// Question content words plus resolved planner values
fn query_stems(question: &str, constraints: Option<&Constraints>) -> HashSet<String> {
    let mut out = stems(question);
    if let Some(c) = constraints {
        if let Some(category) = &c.category {
            out.extend(stems(category));
        }
        if let Some(range) = &c.date_range {
            out.extend(stems(&range.label));
        }
    }
    out
}

/// Value of the hinted type in one line, if present
fn value_in_line(question: &str, hint: &FormatHint, line: &str) -> Option<Value> {
    match hint {
        FormatHint::Int => {
            let asks_days = question.to_lowercase().contains("day");
            let re = if asks_days { &*DAYS_RE } else { &*INTEGER_RE };
            re.captures(line)?
                .get(1)?
                .as_str()
                .parse::<i64>()
                .ok()
                .map(Value::from)
        }
        FormatHint::Float => NUMBER_RE
            .captures(line)?
            .get(1)?
            .as_str()
            .parse::<f64>()
            .ok()
            .map(|v| Value::from(round2(v))),
        FormatHint::Str => {
            let text = line.trim_start_matches(|c: char| matches!(c, '-' | '*' | '#' | '>') || c.is_whitespace());
            let text = text.trim();
            (!text.is_empty()).then(|| Value::String(text.to_string()))
        }
        FormatHint::List { .. } | FormatHint::Dict { .. } => None,
    }
}

/// Best-scoring passage line that yields a value of the hinted type.
/// Ties keep passage rank, then line order.
fn value_from_passages(
    question: &str,
    hint: &FormatHint,
    passages: &[RetrievedPassage],
    constraints: Option<&Constraints>,
) -> Option<DocValue> {
    let wanted = query_stems(question, constraints);

    let mut lines: Vec<(usize, &RetrievedPassage, &str)> = passages
        .iter()
        .flat_map(|p| {
            p.text
                .lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(move |l| (p, l))
        })
        .map(|(p, line)| {
            let overlap = stems(line).intersection(&wanted).count();
            (overlap, p, line)
        })
        .filter(|(overlap, _, _)| *overlap > 0)
        .collect();
    lines.sort_by(|a, b| b.0.cmp(&a.0));

    lines.into_iter().find_map(|(_, p, line)| {
        value_in_line(question, hint, line).map(|value| DocValue {
            value,
            chunk_id: p.chunk_id.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_shared::{AttemptOutcome, AttemptSource, DateRange};
    use serde_json::json;

    const POLICY: &str = "# Returns & Policy\n\
        - Perishables (Produce, Seafood, Dairy): 3-7 days.\n\
        - Beverages unopened: 14 days; opened: no returns.\n\
        - Non-perishables: 30 days.";

    fn tables() -> Vec<String> {
        ["Categories", "Customers", "Order Details", "Orders", "Products"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn synth() -> Synthesizer {
        Synthesizer::new(ConfidencePolicy::default(), tables())
    }

    fn attempt(n: u8) -> SqlAttempt {
        SqlAttempt {
            attempt: n,
            sql: Some("SELECT 1".into()),
            prompt: None,
            source: AttemptSource::Generator,
            outcome: AttemptOutcome::Success { columns: vec![], row_count: 1 },
        }
    }

    fn product_rows() -> SqlRows {
        SqlRows::new(
            vec!["product".into(), "revenue".into()],
            vec![
                vec![CellValue::Text("Côte de Blaye".into()), CellValue::Real(141396.7356)],
                vec![CellValue::Text("Thüringer Rostbratwurst".into()), CellValue::Real(80368.6724)],
            ],
        )
    }

    #[test]
    fn test_value_from_rows_scalars() {
        let rows = SqlRows::new(vec!["aov".into()], vec![vec![CellValue::Real(1631.8756)]]);
        assert_eq!(value_from_rows(&FormatHint::Float, &rows), Some(json!(1631.88)));
        assert_eq!(value_from_rows(&FormatHint::Int, &rows), Some(json!(1632)));
        assert_eq!(value_from_rows(&FormatHint::Str, &rows), Some(json!("1631.8756")));
        assert_eq!(value_from_rows(&FormatHint::Int, &SqlRows::default()), None);
    }

    #[test]
    fn test_value_from_rows_dict_uses_hint_names() {
        let rows = SqlRows::new(
            vec!["CategoryName".into(), "total".into()],
            vec![vec![CellValue::Text("Beverages".into()), CellValue::Real(120.0)]],
        );
        let hint = FormatHint::parse("{category:str, quantity:int}");
        assert_eq!(
            value_from_rows(&hint, &rows),
            Some(json!({"category": "Beverages", "quantity": 120}))
        );
        // Field count mismatch: column names win
        let hint = FormatHint::parse("{category:str}");
        assert_eq!(
            value_from_rows(&hint, &rows),
            Some(json!({"CategoryName": "Beverages", "total": 120.0}))
        );
    }

    #[test]
    fn test_value_from_rows_list() {
        let value = value_from_rows(&FormatHint::List { fields: vec![] }, &product_rows()).unwrap();
        assert_eq!(
            value,
            json!([
                {"product": "Côte de Blaye", "revenue": 141396.74},
                {"product": "Thüringer Rostbratwurst", "revenue": 80368.67}
            ])
        );

        let single = SqlRows::new(
            vec!["name".into()],
            vec![vec![CellValue::Text("a".into())], vec![CellValue::Text("b".into())]],
        );
        assert_eq!(
            value_from_rows(&FormatHint::List { fields: vec![] }, &single),
            Some(json!(["a", "b"]))
        );
    }

    #[test]
    fn test_tables_in_sql() {
        let s = synth();
        let sql = "SELECT p.ProductName FROM orders o JOIN \"Order Details\" od ON 1=1 \
                   JOIN [Products] p ON 1=1 JOIN `categories` c ON 1=1";
        assert_eq!(s.tables_in(sql), vec!["Orders", "Order Details", "Products", "Categories"]);

        let cte = "WITH t AS (SELECT * FROM Orders) SELECT * FROM t JOIN Orders o ON 1=1";
        assert_eq!(s.tables_in(cte), vec!["Orders"]);

        let no_schema = Synthesizer::new(ConfidencePolicy::default(), vec![]);
        assert_eq!(no_schema.tables_in("SELECT * FROM Shippers"), vec!["Shippers"]);
    }

    #[test]
    fn test_rag_days_from_policy() {
        let question = Question::new("q1", "How many days can Beverages be returned?", FormatHint::Int);
        let passages = vec![
            RetrievedPassage::new("marketing_calendar", "marketing_calendar::chunk0", "Summer runs 30 days", 0.4),
            RetrievedPassage::new("product_policy", "product_policy::chunk0", POLICY, 0.3),
        ];
        let answer = synth()
            .synthesize(&SynthesisInput {
                question: &question,
                route: Route::Rag,
                passages: &passages,
                retrieval_ran: true,
                constraints: None,
                sql: None,
                attempts: &[],
            })
            .unwrap();
        assert_eq!(answer.value, json!(14));
        assert_eq!(answer.citations.references(), vec!["product_policy::chunk0"]);
        assert_eq!(answer.confidence, 1.0);
        assert!(answer.explanation.starts_with("Extracted from product_policy::chunk0"));
    }

    #[test]
    fn test_rag_str_strips_bullet() {
        let question = Question::new("q", "What is the unopened Beverages return rule?", FormatHint::Str);
        let passages = vec![RetrievedPassage::new("product_policy", "product_policy::chunk0", POLICY, 0.5)];
        let answer = synth()
            .synthesize(&SynthesisInput {
                question: &question,
                route: Route::Rag,
                passages: &passages,
                retrieval_ran: true,
                constraints: None,
                sql: None,
                attempts: &[],
            })
            .unwrap();
        assert_eq!(answer.value, json!("Beverages unopened: 14 days; opened: no returns."));
    }

    #[test]
    fn test_sql_answer_cites_tables_and_penalises_repairs() {
        let question = Question::new("q", "Top 2 products by revenue", FormatHint::List { fields: vec![] });
        let sql = SqlSuccess {
            sql: "SELECT p.ProductName AS product FROM Orders o JOIN \"Order Details\" od ON 1 JOIN Products p ON 1"
                .into(),
            rows: product_rows(),
        };
        let attempts = vec![attempt(1), attempt(2)];
        let answer = synth()
            .synthesize(&SynthesisInput {
                question: &question,
                route: Route::Sql,
                passages: &[],
                retrieval_ran: false,
                constraints: None,
                sql: Some(&sql),
                attempts: &attempts,
            })
            .unwrap();
        assert_eq!(answer.citations.references(), vec!["Order Details", "Orders", "Products"]);
        assert_eq!(answer.confidence, 0.85);
        assert!(answer.explanation.starts_with("Computed from 2 database rows"));
        assert!(answer.explanation.contains("SQL needed repair"));
    }

    #[test]
    fn test_hybrid_adds_evidence_chunks() {
        let question = Question::new("q", "AOV during Winter Classics 1997?", FormatHint::Float);
        let constraints = Constraints {
            date_range: DateRange::year(1997),
            evidence: vec!["marketing_calendar::chunk1".into()],
            ..Default::default()
        };
        let sql = SqlSuccess {
            sql: "SELECT 1 FROM Orders".into(),
            rows: SqlRows::new(vec!["aov".into()], vec![vec![CellValue::Real(1.234)]]),
        };
        let passages = vec![RetrievedPassage::new("marketing_calendar", "marketing_calendar::chunk1", "x", 0.05)];
        let attempts = vec![attempt(1)];
        let answer = synth()
            .synthesize(&SynthesisInput {
                question: &question,
                route: Route::Hybrid,
                passages: &passages,
                retrieval_ran: true,
                constraints: Some(&constraints),
                sql: Some(&sql),
                attempts: &attempts,
            })
            .unwrap();
        assert_eq!(answer.value, json!(1.23));
        assert!(answer.citations.contains_reference("Orders"));
        assert!(answer.citations.contains_reference("marketing_calendar::chunk1"));
        // Weak retrieval costs 0.2
        assert_eq!(answer.confidence, 0.8);
    }

    #[test]
    fn test_hybrid_falls_back_to_passages() {
        let question = Question::new("q", "How many days can Beverages be returned?", FormatHint::Int);
        let passages = vec![RetrievedPassage::new("product_policy", "product_policy::chunk0", POLICY, 0.6)];
        let answer = synth()
            .synthesize(&SynthesisInput {
                question: &question,
                route: Route::Hybrid,
                passages: &passages,
                retrieval_ran: true,
                constraints: None,
                sql: None,
                attempts: &[attempt(1), attempt(2), attempt(3)],
            })
            .unwrap();
        assert_eq!(answer.value, json!(14));
        assert_eq!(answer.confidence, 0.7);
    }

    #[test]
    fn test_unresolved_when_nothing_usable() {
        let question = Question::new("q", "How many days?", FormatHint::Int);
        let err = synth()
            .synthesize(&SynthesisInput {
                question: &question,
                route: Route::Hybrid,
                passages: &[],
                retrieval_ran: true,
                constraints: None,
                sql: None,
                attempts: &[],
            })
            .unwrap_err();
        match err {
            AgentError::UnresolvedAnswer(reason) => {
                assert_eq!(reason, "SQL branch failed; no passages retrieved");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_sql_route_ignores_passages() {
        let question = Question::new("q", "Total revenue?", FormatHint::Float);
        let sql = SqlSuccess {
            sql: "SELECT 1 FROM Orders".into(),
            rows: SqlRows::default(),
        };
        let passages = vec![RetrievedPassage::new("d", "d::chunk0", "Total revenue 12.5", 0.9)];
        let result = synth().synthesize(&SynthesisInput {
            question: &question,
            route: Route::Sql,
            passages: &passages,
            retrieval_ran: false,
            constraints: None,
            sql: Some(&sql),
            attempts: &[attempt(1)],
        });
        assert!(matches!(result, Err(AgentError::UnresolvedAnswer(_))));
    }
}
