//! SQL extraction from free-form generator output.
//!
//! The generator may answer with JSON (`{"sql": "..."}`), a fenced code
//! block, or a statement buried in prose. Whatever comes back, the caller
//! gets either one validated statement or `NoSqlExtracted`.

use copilot_shared::AgentError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest statement accepted
pub const MIN_SQL_LEN: usize = 10;

const EXCERPT_LEN: usize = 120;

static SQL_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)```[ \t]*sql[ \t]*\n?(.*?)```").expect("valid regex"));
static ANY_FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)```[A-Za-z]*[ \t]*\n?(.*?)```").expect("valid regex"));
static STATEMENT_HEAD_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b(select|with)\b").expect("valid regex"));

/// Extract one SQL statement from raw generator output
pub fn extract_sql(raw: &str) -> Result<String, AgentError> {
    let text = raw.trim();

    let mut candidates: Vec<String> = Vec::new();
    candidates.extend(from_json(text));
    for fence in [&*SQL_FENCE_RE, &*ANY_FENCE_RE] {
        if let Some(body) = fence.captures(text).and_then(|c| c.get(1)) {
            candidates.extend(locate_statements(body.as_str(), false));
        }
    }
    candidates.extend(locate_statements(text, true));

    candidates
        .into_iter()
        .map(|c| clean(&c))
        .find(|c| is_valid(c))
        .ok_or_else(|| AgentError::NoSqlExtracted {
            excerpt: excerpt(text),
        })
}

/// `{"sql": ...}` or `{"query": ...}`, bare or inside a json fence
fn from_json(text: &str) -> Option<String> {
    let json_text = if text.starts_with('{') && text.ends_with('}') {
        text.to_string()
    } else {
        let start = text.find('{')?;
        let end = text.rfind('}')?;
        if start >= end {
            return None;
        }
        text[start..=end].to_string()
    };
    let value: serde_json::Value = serde_json::from_str(&json_text).ok()?;
    value
        .get("sql")
        .or_else(|| value.get("query"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

/// Slices starting at each SELECT/WITH keyword, uppercase keywords first.
/// In prose a statement ends at the first `;` or blank line; inside a
/// fence it runs to the `;` or the end.
fn locate_statements(text: &str, in_prose: bool) -> Vec<String> {
    let mut heads: Vec<(bool, usize)> = STATEMENT_HEAD_RE
        .find_iter(text)
        .map(|m| (m.as_str() != m.as_str().to_uppercase(), m.start()))
        .collect();
    // false sorts first: uppercase heads win, then position
    heads.sort();

    heads
        .into_iter()
        .map(|(_, start)| {
            let rest = &text[start..];
            let mut end = rest.find(';').unwrap_or(rest.len());
            if in_prose {
                if let Some(blank) = rest.find("\n\n") {
                    end = end.min(blank);
                }
            }
            rest[..end].to_string()
        })
        .collect()
}

fn clean(sql: &str) -> String {
    let mut s = sql.trim();
    while let Some(stripped) = s.strip_suffix(';') {
        s = stripped.trim_end();
    }
    s.to_string()
}

/// Length, statement head and balanced parentheses (outside string literals)
pub fn is_valid(sql: &str) -> bool {
    if sql.chars().count() < MIN_SQL_LEN {
        return false;
    }
    let head = sql.trim_start().to_uppercase();
    if !(head.starts_with("SELECT") || head.starts_with("WITH")) {
        return false;
    }
    balanced_parens(sql)
}

fn balanced_parens(sql: &str) -> bool {
    let mut depth: i64 = 0;
    let mut in_string = false;
    for ch in sql.chars() {
        match ch {
            '\'' => in_string = !in_string,
            '(' if !in_string => depth += 1,
            ')' if !in_string => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && !in_string
}

fn excerpt(text: &str) -> String {
    let mut out: String = text.chars().take(EXCERPT_LEN).collect();
    if text.chars().count() > EXCERPT_LEN {
        out.push_str("...");
    }
    out
}
