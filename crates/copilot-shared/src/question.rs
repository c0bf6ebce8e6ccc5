//! Questions and their expected answer shape.

use serde::{Deserialize, Serialize};

/// Scalar type of a single field inside a record-shaped hint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Int,
    Float,
    Str,
}

impl FieldKind {
    fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "int" | "integer" => Self::Int,
            "float" | "number" | "decimal" => Self::Float,
            _ => Self::Str,
        }
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Int => "int",
            Self::Float => "float",
            Self::Str => "str",
        };
        write!(f, "{}", s)
    }
}

/// Named, typed field of a dict/list record hint (e.g. `revenue:float`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Expected type of a question's final answer.
///
/// Parsed from the textual hint carried by each batch record:
/// `int`, `float`, `str`, `list`, `dict`, `{name:type, ...}` or
/// `list[{name:type, ...}]`. Parsing is total: unknown text means `str`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FormatHint {
    Int,
    Float,
    Str,
    /// Multi-row result; empty `fields` means "use column names"
    List { fields: Vec<FieldSpec> },
    /// Single record; empty `fields` means "use column names"
    Dict { fields: Vec<FieldSpec> },
}

impl FormatHint {
    pub fn parse(hint: &str) -> Self {
        let t = hint.trim();
        let lower = t.to_lowercase();

        match lower.as_str() {
            "int" | "integer" => return Self::Int,
            "float" | "number" => return Self::Float,
            "str" | "string" | "" => return Self::Str,
            "list" => return Self::List { fields: vec![] },
            "dict" | "object" => return Self::Dict { fields: vec![] },
            _ => {}
        }

        if lower.starts_with("list") {
            let inner = t
                .find('[')
                .and_then(|s| t.rfind(']').map(|e| (s, e)))
                .filter(|(s, e)| s < e)
                .map(|(s, e)| &t[s + 1..e])
                .unwrap_or("");
            return Self::List {
                fields: parse_fields(inner),
            };
        }

        if t.starts_with('{') {
            return Self::Dict {
                fields: parse_fields(t),
            };
        }

        Self::Str
    }

    /// Field list for record-shaped hints (empty for scalars)
    pub fn fields(&self) -> &[FieldSpec] {
        match self {
            Self::List { fields } | Self::Dict { fields } => fields,
            _ => &[],
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Self::Int | Self::Float | Self::Str)
    }
}

/// Parse `{a:str, b:float}` (braces optional) into field specs
fn parse_fields(s: &str) -> Vec<FieldSpec> {
    let body = s.trim().trim_start_matches('{').trim_end_matches('}');
    body.split(',')
        .filter_map(|part| {
            let (name, kind) = match part.split_once(':') {
                Some((n, k)) => (n.trim(), FieldKind::parse(k)),
                None => (part.trim(), FieldKind::Str),
            };
            let name = name.trim_matches(|c| c == '"' || c == '\'');
            if name.is_empty() {
                None
            } else {
                Some(FieldSpec {
                    name: name.to_string(),
                    kind,
                })
            }
        })
        .collect()
}

fn render_fields(fields: &[FieldSpec]) -> String {
    let parts: Vec<String> = fields
        .iter()
        .map(|f| format!("{}:{}", f.name, f.kind))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

impl std::fmt::Display for FormatHint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::Str => write!(f, "str"),
            Self::List { fields } if fields.is_empty() => write!(f, "list"),
            Self::List { fields } => write!(f, "list[{}]", render_fields(fields)),
            Self::Dict { fields } if fields.is_empty() => write!(f, "dict"),
            Self::Dict { fields } => write!(f, "{}", render_fields(fields)),
        }
    }
}

impl From<String> for FormatHint {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<FormatHint> for String {
    fn from(h: FormatHint) -> Self {
        h.to_string()
    }
}

impl Default for FormatHint {
    fn default() -> Self {
        Self::Str
    }
}

/// A question as read from the batch input. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    /// Question text (`question` is accepted on input)
    #[serde(alias = "question")]
    pub text: String,
    #[serde(default)]
    pub format_hint: FormatHint,
}

impl Question {
    pub fn new(id: &str, text: &str, format_hint: FormatHint) -> Self {
        Self {
            id: id.to_string(),
            text: text.to_string(),
            format_hint,
        }
    }
}
