//! Result rows returned by the SQL executor boundary.

use serde::{Deserialize, Serialize};

/// A single result cell
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    /// Numeric view; numeric-looking text is accepted
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Integer(i) => Some(*i as f64),
            CellValue::Real(r) if r.is_finite() => Some(*r),
            CellValue::Text(t) => t.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }

    /// Integer view, rounding reals to nearest
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Integer(i) => Some(*i),
            other => other.as_f64().map(|v| v.round() as i64),
        }
    }

    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Null => None,
            CellValue::Integer(i) => Some(i.to_string()),
            CellValue::Real(r) => Some(r.to_string()),
            CellValue::Text(t) => Some(t.clone()),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Null => serde_json::Value::Null,
            CellValue::Integer(i) => serde_json::Value::from(*i),
            CellValue::Real(r) => serde_json::Number::from_f64(*r)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Text(t) => serde_json::Value::String(t.clone()),
        }
    }
}

/// Ordered result set: column names plus rows in column order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SqlRows {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl SqlRows {
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First cell of the first row, if any
    pub fn first_cell(&self) -> Option<&CellValue> {
        self.rows.first().and_then(|r| r.first())
    }

    /// Rows as ordered `(column, cell)` pairs
    pub fn row_mappings(&self) -> Vec<Vec<(&str, &CellValue)>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .map(|c| c.as_str())
                    .zip(row.iter())
                    .collect()
            })
            .collect()
    }
}
