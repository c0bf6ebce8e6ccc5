//! Planner constraints.
//!
//! Absent fields mean "no filter". Downstream stages must never treat a
//! missing constraint as a zero or empty-string value.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Inclusive calendar date range (e.g. a marketing campaign window)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    /// Name the range was resolved from ("Summer Beverages 1997", "1997")
    pub label: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(label: &str, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            label: label.to_string(),
            start,
            end,
        }
    }

    /// Whole calendar year
    pub fn year(year: i32) -> Option<Self> {
        let start = NaiveDate::from_ymd_opt(year, 1, 1)?;
        let end = NaiveDate::from_ymd_opt(year, 12, 31)?;
        Some(Self::new(&year.to_string(), start, end))
    }

    pub fn start_str(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    pub fn end_str(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }
}

/// Fixed KPI computations the SQL stage knows how to express
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KpiFormula {
    /// SUM(revenue) / COUNT(DISTINCT order)
    AverageOrderValue,
    /// Revenue minus cost of goods (cost approximated at 70% of unit price)
    GrossMargin,
    /// SUM(UnitPrice * Quantity * (1 - Discount))
    Revenue,
}

impl KpiFormula {
    pub fn id(&self) -> &'static str {
        match self {
            Self::AverageOrderValue => "average_order_value",
            Self::GrossMargin => "gross_margin",
            Self::Revenue => "revenue",
        }
    }

    pub fn from_id(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "average_order_value" | "aov" => Some(Self::AverageOrderValue),
            "gross_margin" | "gm" => Some(Self::GrossMargin),
            "revenue" => Some(Self::Revenue),
            _ => None,
        }
    }

    /// SQL aggregate over `od` ("Order Details") and `o` (Orders) aliases
    pub fn sql_expression(&self) -> &'static str {
        match self {
            Self::AverageOrderValue => {
                "SUM(od.UnitPrice * od.Quantity * (1 - od.Discount)) / COUNT(DISTINCT o.OrderID)"
            }
            Self::GrossMargin => {
                "SUM((od.UnitPrice - od.UnitPrice * 0.7) * od.Quantity * (1 - od.Discount))"
            }
            Self::Revenue => "SUM(od.UnitPrice * od.Quantity * (1 - od.Discount))",
        }
    }
}

impl std::fmt::Display for KpiFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id())
    }
}

/// Structured filters extracted by the planner. Read-only downstream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_range: Option<DateRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<KpiFormula>,
    /// Chunk ids of passages that mention a resolved value
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence: Vec<String>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self.date_range.is_none() && self.category.is_none() && self.formula.is_none()
    }

    /// Compact one-line form for traces: `dates=1997-06-01..1997-06-30 category=Beverages`
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        if let Some(r) = &self.date_range {
            parts.push(format!("dates={}..{}", r.start_str(), r.end_str()));
        }
        if let Some(c) = &self.category {
            parts.push(format!("category={}", c));
        }
        if let Some(f) = &self.formula {
            parts.push(format!("formula={}", f));
        }
        if parts.is_empty() {
            "none".to_string()
        } else {
            parts.join(" ")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_constraints_serialize_without_fields() {
        let c = Constraints::default();
        assert!(c.is_empty());
        assert_eq!(serde_json::to_string(&c).unwrap(), "{}");
        assert_eq!(c.summary(), "none");
    }

    #[test]
    fn test_year_range() {
        let r = DateRange::year(1997).unwrap();
        assert_eq!(r.start_str(), "1997-01-01");
        assert_eq!(r.end_str(), "1997-12-31");
        assert_eq!(r.label, "1997");
    }

    #[test]
    fn test_summary() {
        let c = Constraints {
            date_range: DateRange::year(1998),
            category: Some("Beverages".into()),
            formula: Some(KpiFormula::AverageOrderValue),
            evidence: vec![],
        };
        assert_eq!(
            c.summary(),
            "dates=1998-01-01..1998-12-31 category=Beverages formula=average_order_value"
        );
    }

    #[test]
    fn test_formula_ids() {
        assert_eq!(KpiFormula::from_id("AOV"), Some(KpiFormula::AverageOrderValue));
        assert_eq!(KpiFormula::from_id("gross_margin"), Some(KpiFormula::GrossMargin));
        assert_eq!(KpiFormula::from_id("churn"), None);
    }
}
