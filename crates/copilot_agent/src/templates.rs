//! SQL template catalog.
//!
//! Known question shapes get hand-written SQL instead of a generator call.
//! Templates add WHERE clauses only for constraints that are present, so
//! an unresolved category never turns into an empty filter.

use copilot_shared::{Constraints, KpiFormula};
use once_cell::sync::Lazy;
use regex::Regex;

static TOP_PRODUCTS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\btop[\s-]*(\d+)?\s+(?:\w+\s+)?products?\b").expect("valid regex")
});

/// Rows returned by "top products" when the question gives no count
pub const DEFAULT_TOP_N: u32 = 10;

/// Questions the catalog knows how to answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// Top-N products by revenue
    TopProductsByRevenue { limit: u32 },
    /// Single customer with the highest gross margin
    TopCustomerByMargin,
    /// Category with the highest quantity sold
    TopCategoryByQuantity,
    /// Average order value
    AverageOrderValue,
    /// Revenue total
    TotalRevenue,
}

impl TemplateKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::TopProductsByRevenue { .. } => "top_products_by_revenue",
            Self::TopCustomerByMargin => "top_customer_by_margin",
            Self::TopCategoryByQuantity => "top_category_by_quantity",
            Self::AverageOrderValue => "average_order_value",
            Self::TotalRevenue => "total_revenue",
        }
    }
}

/// A matched template with its rendered SQL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlTemplate {
    pub kind: TemplateKind,
    pub sql: String,
}

/// Keyword-matched template catalog
#[derive(Debug, Clone, Default)]
pub struct TemplateCatalog;

impl TemplateCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Which template, if any, fits the question
    pub fn classify(&self, question: &str) -> Option<TemplateKind> {
        let q = question.to_lowercase();
        let has = |w: &str| q.contains(w);

        // Most specific first
        if has("revenue") {
            if let Some(caps) = TOP_PRODUCTS_RE.captures(&q) {
                let limit = caps
                    .get(1)
                    .and_then(|m| m.as_str().parse::<u32>().ok())
                    .filter(|n| (1..=100).contains(n))
                    .unwrap_or(DEFAULT_TOP_N);
                return Some(TemplateKind::TopProductsByRevenue { limit });
            }
        }
        if has("customer") && has("margin") && (has("top") || has("highest") || has("best")) {
            return Some(TemplateKind::TopCustomerByMargin);
        }
        if has("categor") && has("quantity") && (has("highest") || has("top") || has("most")) {
            return Some(TemplateKind::TopCategoryByQuantity);
        }
        if has("average order value") || has("aov") {
            return Some(TemplateKind::AverageOrderValue);
        }
        if has("total revenue") {
            return Some(TemplateKind::TotalRevenue);
        }
        None
    }

    /// Match and render in one step
    pub fn match_question(&self, question: &str, constraints: &Constraints) -> Option<SqlTemplate> {
        self.classify(question).map(|kind| SqlTemplate {
            kind,
            sql: render(kind, constraints),
        })
    }
}

/// SQL string literal with quotes escaped
fn literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// WHERE clause for the present constraints, empty when none apply
fn where_clause(constraints: &Constraints) -> String {
    let mut conditions = Vec::new();
    if let Some(range) = &constraints.date_range {
        conditions.push(format!(
            "date(o.OrderDate) BETWEEN {} AND {}",
            literal(&range.start_str()),
            literal(&range.end_str())
        ));
    }
    if let Some(category) = &constraints.category {
        conditions.push(format!("c.CategoryName = {}", literal(category)));
    }
    if conditions.is_empty() {
        String::new()
    } else {
        format!("\nWHERE {}", conditions.join("\n  AND "))
    }
}

/// Orders joined to their lines, plus products/categories when needed
fn from_clause(with_products: bool, with_categories: bool) -> String {
    let mut sql = "FROM Orders o\nJOIN \"Order Details\" od ON od.OrderID = o.OrderID".to_string();
    if with_products || with_categories {
        sql.push_str("\nJOIN Products p ON p.ProductID = od.ProductID");
    }
    if with_categories {
        sql.push_str("\nJOIN Categories c ON c.CategoryID = p.CategoryID");
    }
    sql
}

/// Render a template against the constraints
pub fn render(kind: TemplateKind, constraints: &Constraints) -> String {
    let by_category = constraints.category.is_some();
    let filters = where_clause(constraints);
    let revenue = KpiFormula::Revenue.sql_expression();

    match kind {
        TemplateKind::TopProductsByRevenue { limit } => format!(
            "SELECT p.ProductName AS product, {revenue} AS revenue\n{from}{filters}\n\
             GROUP BY p.ProductID, p.ProductName\nORDER BY revenue DESC\nLIMIT {limit}",
            from = from_clause(true, by_category),
        ),
        TemplateKind::TopCustomerByMargin => format!(
            "SELECT cu.CompanyName AS customer, {margin} AS margin\n{from}\n\
             JOIN Customers cu ON cu.CustomerID = o.CustomerID{filters}\n\
             GROUP BY cu.CustomerID, cu.CompanyName\nORDER BY margin DESC\nLIMIT 1",
            margin = KpiFormula::GrossMargin.sql_expression(),
            from = from_clause(by_category, by_category),
        ),
        TemplateKind::TopCategoryByQuantity => format!(
            "SELECT c.CategoryName AS category, SUM(od.Quantity) AS quantity\n{from}{filters}\n\
             GROUP BY c.CategoryID, c.CategoryName\nORDER BY quantity DESC\nLIMIT 1",
            from = from_clause(true, true),
        ),
        TemplateKind::AverageOrderValue => format!(
            "SELECT ROUND({aov}, 2) AS aov\n{from}{filters}",
            aov = KpiFormula::AverageOrderValue.sql_expression(),
            from = from_clause(by_category, by_category),
        ),
        TemplateKind::TotalRevenue => format!(
            "SELECT ROUND({revenue}, 2) AS revenue\n{from}{filters}",
            from = from_clause(by_category, by_category),
        ),
    }
}
