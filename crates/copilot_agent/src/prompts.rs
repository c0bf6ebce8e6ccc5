//! Prompt builders for SQL generation and repair.

use copilot_shared::Constraints;

/// Fixed instructions shared by both prompts
const SQL_RULES: &str = "You write SQLite queries for the Northwind retail database.
Rules:
- Output one SELECT statement, no semicolon, no explanation.
- Quote table names containing spaces: \"Order Details\".
- Revenue is SUM(UnitPrice * Quantity * (1 - Discount)) over \"Order Details\".
- Filter dates with date(OrderDate) BETWEEN 'YYYY-MM-DD' AND 'YYYY-MM-DD'.
Respond as JSON: {\"sql\": \"<query>\"}";

fn constraints_json(constraints: &Constraints) -> String {
    serde_json::to_string(constraints).unwrap_or_else(|_| "{}".to_string())
}

/// First-attempt prompt: schema, constraints, question
pub fn build_generation_prompt(question: &str, schema: &str, constraints: &Constraints) -> String {
    format!(
        "{}\n\nSchema:\n{}\n\nConstraints: {}\n\nQuestion: {}\nSQL:",
        SQL_RULES,
        schema,
        constraints_json(constraints),
        question
    )
}

/// Repair prompt: everything from the first prompt plus the failing
/// statement and the error it produced
pub fn build_repair_prompt(
    question: &str,
    schema: &str,
    constraints: &Constraints,
    failed_sql: Option<&str>,
    error: &str,
) -> String {
    let previous = failed_sql.unwrap_or("(no statement could be extracted)");
    format!(
        "{}\n\nSchema:\n{}\n\nConstraints: {}\n\nQuestion: {}\n\n\
         The previous query failed.\nPrevious SQL:\n{}\nError: {}\n\
         Fix the query so it runs on the schema above.\nSQL:",
        SQL_RULES,
        schema,
        constraints_json(constraints),
        question,
        previous,
        error
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use copilot_shared::DateRange;

    #[test]
    fn test_generation_prompt_contains_inputs() {
        let constraints = Constraints {
            date_range: DateRange::year(1997),
            ..Default::default()
        };
        let prompt = build_generation_prompt("Total orders?", "\"Orders\"(\n  OrderID INTEGER\n)", &constraints);
        assert!(prompt.contains("Question: Total orders?"));
        assert!(prompt.contains("\"Orders\"("));
        assert!(prompt.contains("1997-01-01"));
    }

    #[test]
    fn test_repair_prompt_carries_error() {
        let prompt = build_repair_prompt(
            "Total orders?",
            "",
            &Constraints::default(),
            Some("SELECT COUNT(*) FROM Ordrs"),
            "no such table: Ordrs",
        );
        assert!(prompt.contains("SELECT COUNT(*) FROM Ordrs"));
        assert!(prompt.contains("Error: no such table: Ordrs"));
        assert!(prompt.contains("Constraints: {}"));
    }
}
