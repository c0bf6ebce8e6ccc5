//! SQL branch: generate, execute, repair.
//!
//! ```text
//! GENERATE -> EXECUTE -> SUCCEED
//!     ^          |
//!     |          v
//!     +------ REPAIR -> FAIL (attempt ceiling)
//! ```
//!
//! The first attempt tries the template catalog, then the generator.
//! Repairs always go to the generator with the failing SQL and its error
//! in the prompt. A generator failure ends the branch at once. Every pass
//! through GENERATE is recorded as one `SqlAttempt`, success or not.

use crate::database::SqlExecutor;
use crate::generator::TextGenerator;
use crate::prompts::{build_generation_prompt, build_repair_prompt};
use crate::sql_extract::extract_sql;
use crate::templates::TemplateCatalog;
use copilot_shared::{
    AgentError, AttemptOutcome, AttemptSource, Constraints, ErrorKind, SqlAttempt, SqlRows, TraceRecorder,
    TraceStep, MAX_SQL_ATTEMPTS,
};
use tracing::{info, warn};

/// What the branch is working on
pub struct SqlRequest<'a> {
    pub question: &'a str,
    /// Rendered schema for generator prompts
    pub schema: &'a str,
    pub constraints: &'a Constraints,
}

/// Last failure, fed into the next repair prompt
#[derive(Debug, Clone)]
struct Failure {
    attempt: u8,
    sql: Option<String>,
    error: String,
}

/// Explicit loop states
enum SqlState {
    Generate {
        attempt: u8,
        previous: Option<Failure>,
    },
    Execute {
        attempt: u8,
        sql: String,
        prompt: Option<String>,
        source: AttemptSource,
    },
    Repair(Failure),
    Succeed {
        sql: String,
        rows: SqlRows,
    },
    Fail(AgentError),
}

/// Successful SQL and its rows
#[derive(Debug, Clone, PartialEq)]
pub struct SqlSuccess {
    pub sql: String,
    pub rows: SqlRows,
}

/// Branch result: the attempt log plus success or the terminal error
#[derive(Debug, Clone)]
pub struct SqlStageOutput {
    pub attempts: Vec<SqlAttempt>,
    pub result: Result<SqlSuccess, AgentError>,
}

/// Generate/execute/repair loop over the injected collaborators
pub struct SqlStage<'a> {
    generator: &'a dyn TextGenerator,
    executor: &'a dyn SqlExecutor,
    catalog: &'a TemplateCatalog,
    max_attempts: u8,
}

impl<'a> SqlStage<'a> {
    pub fn new(
        generator: &'a dyn TextGenerator,
        executor: &'a dyn SqlExecutor,
        catalog: &'a TemplateCatalog,
        max_attempts: u8,
    ) -> Self {
        Self {
            generator,
            executor,
            catalog,
            max_attempts: max_attempts.clamp(1, MAX_SQL_ATTEMPTS),
        }
    }

    pub fn run(&self, request: &SqlRequest<'_>, trace: &mut TraceRecorder) -> SqlStageOutput {
        let mut attempts: Vec<SqlAttempt> = Vec::new();
        let mut state = SqlState::Generate {
            attempt: 1,
            previous: None,
        };

        let result = loop {
            state = match state {
                SqlState::Generate { attempt, previous } => {
                    self.generate(request, attempt, previous, &mut attempts, trace)
                }
                SqlState::Execute {
                    attempt,
                    sql,
                    prompt,
                    source,
                } => {
                    let outcome = self.executor.run(&sql);
                    match outcome {
                        Ok(rows) => {
                            trace.record(
                                TraceStep::ExecuteSql,
                                &sql,
                                &format!("{} rows, columns {:?}", rows.row_count(), rows.columns),
                            );
                            attempts.push(SqlAttempt {
                                attempt,
                                sql: Some(sql.clone()),
                                prompt,
                                source,
                                outcome: AttemptOutcome::Success {
                                    columns: rows.columns.clone(),
                                    row_count: rows.row_count(),
                                },
                            });
                            SqlState::Succeed { sql, rows }
                        }
                        Err(e) => {
                            trace.record(TraceStep::ExecuteSql, &sql, &format!("error: {}", e.message));
                            attempts.push(SqlAttempt {
                                attempt,
                                sql: Some(sql.clone()),
                                prompt,
                                source,
                                outcome: AttemptOutcome::Error {
                                    kind: ErrorKind::Execution,
                                    message: e.message.clone(),
                                },
                            });
                            SqlState::Repair(Failure {
                                attempt,
                                sql: Some(sql),
                                error: e.message,
                            })
                        }
                    }
                }
                SqlState::Repair(failure) => {
                    if failure.attempt >= self.max_attempts {
                        warn!(
                            "SQL repair exhausted after {} attempts: {}",
                            failure.attempt, failure.error
                        );
                        SqlState::Fail(AgentError::RepairExhausted {
                            attempts: failure.attempt,
                            last_error: failure.error,
                        })
                    } else {
                        trace.record(
                            TraceStep::Repair,
                            &format!("attempt {} failed", failure.attempt),
                            &failure.error,
                        );
                        SqlState::Generate {
                            attempt: failure.attempt + 1,
                            previous: Some(failure),
                        }
                    }
                }
                SqlState::Succeed { sql, rows } => break Ok(SqlSuccess { sql, rows }),
                SqlState::Fail(error) => break Err(error),
            };
        };

        info!(
            "SQL stage: {} attempt(s), {}",
            attempts.len(),
            if result.is_ok() { "success" } else { "failed" }
        );
        SqlStageOutput { attempts, result }
    }

    fn generate(
        &self,
        request: &SqlRequest<'_>,
        attempt: u8,
        previous: Option<Failure>,
        attempts: &mut Vec<SqlAttempt>,
        trace: &mut TraceRecorder,
    ) -> SqlState {
        if previous.is_none() {
            if let Some(template) = self.catalog.match_question(request.question, request.constraints) {
                trace.record(
                    TraceStep::GenerateSql,
                    &format!("template {}", template.kind.name()),
                    &template.sql,
                );
                return SqlState::Execute {
                    attempt,
                    sql: template.sql,
                    prompt: None,
                    source: AttemptSource::Template {
                        name: template.kind.name().to_string(),
                    },
                };
            }
        }

        let (prompt, source) = match &previous {
            None => (
                build_generation_prompt(request.question, request.schema, request.constraints),
                AttemptSource::Generator,
            ),
            Some(failure) => (
                build_repair_prompt(
                    request.question,
                    request.schema,
                    request.constraints,
                    failure.sql.as_deref(),
                    &failure.error,
                ),
                AttemptSource::Repair,
            ),
        };

        let raw = match self.generator.generate(&prompt) {
            Ok(raw) => raw,
            Err(e) => {
                trace.record(TraceStep::GenerateSql, &source.to_string(), &format!("error: {}", e));
                let error = AgentError::Generation(e);
                attempts.push(SqlAttempt {
                    attempt,
                    sql: None,
                    prompt: Some(prompt),
                    source,
                    outcome: AttemptOutcome::Error {
                        kind: error.kind(),
                        message: error.to_string(),
                    },
                });
                return SqlState::Fail(error);
            }
        };

        match extract_sql(&raw) {
            Ok(sql) => {
                trace.record(TraceStep::GenerateSql, &source.to_string(), &sql);
                SqlState::Execute {
                    attempt,
                    sql,
                    prompt: Some(prompt),
                    source,
                }
            }
            Err(error) => {
                trace.record(TraceStep::GenerateSql, &source.to_string(), &error.to_string());
                attempts.push(SqlAttempt {
                    attempt,
                    sql: None,
                    prompt: Some(prompt),
                    source,
                    outcome: AttemptOutcome::Error {
                        kind: error.kind(),
                        message: error.to_string(),
                    },
                });
                SqlState::Repair(Failure {
                    attempt,
                    sql: None,
                    error: error.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::FakeGenerator;
    use copilot_shared::{ExecutionError, GenerationError};
    use std::cell::RefCell;

    /// Executor that fails until it sees a statement containing `accept`
    struct PickyExecutor {
        accept: &'static str,
        seen: RefCell<Vec<String>>,
    }

    impl PickyExecutor {
        fn new(accept: &'static str) -> Self {
            Self {
                accept,
                seen: RefCell::new(vec![]),
            }
        }
    }

    impl SqlExecutor for PickyExecutor {
        fn run(&self, sql: &str) -> Result<SqlRows, ExecutionError> {
            self.seen.borrow_mut().push(sql.to_string());
            if sql.contains(self.accept) {
                Ok(SqlRows::new(vec!["n".into()], vec![vec![copilot_shared::CellValue::Integer(7)]]))
            } else {
                Err(ExecutionError::new(format!("no such table near '{}'", &sql[sql.len() - 6..]), sql))
            }
        }
    }

    fn run(generator: &FakeGenerator, executor: &PickyExecutor, question: &str) -> SqlStageOutput {
        let catalog = TemplateCatalog::new();
        let stage = SqlStage::new(generator, executor, &catalog, 3);
        let constraints = Constraints::default();
        let request = SqlRequest {
            question,
            schema: "\"Orders\"(\n  OrderID INTEGER PRIMARY KEY\n)",
            constraints: &constraints,
        };
        let mut trace = TraceRecorder::new("t");
        stage.run(&request, &mut trace)
    }

    #[test]
    fn test_template_first_attempt_skips_generator() {
        let generator = FakeGenerator::unused();
        let executor = PickyExecutor::new("LIMIT 3");
        let out = run(&generator, &executor, "Top 3 products by revenue all-time");
        assert!(out.result.is_ok());
        assert_eq!(out.attempts.len(), 1);
        assert!(matches!(out.attempts[0].source, AttemptSource::Template { .. }));
        assert_eq!(generator.call_count(), 0);
    }

    #[test]
    fn test_repair_until_success() {
        let generator = FakeGenerator::new(vec![
            Ok("SELECT COUNT(*) FROM Ordrs".into()),
            Ok("SELECT COUNT(*) FROM Orderz".into()),
            Ok("SELECT COUNT(*) FROM Orders".into()),
        ]);
        let executor = PickyExecutor::new("FROM Orders");
        let out = run(&generator, &executor, "How many orders were placed?");

        let success = out.result.unwrap();
        assert_eq!(success.sql, "SELECT COUNT(*) FROM Orders");
        assert_eq!(out.attempts.len(), 3);
        assert_eq!(out.attempts[0].source, AttemptSource::Generator);
        assert_eq!(out.attempts[1].source, AttemptSource::Repair);
        assert!(out.attempts[2].succeeded());
    }

    #[test]
    fn test_repair_prompt_contains_previous_error() {
        let generator = FakeGenerator::new(vec![
            Ok("SELECT COUNT(*) FROM Ordrs".into()),
            Ok("SELECT COUNT(*) FROM Orderz".into()),
            Ok("SELECT COUNT(*) FROM Orderq".into()),
        ]);
        let executor = PickyExecutor::new("never");
        let out = run(&generator, &executor, "How many orders were placed?");

        for n in 1..out.attempts.len() {
            let prev_error = out.attempts[n - 1].error_message().unwrap();
            let prompt = out.attempts[n].prompt.as_deref().unwrap();
            assert!(prompt.contains(prev_error), "attempt {} prompt lacks prior error", n + 1);
        }
    }

    #[test]
    fn test_ceiling_is_three() {
        let generator = FakeGenerator::always("SELECT COUNT(*) FROM Nowhere");
        let executor = PickyExecutor::new("never");
        let out = run(&generator, &executor, "How many orders were placed?");

        assert_eq!(out.attempts.len(), 3);
        assert_eq!(generator.call_count(), 3);
        match out.result {
            Err(AgentError::RepairExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.contains("no such table"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        let numbers: Vec<u8> = out.attempts.iter().map(|a| a.attempt).collect();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_lower_ceiling_from_config() {
        let generator = FakeGenerator::always("SELECT COUNT(*) FROM Nowhere");
        let executor = PickyExecutor::new("never");
        let catalog = TemplateCatalog::new();
        let stage = SqlStage::new(&generator, &executor, &catalog, 1);
        let constraints = Constraints::default();
        let request = SqlRequest {
            question: "How many orders?",
            schema: "",
            constraints: &constraints,
        };
        let out = stage.run(&request, &mut TraceRecorder::new("t"));
        assert_eq!(out.attempts.len(), 1);
        assert!(matches!(out.result, Err(AgentError::RepairExhausted { attempts: 1, .. })));
    }

    #[test]
    fn test_generation_failure_ends_branch() {
        let generator = FakeGenerator::always_error(GenerationError::Timeout(90));
        let executor = PickyExecutor::new("never");
        let out = run(&generator, &executor, "How many orders were placed?");

        assert_eq!(out.attempts.len(), 1);
        assert!(out.attempts[0].sql.is_none());
        assert!(matches!(
            out.attempts[0].outcome,
            AttemptOutcome::Error { kind: ErrorKind::Generation, .. }
        ));
        assert!(matches!(out.result, Err(AgentError::Generation(GenerationError::Timeout(90)))));
        assert!(executor.seen.borrow().is_empty());
    }

    #[test]
    fn test_unextractable_output_is_repaired() {
        let generator = FakeGenerator::new(vec![
            Ok("Sorry, I don't know.".into()),
            Ok("{\"sql\": \"SELECT COUNT(*) FROM Orders\"}".into()),
        ]);
        let executor = PickyExecutor::new("FROM Orders");
        let out = run(&generator, &executor, "How many orders were placed?");

        assert!(out.result.is_ok());
        assert_eq!(out.attempts.len(), 2);
        assert!(matches!(
            out.attempts[0].outcome,
            AttemptOutcome::Error { kind: ErrorKind::NoSqlExtracted, .. }
        ));
        assert!(out.attempts[1]
            .prompt
            .as_deref()
            .unwrap()
            .contains("(no statement could be extracted)"));
    }

    #[test]
    fn test_template_failure_repairs_through_generator() {
        let generator = FakeGenerator::always("SELECT ProductName, 1 FROM Products LIMIT 3");
        let executor = PickyExecutor::new("SELECT ProductName, 1");
        let out = run(&generator, &executor, "Top 3 products by revenue");

        assert!(out.result.is_ok());
        assert_eq!(out.attempts.len(), 2);
        assert!(matches!(out.attempts[0].source, AttemptSource::Template { .. }));
        assert_eq!(out.attempts[1].source, AttemptSource::Repair);
        assert!(generator.prompts()[0].contains("Previous SQL:\nSELECT p.ProductName"));
    }
}
