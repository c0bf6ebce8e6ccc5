//! Question pipeline.
//!
//! route -> (retrieve -> plan)? -> (generate -> execute -> repair)? ->
//! synthesize -> seal. Dispatch is a `match` on the route; each question
//! gets its own `RunState` and trace, so nothing leaks between questions.

use crate::config::Config;
use crate::database::{SchemaInspector, SqlExecutor, TableSchema};
use crate::generator::TextGenerator;
use crate::planner::Planner;
use crate::retriever::{Retriever, RetrieverAdapter};
use crate::router::Router;
use crate::sql_stage::{SqlRequest, SqlStage, SqlSuccess};
use crate::synthesizer::{SynthesisInput, Synthesizer};
use crate::templates::TemplateCatalog;
use copilot_shared::{
    AgentError, BatchReport, CitationSet, ConfidencePolicy, Constraints, ErrorRecord, FinalAnswer,
    Question, QuestionOutcome, RetrievedPassage, Route, SqlAttempt, TraceRecorder, TraceStep,
};
use tracing::{info, warn};

/// External collaborators, borrowed for the agent's lifetime
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub retriever: &'a dyn Retriever,
    pub schema: &'a dyn SchemaInspector,
    pub executor: &'a dyn SqlExecutor,
    pub generator: &'a dyn TextGenerator,
}

/// Per-question state. Each stage writes only its own fields.
struct RunState {
    route: Route,
    /// Retrieve stage
    passages: Vec<RetrievedPassage>,
    retrieval_ran: bool,
    /// Plan stage
    constraints: Option<Constraints>,
    /// SQL stage
    sql: Option<SqlSuccess>,
    attempts: Vec<SqlAttempt>,
    /// Schema table names seen by the SQL stage, for citations
    table_names: Vec<String>,
    warnings: Vec<AgentError>,
    trace: TraceRecorder,
}

impl RunState {
    fn new(route: Route, trace: TraceRecorder) -> Self {
        Self {
            route,
            passages: Vec::new(),
            retrieval_ran: false,
            constraints: None,
            sql: None,
            attempts: Vec::new(),
            table_names: Vec::new(),
            warnings: Vec::new(),
            trace,
        }
    }

    /// Record a non-fatal condition and keep going
    fn warn(&mut self, error: AgentError) {
        warn!("{}", error);
        self.trace
            .record(TraceStep::Warning, &error.kind().to_string(), &error.to_string());
        self.warnings.push(error);
    }
}

pub struct Agent<'a> {
    router: Router,
    adapter: RetrieverAdapter,
    planner: Planner,
    catalog: TemplateCatalog,
    max_attempts: u8,
    policy: ConfidencePolicy,
    deps: Collaborators<'a>,
}

impl<'a> Agent<'a> {
    pub fn new(config: &Config, deps: Collaborators<'a>) -> Self {
        Self {
            router: Router::new(&config.router),
            adapter: RetrieverAdapter::new(config.retrieval.top_k),
            planner: Planner::new(&config.planner),
            catalog: TemplateCatalog::new(),
            max_attempts: config.sql.max_attempts,
            policy: config.confidence,
            deps,
        }
    }

    /// Process one question. Never fails: problems end up in the outcome.
    pub fn run(&self, question: &Question) -> QuestionOutcome {
        let mut trace = TraceRecorder::new(&question.id);

        let decision = self.router.classify(&question.text);
        trace.record(
            TraceStep::Route,
            &question.text,
            &format!("{}: {}", decision.route, decision.rationale),
        );
        let mut state = RunState::new(decision.route, trace);
        if decision.ambiguous {
            state.warn(AgentError::RoutingAmbiguous);
        }

        match decision.route {
            Route::Rag => {
                self.retrieve(question, &mut state);
                self.plan(question, &mut state);
            }
            Route::Sql => {
                self.run_sql(question, &mut state);
            }
            Route::Hybrid => {
                self.retrieve(question, &mut state);
                self.plan(question, &mut state);
                self.run_sql(question, &mut state);
            }
        }

        let result = self.synthesize(question, &mut state);
        let outcome = finalize(question, state, result);
        info!(
            "Question {}: route={} success={} attempts={}",
            outcome.id,
            outcome.route,
            outcome.success,
            outcome.sql_attempts.len()
        );
        outcome
    }

    /// Run every question in order. A failed question never stops the batch.
    pub fn run_batch(&self, questions: &[Question]) -> BatchReport {
        self.run_batch_with(questions, |_| {})
    }

    /// `run_batch` with a callback after each question (progress display)
    pub fn run_batch_with<F>(&self, questions: &[Question], mut on_outcome: F) -> BatchReport
    where
        F: FnMut(&QuestionOutcome),
    {
        let mut report = BatchReport::new();
        for question in questions {
            let outcome = self.run(question);
            on_outcome(&outcome);
            report.push(outcome);
        }
        report.finish();
        info!(
            "Batch finished: {} succeeded, {} failed",
            report.succeeded, report.failed
        );
        report
    }

    fn retrieve(&self, question: &Question, state: &mut RunState) {
        let retrieval = self.adapter.retrieve(self.deps.retriever, &question.text);
        state.retrieval_ran = true;
        let chunk_ids: Vec<&str> = retrieval.passages.iter().map(|p| p.chunk_id.as_str()).collect();
        state.trace.record(
            TraceStep::Retrieve,
            &format!("top_k={}", self.adapter.top_k()),
            &format!("{} passages [{}]", chunk_ids.len(), chunk_ids.join(", ")),
        );
        state.passages = retrieval.passages;
        if let Some(warning) = retrieval.warning {
            state.warn(warning);
        }
    }

    fn plan(&self, question: &Question, state: &mut RunState) {
        let constraints = self.planner.extract(&question.text, &state.passages);
        state
            .trace
            .record(TraceStep::Plan, &question.text, &constraints.summary());
        state.constraints = Some(constraints);
    }

    fn run_sql(&self, question: &Question, state: &mut RunState) {
        let tables = match self.deps.schema.tables() {
            Ok(tables) => tables,
            Err(e) => {
                state.warn(AgentError::Schema(e.to_string()));
                Vec::new()
            }
        };
        let schema = tables
            .iter()
            .map(TableSchema::render)
            .collect::<Vec<_>>()
            .join("\n\n");
        state.table_names = tables.into_iter().map(|t| t.name).collect();

        let unconstrained = Constraints::default();
        let request = SqlRequest {
            question: &question.text,
            schema: &schema,
            constraints: state.constraints.as_ref().unwrap_or(&unconstrained),
        };
        let stage = SqlStage::new(
            self.deps.generator,
            self.deps.executor,
            &self.catalog,
            self.max_attempts,
        );
        let output = stage.run(&request, &mut state.trace);

        state.attempts = output.attempts;
        match output.result {
            Ok(success) => state.sql = Some(success),
            Err(e) => state.warn(e),
        }
    }

    fn synthesize(&self, question: &Question, state: &mut RunState) -> Result<FinalAnswer, AgentError> {
        let synthesizer = Synthesizer::new(self.policy, state.table_names.clone());
        let result = synthesizer.synthesize(&SynthesisInput {
            question,
            route: state.route,
            passages: &state.passages,
            retrieval_ran: state.retrieval_ran,
            constraints: state.constraints.as_ref(),
            sql: state.sql.as_ref(),
            attempts: &state.attempts,
        });
        let summary = match &result {
            Ok(answer) => format!("{} (confidence {:.2})", answer.display_value(), answer.confidence),
            Err(e) => e.to_string(),
        };
        state
            .trace
            .record(TraceStep::Synthesize, &question.format_hint.to_string(), &summary);
        result
    }
}

/// Seal the trace and build the output record
fn finalize(
    question: &Question,
    mut state: RunState,
    result: Result<FinalAnswer, AgentError>,
) -> QuestionOutcome {
    let success = result.is_ok();
    state.trace.record(
        TraceStep::Finalize,
        &question.id,
        if success { "answered" } else { "unresolved" },
    );
    let trace = state.trace.seal();
    let warnings: Vec<ErrorRecord> = state.warnings.iter().map(ErrorRecord::from).collect();
    let sql = state.sql.map(|s| s.sql);

    match result {
        Ok(answer) => QuestionOutcome {
            id: question.id.clone(),
            success: true,
            route: state.route,
            final_answer: Some(answer.value),
            citations: answer.citations,
            confidence: answer.confidence,
            explanation: answer.explanation,
            sql,
            sql_attempts: state.attempts,
            constraints: state.constraints,
            error: None,
            warnings,
            trace,
        },
        Err(e) => QuestionOutcome {
            id: question.id.clone(),
            success: false,
            route: state.route,
            final_answer: None,
            citations: CitationSet::new(),
            confidence: 0.0,
            explanation: e.to_string(),
            sql,
            sql_attempts: state.attempts,
            constraints: state.constraints,
            error: Some(ErrorRecord::from(&e)),
            warnings,
            trace,
        },
    }
}
