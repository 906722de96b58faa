use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Phase, Workflow, WorkflowEngine, WorkflowStrategy};
use crate::agents::{DebugReport, DebugRequest};
use crate::error::{Result, RevloopError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", content = "message", rename_all = "snake_case")]
pub enum TestVerdict {
    Pass,
    Fail(String),
}

/// Decides whether a candidate program is correct.
#[async_trait]
pub trait TestOracle: Send + Sync {
    async fn check(&self, code: &str) -> TestVerdict;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DebugOutcome {
    Passed,
    DebuggerFailed,
    /// The debugger returned no fix, or the same code again.
    Stagnated,
    BudgetExhausted,
}

impl fmt::Display for DebugOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebugOutcome::Passed => write!(f, "tests passed"),
            DebugOutcome::DebuggerFailed => write!(f, "debugger failed"),
            DebugOutcome::Stagnated => write!(f, "no fix generated or code unchanged"),
            DebugOutcome::BudgetExhausted => write!(f, "iteration budget exhausted without a passing fix"),
        }
    }
}

/// One failed test run and what the debugger made of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugAttempt {
    pub iteration: usize,
    pub error_message: String,
    pub report: Option<DebugReport>,
    pub debugger_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebugLoopReport {
    pub workflow_id: String,
    pub outcome: DebugOutcome,
    pub success: bool,
    pub error: Option<String>,
    /// Last code tested, or the passing code on success.
    pub final_code: String,
    pub iterations: usize,
    pub attempts: Vec<DebugAttempt>,
    pub execution_time_seconds: f64,
    pub workflow: Workflow,
}

struct DebugRun {
    code: String,
    iterations: usize,
    attempts: Vec<DebugAttempt>,
}

impl WorkflowEngine {
    /// Test, debug and retest `code` until the oracle passes it or at most
    /// `max_iterations` test runs have been spent.
    pub async fn run_iterative_debug(
        &self,
        code: &str,
        oracle: &dyn TestOracle,
        max_iterations: usize,
        language: Option<&str>,
        session_id: Option<&str>,
    ) -> DebugLoopReport {
        let started = Instant::now();
        let mut workflow = self.create_workflow(WorkflowStrategy::Loop, Vec::new(), None);
        let root = self.tracer.start_span(
            "iterative_debug",
            json!({
                "workflow_id": workflow.id,
                "max_iterations": max_iterations,
                "language": language,
            }),
        );

        let mut run = DebugRun {
            code: code.to_string(),
            iterations: 0,
            attempts: Vec::new(),
        };
        let (outcome, error) = match self
            .debug_iterations(&mut workflow, &mut run, oracle, max_iterations, language, &root)
            .await
        {
            Ok(DebugOutcome::Passed) => match workflow.complete() {
                Ok(()) => (DebugOutcome::Passed, None),
                Err(err) => (DebugOutcome::Passed, Some(err.to_string())),
            },
            Ok(outcome) => {
                self.mark_failed(&mut workflow);
                (outcome, Some(outcome.to_string()))
            }
            Err(err) => {
                warn!(workflow_id = %workflow.id, %err, "iterative debug aborted");
                self.metrics.increment("workflow_errors", 1);
                self.mark_failed(&mut workflow);
                (DebugOutcome::DebuggerFailed, Some(err.to_string()))
            }
        };

        self.tracer.end_span(&root);
        let elapsed = started.elapsed();
        self.metrics.record_timing("iterative_debug_duration", elapsed);
        self.metrics.record_value("iterative_debug_iterations", run.iterations as f64);
        info!(
            workflow_id = %workflow.id,
            ?outcome,
            iterations = run.iterations,
            "iterative debug finished"
        );

        let report = DebugLoopReport {
            workflow_id: workflow.id.clone(),
            outcome,
            success: error.is_none(),
            error,
            final_code: run.code,
            iterations: run.iterations,
            attempts: run.attempts,
            execution_time_seconds: elapsed.as_secs_f64(),
            workflow,
        };
        self.record_session(session_id, "iterative_debug", &report).await;
        report
    }

    async fn debug_iterations(
        &self,
        workflow: &mut Workflow,
        run: &mut DebugRun,
        oracle: &dyn TestOracle,
        max_iterations: usize,
        language: Option<&str>,
        root: &str,
    ) -> Result<DebugOutcome> {
        for iteration in 1..=max_iterations {
            run.iterations = iteration;
            workflow.transition(Phase::Testing)?;

            let error_message = match oracle.check(&run.code).await {
                TestVerdict::Pass => {
                    self.tracer
                        .add_span_event(root, "test_passed", json!({"iteration": iteration}));
                    return Ok(DebugOutcome::Passed);
                }
                TestVerdict::Fail(message) => message,
            };
            self.tracer.add_span_event(
                root,
                "test_failed",
                json!({"iteration": iteration, "error": error_message}),
            );
            debug!(iteration, error = %error_message, "test failed, debugging");

            workflow.transition(Phase::Debugging)?;
            let request = DebugRequest::new(run.code.as_str())
                .with_error(error_message.clone())
                .with_language(language);
            let result = self.debug_step(workflow, &request, root).await;
            self.metrics.increment("debug_iterations_completed", 1);

            let report = match result {
                Ok(report) => report,
                Err(RevloopError::Agent(err)) => {
                    run.attempts.push(DebugAttempt {
                        iteration,
                        error_message,
                        report: None,
                        debugger_error: Some(err.to_string()),
                    });
                    return Ok(DebugOutcome::DebuggerFailed);
                }
                Err(err) => return Err(err),
            };

            let fix = report
                .fix()
                .filter(|fix| *fix != run.code)
                .map(str::to_string);
            run.attempts.push(DebugAttempt {
                iteration,
                error_message,
                report: Some(report),
                debugger_error: None,
            });
            let Some(fix) = fix else {
                return Ok(DebugOutcome::Stagnated);
            };

            workflow.transition(Phase::Fixing)?;
            self.fix_step(workflow, &fix, &run.code)?;
            run.code = fix;
        }
        Ok(DebugOutcome::BudgetExhausted)
    }
}
