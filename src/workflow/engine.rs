use std::sync::Arc;

use serde::Serialize;
use serde_json::{Map, Value, json};
use tracing::{debug, info, warn};

use super::{AgentRole, StepOutput, Task, Workflow, WorkflowStep, WorkflowStrategy};
use crate::agents::{DebugReport, DebugRequest, Debugger, ReviewReport, Reviewer};
use crate::error::{Result, WorkflowError};
use crate::observability::{MetricsCollector, Tracer};
use crate::session::SessionRecorder;

/// Runs workflows against a reviewer and a debugger, emitting spans and
/// metrics as it goes.
pub struct WorkflowEngine {
    pub(super) reviewer: Arc<dyn Reviewer>,
    pub(super) debugger: Arc<dyn Debugger>,
    pub(super) tracer: Arc<Tracer>,
    pub(super) metrics: Arc<MetricsCollector>,
    recorder: Option<Arc<dyn SessionRecorder>>,
    max_task_retries: u32,
}

impl WorkflowEngine {
    pub fn new(
        reviewer: Arc<dyn Reviewer>,
        debugger: Arc<dyn Debugger>,
        tracer: Arc<Tracer>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            reviewer,
            debugger,
            tracer,
            metrics,
            recorder: None,
            max_task_retries: 3,
        }
    }

    pub fn with_recorder(mut self, recorder: Arc<dyn SessionRecorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Retry limit stamped on every task the engine creates.
    pub fn with_max_task_retries(mut self, max_task_retries: u32) -> Self {
        self.max_task_retries = max_task_retries;
        self
    }

    pub fn tracer(&self) -> &Arc<Tracer> {
        &self.tracer
    }

    pub fn metrics(&self) -> &Arc<MetricsCollector> {
        &self.metrics
    }

    pub fn create_workflow(
        &self,
        strategy: WorkflowStrategy,
        tasks: Vec<Task>,
        workflow_id: Option<String>,
    ) -> Workflow {
        let workflow = Workflow::new(workflow_id, strategy, tasks);
        self.tracer.log_event(
            "workflow_created",
            json!({
                "workflow_id": workflow.id,
                "strategy": strategy,
                "num_tasks": workflow.tasks().len(),
            }),
        );
        info!(workflow_id = %workflow.id, %strategy, "workflow created");
        workflow
    }

    fn begin_task(&self, workflow: &mut Workflow, role: AgentRole, input: Value) -> Result<String> {
        let mut task = Task::new(role, object(input)).with_max_retries(self.max_task_retries);
        task.start();
        let task_id = task.id.clone();
        workflow.push_task(task)?;
        Ok(task_id)
    }

    fn finish_task(
        &self,
        workflow: &mut Workflow,
        task_id: &str,
        outcome: std::result::Result<Value, String>,
    ) -> Result<()> {
        let task = workflow.task_mut(task_id)?;
        match outcome {
            Ok(value) => task.succeed(value),
            Err(error) => task.fail(error),
        }
        workflow.advance()?;
        Ok(())
    }

    fn push_step(&self, workflow: &mut Workflow, output: StepOutput) -> std::result::Result<(), WorkflowError> {
        let step = WorkflowStep {
            step: workflow.steps().len() + 1,
            agent: output.role().step_name().to_string(),
            output,
        };
        workflow.push_step(step)
    }

    /// Runs the reviewer under a `code_review` span and records the step.
    pub(super) async fn review_step(
        &self,
        workflow: &mut Workflow,
        code: &str,
        language: Option<&str>,
        parent_span: &str,
    ) -> Result<ReviewReport> {
        let span = self.tracer.start_span(
            "code_review",
            json!({
                "parent": parent_span,
                "workflow_id": workflow.id,
                "language": language,
                "code_length": code.len(),
            }),
        );
        let task_id = self.begin_task(
            workflow,
            AgentRole::Reviewer,
            json!({"code": code, "language": language}),
        )?;

        let outcome = self.reviewer.review(code, language).await;
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                self.tracer.end_span(&span);
                self.finish_task(workflow, &task_id, Err(err.to_string()))?;
                return Err(err.into());
            }
        };

        self.tracer.add_span_event(
            &span,
            "review_completed",
            json!({"num_issues": report.findings.len()}),
        );
        self.tracer.end_span(&span);
        self.finish_task(workflow, &task_id, Ok(serde_json::to_value(&report)?))?;
        self.push_step(workflow, StepOutput::Review(report.clone()))?;
        self.metrics.increment("code_reviews_completed", 1);
        debug!(workflow_id = %workflow.id, findings = report.findings.len(), "review step done");
        Ok(report)
    }

    /// Runs the debugger under a `debug_issues` span and records the step.
    pub(super) async fn debug_step(
        &self,
        workflow: &mut Workflow,
        request: &DebugRequest,
        parent_span: &str,
    ) -> Result<DebugReport> {
        let span = self.tracer.start_span(
            "debug_issues",
            json!({
                "parent": parent_span,
                "workflow_id": workflow.id,
                "error_message": request.error_message,
            }),
        );
        let task_id = self.begin_task(workflow, AgentRole::Debugger, serde_json::to_value(request)?)?;

        let outcome = self.debugger.debug(request).await;
        self.tracer.end_span(&span);
        let report = match outcome {
            Ok(report) => report,
            Err(err) => {
                self.finish_task(workflow, &task_id, Err(err.to_string()))?;
                return Err(err.into());
            }
        };

        self.finish_task(workflow, &task_id, Ok(serde_json::to_value(&report)?))?;
        self.push_step(workflow, StepOutput::Debug(report.clone()))?;
        self.metrics.increment("debug_sessions_completed", 1);
        Ok(report)
    }

    /// Records an applied fix as an `AutoFixer` step.
    pub(super) fn fix_step(&self, workflow: &mut Workflow, fixed_code: &str, original_code: &str) -> Result<()> {
        let task_id = self.begin_task(
            workflow,
            AgentRole::Fixer,
            json!({"original_code": original_code}),
        )?;
        self.finish_task(workflow, &task_id, Ok(json!({"fixed_code": fixed_code})))?;
        self.push_step(
            workflow,
            StepOutput::Fix {
                fixed_code: fixed_code.to_string(),
                original_code: original_code.to_string(),
            },
        )?;
        self.metrics.increment("auto_fixes_applied", 1);
        Ok(())
    }

    /// Marks a workflow failed after an error, unless it already finished.
    pub(super) fn mark_failed(&self, workflow: &mut Workflow) {
        if workflow.is_complete() {
            return;
        }
        if let Err(err) = workflow.fail() {
            warn!(workflow_id = %workflow.id, %err, "could not mark workflow failed");
        }
    }

    /// Hands a finished run to the session recorder. Never fails the run.
    pub(super) async fn record_session<T: Serialize>(&self, session_id: Option<&str>, kind: &str, report: &T) {
        let (Some(recorder), Some(session_id)) = (&self.recorder, session_id) else {
            return;
        };
        let record = match serde_json::to_value(report) {
            Ok(value) => json!({"type": kind, "report": value}),
            Err(err) => {
                warn!(session_id, %err, "could not serialize session record");
                return;
            }
        };
        if let Err(err) = recorder.record(session_id, record).await {
            warn!(session_id, %err, "session recording failed");
        }
    }
}

fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
