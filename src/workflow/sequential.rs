use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use super::{Phase, Workflow, WorkflowEngine, WorkflowStep, WorkflowStrategy};
use crate::agents::{DebugRequest, first_high_priority};
use crate::error::{Result, RevloopError};

/// Outcome of a single review → debug → fix pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SequentialReport {
    pub workflow_id: String,
    pub steps: Vec<WorkflowStep>,
    pub execution_time_seconds: f64,
    pub success: bool,
    pub error: Option<String>,
    pub workflow: Workflow,
}

impl SequentialReport {
    /// Code proposed by the `AutoFixer` step, if one ran.
    pub fn fixed_code(&self) -> Option<&str> {
        self.steps.iter().find_map(|step| match &step.output {
            super::StepOutput::Fix { fixed_code, .. } => Some(fixed_code.as_str()),
            _ => None,
        })
    }
}

impl WorkflowEngine {
    /// Reviews `code`, debugs the first critical/high finding and records
    /// the fix when the debugger produced one.
    ///
    /// A reviewer failure fails the run. A debugger failure leaves the
    /// failed task on the workflow and completes without a fix step.
    pub async fn run_sequential(
        &self,
        code: &str,
        language: Option<&str>,
        session_id: Option<&str>,
    ) -> SequentialReport {
        let started = Instant::now();
        let mut workflow = self.create_workflow(WorkflowStrategy::Sequential, Vec::new(), None);
        let root = self.tracer.start_span(
            "sequential_workflow",
            json!({
                "workflow_id": workflow.id,
                "language": language,
                "code_length": code.len(),
            }),
        );

        let outcome = match self.sequential_steps(&mut workflow, code, language, &root).await {
            Ok(()) => workflow.complete().map_err(Into::into),
            Err(err) => Err(err),
        };
        let error = outcome.err().map(|err| {
            warn!(workflow_id = %workflow.id, %err, "sequential workflow failed");
            self.metrics.increment("workflow_errors", 1);
            self.mark_failed(&mut workflow);
            err.to_string()
        });

        self.tracer.end_span(&root);
        let elapsed = started.elapsed();
        self.metrics.record_timing("sequential_workflow_duration", elapsed);
        info!(
            workflow_id = %workflow.id,
            steps = workflow.steps().len(),
            success = error.is_none(),
            "sequential workflow finished"
        );

        let report = SequentialReport {
            workflow_id: workflow.id.clone(),
            steps: workflow.steps().to_vec(),
            execution_time_seconds: elapsed.as_secs_f64(),
            success: error.is_none(),
            error,
            workflow,
        };
        self.record_session(session_id, "sequential", &report).await;
        report
    }

    async fn sequential_steps(
        &self,
        workflow: &mut Workflow,
        code: &str,
        language: Option<&str>,
        root: &str,
    ) -> Result<()> {
        workflow.transition(Phase::Reviewing)?;
        let review = self.review_step(workflow, code, language, root).await?;

        let Some(target) = first_high_priority(&review.findings) else {
            return Ok(());
        };

        workflow.transition(Phase::Debugging)?;
        let request = DebugRequest::new(code)
            .with_error(target.description.clone())
            .with_language(language);
        let debug = match self.debug_step(workflow, &request, root).await {
            Ok(debug) => debug,
            Err(RevloopError::Agent(err)) => {
                warn!(workflow_id = %workflow.id, %err, "debugger failed, finishing without a fix");
                return Ok(());
            }
            Err(err) => return Err(err),
        };

        if let Some(fixed) = debug.fix() {
            workflow.transition(Phase::Fixing)?;
            self.fix_step(workflow, fixed, code)?;
        }
        Ok(())
    }
}
