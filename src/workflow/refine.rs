use std::time::Instant;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{Phase, Workflow, WorkflowEngine, WorkflowStrategy};
use crate::agents::{DebugRequest, ReviewReport, first_high_priority};
use crate::error::{Result, RevloopError};
use crate::quality;

/// Budget and target for [`WorkflowEngine::run_loop`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LoopOptions {
    pub max_iterations: usize,
    pub quality_threshold: f64,
}

impl Default for LoopOptions {
    fn default() -> Self {
        Self {
            max_iterations: 3,
            quality_threshold: 0.8,
        }
    }
}

/// How an iteration of the refinement loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStatus {
    /// Quality reached the threshold; the loop stops.
    ThresholdMet,
    /// A fix was adopted; the loop continues with the new code.
    Improved,
    /// The debugger failed or returned no usable change; the loop stops.
    NoImprovement,
    /// Below threshold with nothing critical or high to fix; the loop
    /// reviews the same code again.
    BelowThreshold,
}

impl IterationStatus {
    fn stops(self) -> bool {
        matches!(self, IterationStatus::ThresholdMet | IterationStatus::NoImprovement)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationRecord {
    /// 1-based.
    pub iteration: usize,
    pub quality_score: f64,
    pub num_issues: usize,
    pub status: IterationStatus,
    pub review: ReviewReport,
    pub fixed_code: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopReport {
    pub workflow_id: String,
    pub iterations: Vec<IterationRecord>,
    pub final_code: String,
    pub initial_quality: f64,
    pub final_quality: f64,
    pub num_iterations: usize,
    pub execution_time_seconds: f64,
    pub success: bool,
    pub error: Option<String>,
    pub workflow: Workflow,
}

struct LoopRun {
    code: String,
    iterations: Vec<IterationRecord>,
}

impl WorkflowEngine {
    /// Review, score and fix `code` until it meets the quality threshold,
    /// stops improving, or the iteration budget runs out.
    ///
    /// A reviewer failure ends the run with `success = false` and keeps the
    /// iterations recorded so far.
    pub async fn run_loop(
        &self,
        code: &str,
        options: LoopOptions,
        language: Option<&str>,
        session_id: Option<&str>,
    ) -> LoopReport {
        let started = Instant::now();
        let mut workflow = self.create_workflow(WorkflowStrategy::Loop, Vec::new(), None);
        let root = self.tracer.start_span(
            "loop_workflow",
            json!({
                "workflow_id": workflow.id,
                "max_iterations": options.max_iterations,
                "quality_threshold": options.quality_threshold,
            }),
        );

        let mut run = LoopRun {
            code: code.to_string(),
            iterations: Vec::new(),
        };
        let outcome = match self.loop_iterations(&mut workflow, &mut run, options, language, &root).await {
            Ok(()) => workflow.complete().map_err(Into::into),
            Err(err) => Err(err),
        };
        let error = outcome.err().map(|err| {
            warn!(workflow_id = %workflow.id, %err, "loop workflow failed");
            self.metrics.increment("workflow_errors", 1);
            self.mark_failed(&mut workflow);
            err.to_string()
        });

        self.tracer.end_span(&root);
        let elapsed = started.elapsed();
        let num_iterations = run.iterations.len();
        self.metrics.record_timing("loop_workflow_duration", elapsed);
        self.metrics.record_value("loop_workflow_iterations", num_iterations as f64);

        let initial_quality = run.iterations.first().map_or(0.0, |it| it.quality_score);
        let final_quality = run.iterations.last().map_or(0.0, |it| it.quality_score);
        info!(
            workflow_id = %workflow.id,
            iterations = num_iterations,
            initial_quality,
            final_quality,
            "loop workflow finished"
        );

        let report = LoopReport {
            workflow_id: workflow.id.clone(),
            iterations: run.iterations,
            final_code: run.code,
            initial_quality,
            final_quality,
            num_iterations,
            execution_time_seconds: elapsed.as_secs_f64(),
            success: error.is_none(),
            error,
            workflow,
        };
        self.record_session(session_id, "loop", &report).await;
        report
    }

    async fn loop_iterations(
        &self,
        workflow: &mut Workflow,
        run: &mut LoopRun,
        options: LoopOptions,
        language: Option<&str>,
        root: &str,
    ) -> Result<()> {
        for iteration in 1..=options.max_iterations {
            self.tracer.log_event(
                "iteration_start",
                json!({"workflow_id": workflow.id, "iteration": iteration}),
            );

            workflow.transition(Phase::Reviewing)?;
            let review = self.review_step(workflow, &run.code, language, root).await?;

            workflow.transition(Phase::Scoring)?;
            let quality_score = quality::score(&review.findings, run.code.chars().count());
            let num_issues = review.findings.len();
            debug!(iteration, quality_score, num_issues, "iteration scored");

            let mut fixed_code = None;
            let status = if quality_score >= options.quality_threshold {
                IterationStatus::ThresholdMet
            } else if let Some(target) = first_high_priority(&review.findings) {
                workflow.transition(Phase::Debugging)?;
                let request = DebugRequest::new(run.code.as_str())
                    .with_error(target.description.clone())
                    .with_language(language);
                match self.debug_step(workflow, &request, root).await {
                    Ok(report) => match report.fix() {
                        Some(fix) if fix != run.code => {
                            workflow.transition(Phase::Fixing)?;
                            self.fix_step(workflow, fix, &run.code)?;
                            fixed_code = Some(fix.to_string());
                            IterationStatus::Improved
                        }
                        _ => IterationStatus::NoImprovement,
                    },
                    Err(RevloopError::Agent(err)) => {
                        warn!(iteration, %err, "debugger failed, stopping refinement");
                        IterationStatus::NoImprovement
                    }
                    Err(err) => return Err(err),
                }
            } else {
                warn!(
                    iteration,
                    quality_score,
                    threshold = options.quality_threshold,
                    "below threshold with no critical or high findings, reviewing again"
                );
                IterationStatus::BelowThreshold
            };

            if let Some(fix) = &fixed_code {
                run.code = fix.clone();
            }
            run.iterations.push(IterationRecord {
                iteration,
                quality_score,
                num_issues,
                status,
                review,
                fixed_code,
            });
            self.metrics.increment("loop_iterations_completed", 1);

            if status.stops() {
                break;
            }
        }
        Ok(())
    }
}
