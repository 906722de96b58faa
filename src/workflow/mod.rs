//! Workflow records and the engine that runs them.
//!
//! A [`Workflow`] is a phase state machine with ordered tasks and the steps
//! they produced. [`WorkflowEngine`] drives it through one of three runs:
//! a single review/debug/fix pass ([`WorkflowEngine::run_sequential`]), a
//! review-score-fix refinement loop ([`WorkflowEngine::run_loop`]) and a
//! test-driven debug loop ([`WorkflowEngine::run_iterative_debug`]).

mod engine;
mod iterative;
mod refine;
mod sequential;
mod state;
mod task;

use serde::{Deserialize, Serialize};

use crate::agents::{DebugReport, ReviewReport};

pub use engine::WorkflowEngine;
pub use iterative::{DebugAttempt, DebugLoopReport, DebugOutcome, TestOracle, TestVerdict};
pub use refine::{IterationRecord, IterationStatus, LoopOptions, LoopReport};
pub use sequential::SequentialReport;
pub use state::{Phase, Workflow, WorkflowStrategy};
pub use task::{AgentRole, Task, TaskState};

/// One agent result recorded on a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowStep {
    /// 1-based position within the workflow.
    pub step: usize,
    pub agent: String,
    pub output: StepOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepOutput {
    Review(ReviewReport),
    Debug(DebugReport),
    Fix {
        fixed_code: String,
        original_code: String,
    },
}

impl StepOutput {
    pub fn role(&self) -> AgentRole {
        match self {
            StepOutput::Review(_) => AgentRole::Reviewer,
            StepOutput::Debug(_) => AgentRole::Debugger,
            StepOutput::Fix { .. } => AgentRole::Fixer,
        }
    }
}
