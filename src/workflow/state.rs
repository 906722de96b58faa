use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;
use super::WorkflowStep;
use crate::error::WorkflowError;

/// Lifecycle phases of a workflow run.
///
/// CREATED → REVIEWING → SCORING → DEBUGGING → FIXING → TESTING → COMPLETE | FAILED,
/// with the loop edges listed in [`Phase::can_transition_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Created,
    Reviewing,
    Scoring,
    Debugging,
    Fixing,
    Testing,
    Complete,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Created => write!(f, "CREATED"),
            Phase::Reviewing => write!(f, "REVIEWING"),
            Phase::Scoring => write!(f, "SCORING"),
            Phase::Debugging => write!(f, "DEBUGGING"),
            Phase::Fixing => write!(f, "FIXING"),
            Phase::Testing => write!(f, "TESTING"),
            Phase::Complete => write!(f, "COMPLETE"),
            Phase::Failed => write!(f, "FAILED"),
        }
    }
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::Complete | Phase::Failed)
    }

    /// Whether `self -> next` is a legal edge. Any live phase may fail.
    pub fn can_transition_to(self, next: Phase) -> bool {
        use Phase::*;
        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }
        match self {
            Created => matches!(next, Reviewing | Testing | Complete),
            Reviewing => matches!(next, Scoring | Debugging | Complete),
            Scoring => matches!(next, Reviewing | Debugging | Complete),
            Debugging => matches!(next, Fixing | Complete),
            Fixing => matches!(next, Reviewing | Testing | Complete),
            Testing => matches!(next, Debugging | Complete),
            Complete | Failed => false,
        }
    }
}

/// How a workflow's tasks are meant to be scheduled.
///
/// `Parallel` is recorded on the workflow but runs like `Sequential`; no
/// strategy executes tasks concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStrategy {
    Sequential,
    Parallel,
    Loop,
}

impl fmt::Display for WorkflowStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowStrategy::Sequential => write!(f, "sequential"),
            WorkflowStrategy::Parallel => write!(f, "parallel"),
            WorkflowStrategy::Loop => write!(f, "loop"),
        }
    }
}

/// A unit of orchestrated work: ordered tasks, the steps they produced and
/// the phase the run is in.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub strategy: WorkflowStrategy,
    tasks: Vec<Task>,
    cursor: usize,
    is_complete: bool,
    steps: Vec<WorkflowStep>,
    phase: Phase,
    phase_history: Vec<Phase>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    pub fn new(id: Option<String>, strategy: WorkflowStrategy, tasks: Vec<Task>) -> Self {
        let now = Utc::now();
        Self {
            id: id.unwrap_or_else(|| format!("wf_{}", Uuid::new_v4().simple())),
            strategy,
            tasks,
            cursor: 0,
            is_complete: false,
            steps: Vec::new(),
            phase: Phase::Created,
            phase_history: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn steps(&self) -> &[WorkflowStep] {
        &self.steps
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Phases left so far, oldest first. The current phase is not included.
    pub fn phase_history(&self) -> &[Phase] {
        &self.phase_history
    }

    fn ensure_open(&self) -> Result<(), WorkflowError> {
        if self.is_complete {
            return Err(WorkflowError::AlreadyComplete(self.id.clone()));
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Moves to `next`. Entering a terminal phase marks the workflow complete.
    pub fn transition(&mut self, next: Phase) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if !self.phase.can_transition_to(next) {
            return Err(WorkflowError::InvalidTransition {
                from: self.phase,
                to: next,
            });
        }
        self.phase_history.push(self.phase);
        self.phase = next;
        if next.is_terminal() {
            self.is_complete = true;
        }
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), WorkflowError> {
        self.transition(Phase::Complete)
    }

    pub fn fail(&mut self) -> Result<(), WorkflowError> {
        self.transition(Phase::Failed)
    }

    /// Appends a task and returns its index.
    pub fn push_task(&mut self, task: Task) -> Result<usize, WorkflowError> {
        self.ensure_open()?;
        self.tasks.push(task);
        self.touch();
        Ok(self.tasks.len() - 1)
    }

    pub fn push_step(&mut self, step: WorkflowStep) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        self.steps.push(step);
        self.touch();
        Ok(())
    }

    /// The task under the cursor, if any remain.
    pub fn current_task(&self) -> Option<&Task> {
        self.tasks.get(self.cursor)
    }

    /// Moves the cursor past the current task. Never moves backwards and
    /// never past the end of the task list.
    pub fn advance(&mut self) -> Result<(), WorkflowError> {
        self.ensure_open()?;
        if self.cursor < self.tasks.len() {
            self.cursor += 1;
            self.touch();
        }
        Ok(())
    }

    pub fn task(&self, task_id: &str) -> Result<&Task, WorkflowError> {
        self.tasks
            .iter()
            .find(|t| t.id == task_id)
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.to_string()))
    }

    pub fn task_mut(&mut self, task_id: &str) -> Result<&mut Task, WorkflowError> {
        self.touch();
        self.tasks
            .iter_mut()
            .find(|t| t.id == task_id)
            .ok_or_else(|| WorkflowError::TaskNotFound(task_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::task::AgentRole;
    use serde_json::Map;

    fn make_workflow() -> Workflow {
        Workflow::new(None, WorkflowStrategy::Sequential, Vec::new())
    }

    #[test]
    fn review_then_complete_walks_phases() {
        let mut wf = make_workflow();
        assert_eq!(wf.phase(), Phase::Created);
        assert!(wf.id.starts_with("wf_"));

        wf.transition(Phase::Reviewing).unwrap();
        wf.transition(Phase::Debugging).unwrap();
        wf.transition(Phase::Fixing).unwrap();
        wf.complete().unwrap();

        assert_eq!(wf.phase(), Phase::Complete);
        assert!(wf.is_complete());
        assert_eq!(
            wf.phase_history(),
            &[Phase::Created, Phase::Reviewing, Phase::Debugging, Phase::Fixing]
        );
    }

    #[test]
    fn loop_edges_are_allowed() {
        let mut wf = make_workflow();
        for next in [
            Phase::Reviewing,
            Phase::Scoring,
            Phase::Reviewing,
            Phase::Scoring,
            Phase::Debugging,
            Phase::Fixing,
            Phase::Reviewing,
        ] {
            wf.transition(next).unwrap();
        }
        assert_eq!(wf.phase(), Phase::Reviewing);
    }

    #[test]
    fn illegal_edge_is_rejected_without_state_change() {
        let mut wf = make_workflow();
        let err = wf.transition(Phase::Fixing).unwrap_err();
        assert_eq!(
            err,
            WorkflowError::InvalidTransition {
                from: Phase::Created,
                to: Phase::Fixing
            }
        );
        assert_eq!(wf.phase(), Phase::Created);
        assert!(wf.phase_history().is_empty());
    }

    #[test]
    fn any_live_phase_can_fail() {
        for phase in [Phase::Reviewing, Phase::Testing] {
            let mut wf = make_workflow();
            wf.transition(phase).unwrap();
            wf.fail().unwrap();
            assert_eq!(wf.phase(), Phase::Failed);
            assert!(wf.is_complete());
        }
    }

    #[test]
    fn completed_workflow_rejects_mutation() {
        let mut wf = make_workflow();
        wf.transition(Phase::Reviewing).unwrap();
        wf.complete().unwrap();

        let id = wf.id.clone();
        assert_eq!(
            wf.transition(Phase::Reviewing),
            Err(WorkflowError::AlreadyComplete(id.clone()))
        );
        assert_eq!(
            wf.push_task(Task::new(AgentRole::Reviewer, Map::new())),
            Err(WorkflowError::AlreadyComplete(id.clone()))
        );
        assert_eq!(wf.advance(), Err(WorkflowError::AlreadyComplete(id)));
    }

    #[test]
    fn cursor_only_moves_forward_and_stops_at_end() {
        let mut wf = make_workflow();
        let first = Task::new(AgentRole::Reviewer, Map::new());
        let first_id = first.id.clone();
        wf.push_task(first).unwrap();

        assert_eq!(wf.current_task().map(|t| t.id.as_str()), Some(first_id.as_str()));
        wf.advance().unwrap();
        wf.advance().unwrap();
        assert_eq!(wf.cursor(), 1);
        assert!(wf.current_task().is_none());
    }

    #[test]
    fn missing_task_lookup_is_typed() {
        let wf = make_workflow();
        assert_eq!(
            wf.task("nope").unwrap_err(),
            WorkflowError::TaskNotFound("nope".into())
        );
    }

    #[test]
    fn explicit_id_is_kept() {
        let wf = Workflow::new(Some("wf_custom".into()), WorkflowStrategy::Loop, Vec::new());
        assert_eq!(wf.id, "wf_custom");
        assert_eq!(wf.strategy.to_string(), "loop");
    }
}
