use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Which agent a task is dispatched to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentRole {
    Reviewer,
    Debugger,
    Fixer,
}

impl AgentRole {
    /// Name recorded on the workflow step this role produces.
    pub fn step_name(self) -> &'static str {
        match self {
            AgentRole::Reviewer => "CodeReviewer",
            AgentRole::Debugger => "Debugger",
            AgentRole::Fixer => "AutoFixer",
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgentRole::Reviewer => write!(f, "reviewer"),
            AgentRole::Debugger => write!(f, "debugger"),
            AgentRole::Fixer => write!(f, "fixer"),
        }
    }
}

/// Execution state of a task. A task holds a result or an error, never both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded(Value),
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub role: AgentRole,
    pub input: Map<String, Value>,
    pub context: Option<Map<String, Value>>,
    pub state: TaskState,
    /// Stays 0 for engine tasks: provider retries happen inside one
    /// agent call and are not replayed at task level.
    pub retry_count: u32,
    pub max_retries: u32,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(role: AgentRole, input: Map<String, Value>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            input,
            context: None,
            state: TaskState::Pending,
            retry_count: 0,
            max_retries: 3,
            started_at: None,
            completed_at: None,
        }
    }

    pub fn with_context(mut self, context: Map<String, Value>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn start(&mut self) {
        self.state = TaskState::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn succeed(&mut self, result: Value) {
        self.state = TaskState::Succeeded(result);
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: impl Into<String>) {
        self.state = TaskState::Failed(error.into());
        self.completed_at = Some(Utc::now());
    }

    pub fn result(&self) -> Option<&Value> {
        match &self.state {
            TaskState::Succeeded(value) => Some(value),
            _ => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match &self.state {
            TaskState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.state, TaskState::Succeeded(_) | TaskState::Failed(_))
    }
}
