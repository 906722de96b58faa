//! Typed errors for the crate's subsystems.
//!
//! - `AgentError`: a reviewer/debugger call failed (provider or malformed output)
//! - `WorkflowError`: an illegal mutation of a `Workflow`
//! - `RevloopError`: everything that crosses a storage, session or config boundary

use thiserror::Error;

use crate::provider::ProviderError;
use crate::workflow::Phase;

#[derive(Debug, Error)]
pub enum RevloopError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid session id: {0:?}")]
    Session(String),
}

pub type Result<T> = std::result::Result<T, RevloopError>;

/// Failure of a single agent invocation.
#[derive(Debug, Error)]
pub enum AgentError {
    /// The provider kept failing after the retry budget was spent.
    #[error("provider call failed: {0}")]
    Provider(#[from] ProviderError),

    /// The provider answered, but not with the structured result we asked for.
    /// Never retried.
    #[error("malformed agent output: {0}")]
    MalformedOutput(String),
}

/// Illegal operation on a workflow record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("invalid phase transition {from} -> {to}")]
    InvalidTransition { from: Phase, to: Phase },

    #[error("workflow {0} is already complete")]
    AlreadyComplete(String),

    #[error("task {0} not found")]
    TaskNotFound(String),
}
