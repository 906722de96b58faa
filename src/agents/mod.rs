//! Reviewer and debugger agents.
//!
//! The workflow engine only depends on the [`Reviewer`] and [`Debugger`]
//! traits and the structured reports they return. [`LlmReviewer`] and
//! [`LlmDebugger`] implement them on top of a
//! [`CompletionProvider`](crate::provider::CompletionProvider).

pub mod debugger;
pub mod findings;
pub mod parse;
pub mod reviewer;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AgentError;

pub use debugger::LlmDebugger;
pub use findings::{Finding, Severity, first_high_priority};
pub use reviewer::LlmReviewer;

/// Structured result of a code review.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewReport {
    #[serde(default)]
    pub summary: String,
    #[serde(default, rename = "issues")]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub strengths: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl ReviewReport {
    pub fn with_findings(findings: Vec<Finding>) -> Self {
        Self {
            findings,
            ..Self::default()
        }
    }

    pub fn high_priority(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_high_priority())
    }
}

/// What the debugger is asked to look at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugRequest {
    pub code: String,
    pub error_message: Option<String>,
    pub language: Option<String>,
}

impl DebugRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            error_message: None,
            language: None,
        }
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn with_language(mut self, language: Option<&str>) -> Self {
        self.language = language.map(str::to_string);
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BugLocation {
    #[serde(default)]
    pub line: Option<u32>,
    #[serde(default)]
    pub function: Option<String>,
}

/// Structured result of a debugging session.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    #[serde(default)]
    pub root_cause: String,
    #[serde(default)]
    pub bug_location: Option<BugLocation>,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub fixed_code: Option<String>,
    #[serde(default)]
    pub fix_explanation: String,
    #[serde(default)]
    pub prevention: Vec<String>,
    #[serde(default)]
    pub tests: Vec<String>,
}

impl DebugReport {
    pub fn with_fix(root_cause: impl Into<String>, fixed_code: impl Into<String>) -> Self {
        Self {
            root_cause: root_cause.into(),
            fixed_code: Some(fixed_code.into()),
            ..Self::default()
        }
    }

    /// The proposed code, if the debugger produced a non-blank one.
    pub fn fix(&self) -> Option<&str> {
        self.fixed_code
            .as_deref()
            .filter(|code| !code.trim().is_empty())
    }
}

#[async_trait]
pub trait Reviewer: Send + Sync {
    async fn review(&self, code: &str, language: Option<&str>) -> Result<ReviewReport, AgentError>;
}

#[async_trait]
pub trait Debugger: Send + Sync {
    async fn debug(&self, request: &DebugRequest) -> Result<DebugReport, AgentError>;
}
