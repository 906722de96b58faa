//! revloop: a review/debug workflow engine for LLM code agents.
//!
//! A [`WorkflowEngine`](workflow::WorkflowEngine) drives a reviewer and a
//! debugger agent through sequential, refinement-loop and test-driven debug
//! runs, recording every span in a [`Tracer`](observability::Tracer) and
//! every counter in a [`MetricsCollector`](observability::MetricsCollector).

pub mod agents;
pub mod cli;
pub mod config;
pub mod error;
pub mod observability;
pub mod oracle;
pub mod provider;
pub mod quality;
pub mod retry;
pub mod session;
pub mod ui;
pub mod workflow;

pub use error::{Result, RevloopError};
