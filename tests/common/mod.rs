#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use revloop::agents::{DebugReport, DebugRequest, Debugger, Finding, ReviewReport, Reviewer, Severity};
use revloop::error::AgentError;
use revloop::observability::{MetricsCollector, Tracer};
use revloop::workflow::WorkflowEngine;

/// Replays queued review results; an empty queue yields a clean review.
#[derive(Default)]
pub struct ScriptedReviewer {
    replies: Mutex<VecDeque<Result<ReviewReport, String>>>,
    calls: AtomicUsize,
}

impl ScriptedReviewer {
    pub fn new(replies: Vec<Result<ReviewReport, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Reviewer for ScriptedReviewer {
    async fn review(&self, _code: &str, _language: Option<&str>) -> Result<ReviewReport, AgentError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(AgentError::MalformedOutput(message)),
            None => Ok(ReviewReport::default()),
        }
    }
}

type DebugFn = dyn Fn(&DebugRequest) -> Result<DebugReport, AgentError> + Send + Sync;

pub struct FnDebugger {
    f: Box<DebugFn>,
    requests: Mutex<Vec<DebugRequest>>,
}

impl FnDebugger {
    pub fn new(f: impl Fn(&DebugRequest) -> Result<DebugReport, AgentError> + Send + Sync + 'static) -> Self {
        Self {
            f: Box::new(f),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Appends `// fixed` to the code it is given.
    pub fn token_flipping() -> Self {
        Self::new(|req| Ok(DebugReport::with_fix("flipped", format!("{}\n// fixed", req.code))))
    }

    /// Returns the code unchanged.
    pub fn echoing() -> Self {
        Self::new(|req| Ok(DebugReport::with_fix("nothing to do", req.code.clone())))
    }

    pub fn failing() -> Self {
        Self::new(|_| Err(AgentError::MalformedOutput("debugger exploded".into())))
    }

    pub fn requests(&self) -> Vec<DebugRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Debugger for FnDebugger {
    async fn debug(&self, request: &DebugRequest) -> Result<DebugReport, AgentError> {
        self.requests.lock().unwrap().push(request.clone());
        (self.f)(request)
    }
}

pub fn review(findings: Vec<Finding>) -> Result<ReviewReport, String> {
    Ok(ReviewReport::with_findings(findings))
}

pub fn critical(description: &str) -> Finding {
    Finding::new(Severity::Critical, description)
}

pub struct Harness {
    pub engine: WorkflowEngine,
    pub reviewer: Arc<ScriptedReviewer>,
    pub debugger: Arc<FnDebugger>,
    pub tracer: Arc<Tracer>,
    pub metrics: Arc<MetricsCollector>,
}

pub fn harness(reviewer: ScriptedReviewer, debugger: FnDebugger) -> Harness {
    let reviewer = Arc::new(reviewer);
    let debugger = Arc::new(debugger);
    let tracer = Arc::new(Tracer::default());
    let metrics = Arc::new(MetricsCollector::new());
    let engine = WorkflowEngine::new(reviewer.clone(), debugger.clone(), tracer.clone(), metrics.clone());
    Harness {
        engine,
        reviewer,
        debugger,
        tracer,
        metrics,
    }
}
