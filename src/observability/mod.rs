//! Tracing and metrics for workflow runs.

pub mod logging;
pub mod metrics;
pub mod tracer;

pub use metrics::{MetricsCollector, MetricsSummary, TimingStats, ValueStats};
pub use tracer::{Attributes, SpanEvent, SpanSummary, TraceEvent, TraceSpan, Tracer};
