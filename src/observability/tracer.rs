//! Span-based in-memory trace log.
//!
//! The [`Tracer`] records named, timed spans (optionally nested through a
//! `parent` attribute) and a flat chronological event log. Everything stays
//! in memory until [`Tracer::reset`]; [`Tracer::export_traces`] writes a
//! JSON snapshot without clearing anything.
//!
//! A tracer is shared behind an `Arc` by every engine that reports into it,
//! so all methods take `&self`.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use tracing::debug;

use crate::error::Result;

/// Free-form span/event attributes.
pub type Attributes = Map<String, Value>;

/// A timestamped event attached to a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEvent {
    pub name: String,
    pub timestamp: DateTime<Utc>,
    pub attributes: Attributes,
}

/// A named, timed unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceSpan {
    pub span_id: String,
    pub name: String,
    pub start_time: DateTime<Utc>,
    /// `None` while the span is in progress. Never earlier than `start_time`.
    pub end_time: Option<DateTime<Utc>>,
    pub attributes: Attributes,
    pub parent_span_id: Option<String>,
    pub events: Vec<SpanEvent>,
}

impl TraceSpan {
    pub fn is_finished(&self) -> bool {
        self.end_time.is_some()
    }

    pub fn duration_ms(&self) -> Option<f64> {
        self.end_time.map(|end| {
            let elapsed = end - self.start_time;
            elapsed
                .num_microseconds()
                .map(|us| us as f64 / 1000.0)
                .unwrap_or_else(|| elapsed.num_milliseconds() as f64)
        })
    }
}

/// One entry of the flat trace log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEvent {
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: Value,
}

/// Aggregate statistics over all spans. Durations only count ended spans.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpanSummary {
    pub total_spans: usize,
    pub completed_spans: usize,
    pub in_progress_spans: usize,
    pub avg_duration_ms: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
}

#[derive(Serialize)]
struct SpanRecord<'a> {
    #[serde(flatten)]
    span: &'a TraceSpan,
    duration_ms: Option<f64>,
}

#[derive(Serialize)]
struct TraceExport<'a> {
    spans: Vec<SpanRecord<'a>>,
    events: &'a [TraceEvent],
    summary: SpanSummary,
}

#[derive(Default)]
struct TracerState {
    spans: Vec<TraceSpan>,
    index: HashMap<String, usize>,
    log: Vec<TraceEvent>,
}

impl TracerState {
    fn push_event(&mut self, event_type: &str, data: Value) {
        self.log.push(TraceEvent {
            timestamp: Utc::now(),
            event_type: event_type.to_string(),
            data,
        });
    }

    fn summary(&self) -> SpanSummary {
        let durations: Vec<f64> = self
            .spans
            .iter()
            .filter_map(TraceSpan::duration_ms)
            .collect();
        let total_spans = self.spans.len();
        let completed_spans = durations.len();

        let (avg, min, max) = if durations.is_empty() {
            (0.0, 0.0, 0.0)
        } else {
            let sum: f64 = durations.iter().sum();
            (
                sum / durations.len() as f64,
                durations.iter().copied().fold(f64::INFINITY, f64::min),
                durations.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };

        SpanSummary {
            total_spans,
            completed_spans,
            in_progress_spans: total_spans - completed_spans,
            avg_duration_ms: avg,
            min_duration_ms: min,
            max_duration_ms: max,
        }
    }
}

/// Records spans and trace events for any number of concurrent workflows.
pub struct Tracer {
    export_dir: PathBuf,
    next_id: AtomicU64,
    state: Mutex<TracerState>,
}

impl Default for Tracer {
    fn default() -> Self {
        Self::new(".traces")
    }
}

impl Tracer {
    pub fn new(export_dir: impl Into<PathBuf>) -> Self {
        Self {
            export_dir: export_dir.into(),
            next_id: AtomicU64::new(0),
            state: Mutex::new(TracerState::default()),
        }
    }

    pub fn export_dir(&self) -> &Path {
        &self.export_dir
    }

    fn state(&self) -> MutexGuard<'_, TracerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Opens a span and returns its id.
    ///
    /// `attributes` should be a JSON object; anything else is treated as no
    /// attributes. A `parent` key is removed from the attributes and becomes
    /// the span's `parent_span_id`.
    pub fn start_span(&self, name: &str, attributes: Value) -> String {
        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let start_time = Utc::now();
        let span_id = format!("span_{seq}_{}", start_time.timestamp_millis());

        let mut attributes = into_attributes(attributes);
        let parent_span_id = attributes.remove("parent").and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        debug!(span_id = %span_id, name, parent = ?parent_span_id, "span started");

        let mut state = self.state();
        state.push_event(
            "span_started",
            json!({
                "span_id": span_id,
                "name": name,
                "parent": parent_span_id,
            }),
        );
        let index = state.spans.len();
        state.index.insert(span_id.clone(), index);
        state.spans.push(TraceSpan {
            span_id: span_id.clone(),
            name: name.to_string(),
            start_time,
            end_time: None,
            attributes,
            parent_span_id,
            events: Vec::new(),
        });

        span_id
    }

    /// Closes a span. Unknown ids are ignored.
    pub fn end_span(&self, span_id: &str) {
        let mut state = self.state();
        let Some(&index) = state.index.get(span_id) else {
            return;
        };

        let span = &mut state.spans[index];
        span.end_time = Some(Utc::now().max(span.start_time));
        let duration_ms = span.duration_ms();
        debug!(span_id, name = %span.name, duration_ms = ?duration_ms, "span ended");

        state.push_event(
            "span_ended",
            json!({
                "span_id": span_id,
                "duration_ms": duration_ms,
            }),
        );
    }

    /// Appends a sub-event to a span. Unknown ids are ignored.
    pub fn add_span_event(&self, span_id: &str, event_name: &str, attributes: Value) {
        let mut state = self.state();
        let Some(&index) = state.index.get(span_id) else {
            return;
        };
        state.spans[index].events.push(SpanEvent {
            name: event_name.to_string(),
            timestamp: Utc::now(),
            attributes: into_attributes(attributes),
        });
    }

    /// Appends an event to the trace log, independent of any span.
    pub fn log_event(&self, event_type: &str, data: Value) {
        self.state().push_event(event_type, data);
    }

    /// Returns logged events, optionally filtered by type, keeping the last
    /// `limit` entries. A limit of zero means no limit.
    pub fn get_trace_log(&self, event_type: Option<&str>, limit: Option<usize>) -> Vec<TraceEvent> {
        let state = self.state();
        let mut events: Vec<TraceEvent> = state
            .log
            .iter()
            .filter(|e| event_type.is_none_or(|t| e.event_type == t))
            .cloned()
            .collect();

        if let Some(limit) = limit.filter(|&l| l > 0) {
            let excess = events.len().saturating_sub(limit);
            events.drain(..excess);
        }
        events
    }

    pub fn get_span_summary(&self) -> SpanSummary {
        self.state().summary()
    }

    pub fn span(&self, span_id: &str) -> Option<TraceSpan> {
        let state = self.state();
        state
            .index
            .get(span_id)
            .map(|&index| state.spans[index].clone())
    }

    /// Snapshot of all spans in creation order.
    pub fn spans(&self) -> Vec<TraceSpan> {
        self.state().spans.clone()
    }

    /// Writes spans, the full event log and the summary as JSON into the
    /// export directory and returns the file path.
    pub fn export_traces(&self, filename: Option<&str>) -> Result<PathBuf> {
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| format!("traces_{}.json", Utc::now().timestamp()));
        let path = self.export_dir.join(filename);

        let body = {
            let state = self.state();
            let export = TraceExport {
                spans: state
                    .spans
                    .iter()
                    .map(|span| SpanRecord {
                        span,
                        duration_ms: span.duration_ms(),
                    })
                    .collect(),
                events: &state.log,
                summary: state.summary(),
            };
            serde_json::to_string_pretty(&export)?
        };

        fs::create_dir_all(&self.export_dir)?;
        fs::write(&path, body)?;
        debug!(path = %path.display(), "traces exported");
        Ok(path)
    }

    /// Drops every span and event.
    pub fn reset(&self) {
        *self.state() = TracerState::default();
    }
}

fn into_attributes(value: Value) -> Attributes {
    match value {
        Value::Object(map) => map,
        _ => Attributes::new(),
    }
}
