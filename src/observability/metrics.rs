//! Counters, timing series and value series with aggregate statistics.
//!
//! Series grow until [`MetricsCollector::reset`]; nothing is evicted.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Statistics over a timing series, in seconds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// Statistics over a value series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValueStats {
    pub count: usize,
    pub sum: f64,
    pub avg: f64,
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSummary {
    pub uptime_seconds: f64,
    pub counters: BTreeMap<String, u64>,
    pub timings: BTreeMap<String, TimingStats>,
    pub values: BTreeMap<String, ValueStats>,
}

struct MetricsState {
    counters: BTreeMap<String, u64>,
    timings: BTreeMap<String, Vec<f64>>,
    values: BTreeMap<String, Vec<f64>>,
    started: Instant,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            counters: BTreeMap::new(),
            timings: BTreeMap::new(),
            values: BTreeMap::new(),
            started: Instant::now(),
        }
    }

    fn timing_stats(&self, name: &str) -> TimingStats {
        let Some(samples) = self.timings.get(name).filter(|s| !s.is_empty()) else {
            return TimingStats::default();
        };
        let mut sorted = samples.clone();
        sorted.sort_by(f64::total_cmp);
        let base = basic_stats(&sorted);

        TimingStats {
            count: base.count,
            sum: base.sum,
            avg: base.avg,
            min: base.min,
            max: base.max,
            p50: percentile(&sorted, 50),
            p95: percentile(&sorted, 95),
            p99: percentile(&sorted, 99),
        }
    }

    fn value_stats(&self, name: &str) -> ValueStats {
        self.values
            .get(name)
            .filter(|s| !s.is_empty())
            .map(|s| basic_stats(s))
            .unwrap_or_default()
    }
}

/// Thread-safe metrics store shared by concurrent workflow runs.
pub struct MetricsCollector {
    state: Mutex<MetricsState>,
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MetricsState::new()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn increment(&self, name: &str, by: u64) {
        *self.state().counters.entry(name.to_string()).or_insert(0) += by;
    }

    pub fn record_timing(&self, name: &str, duration: Duration) {
        self.state()
            .timings
            .entry(name.to_string())
            .or_default()
            .push(duration.as_secs_f64());
    }

    pub fn record_value(&self, name: &str, value: f64) {
        self.state()
            .values
            .entry(name.to_string())
            .or_default()
            .push(value);
    }

    pub fn get_counter(&self, name: &str) -> u64 {
        self.state().counters.get(name).copied().unwrap_or(0)
    }

    /// All-zero stats with `count == 0` when nothing was recorded.
    pub fn get_timing_stats(&self, name: &str) -> TimingStats {
        self.state().timing_stats(name)
    }

    pub fn get_value_stats(&self, name: &str) -> ValueStats {
        self.state().value_stats(name)
    }

    pub fn get_summary(&self) -> MetricsSummary {
        let state = self.state();
        MetricsSummary {
            uptime_seconds: state.started.elapsed().as_secs_f64(),
            counters: state.counters.clone(),
            timings: state
                .timings
                .keys()
                .map(|name| (name.clone(), state.timing_stats(name)))
                .collect(),
            values: state
                .values
                .keys()
                .map(|name| (name.clone(), state.value_stats(name)))
                .collect(),
        }
    }

    /// Clears every series and restarts the uptime clock.
    pub fn reset(&self) {
        *self.state() = MetricsState::new();
    }

    pub fn export_metrics(&self, path: &Path) -> Result<()> {
        let body = serde_json::to_string_pretty(&self.get_summary())?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, body)?;
        Ok(())
    }
}

fn basic_stats(samples: &[f64]) -> ValueStats {
    let sum: f64 = samples.iter().sum();
    ValueStats {
        count: samples.len(),
        sum,
        avg: sum / samples.len() as f64,
        min: samples.iter().copied().fold(f64::INFINITY, f64::min),
        max: samples.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

/// `sorted[floor(n * p / 100)]`, clamped to the last index.
fn percentile(sorted: &[f64], p: usize) -> f64 {
    let index = (sorted.len() * p / 100).min(sorted.len() - 1);
    sorted[index]
}
