//! Per-system execution timing.
//!
//! The [`PerformanceMonitor`] keeps one [`SystemMetrics`] per registered tick
//! system: last/max execution time, an error counter, and a fixed-size ring
//! buffer of recent samples for a rolling average. Thresholds are advisory;
//! the scheduler logs against them and never halts a system.

use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

/// Severity of a single execution time measured against the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PerfLevel {
    Normal,
    Warning,
    Critical,
}

/// Timing statistics for one system.
#[derive(Debug, Clone, Serialize)]
pub struct SystemMetrics {
    pub name: String,
    pub last_execution_time: Duration,
    pub average_time: Duration,
    pub max_time: Duration,
    pub total_executions: u64,
    pub errors: u64,
    /// Ring buffer of recent samples.
    #[serde(skip)]
    recent_times: Vec<Duration>,
    #[serde(skip)]
    recent_index: usize,
    #[serde(skip)]
    window_filled: bool,
}

impl SystemMetrics {
    fn new(name: &str, window: usize) -> Self {
        Self {
            name: name.to_string(),
            last_execution_time: Duration::ZERO,
            average_time: Duration::ZERO,
            max_time: Duration::ZERO,
            total_executions: 0,
            errors: 0,
            recent_times: vec![Duration::ZERO; window.max(1)],
            recent_index: 0,
            window_filled: false,
        }
    }

    fn record(&mut self, elapsed: Duration) {
        self.last_execution_time = elapsed;
        self.total_executions += 1;
        self.max_time = self.max_time.max(elapsed);

        let window = self.recent_times.len();
        self.recent_times[self.recent_index] = elapsed;
        self.recent_index = (self.recent_index + 1) % window;
        if !self.window_filled && self.recent_index == 0 {
            self.window_filled = true;
        }

        self.recalculate_average();
    }

    fn recalculate_average(&mut self) {
        let limit = if self.window_filled {
            self.recent_times.len()
        } else {
            self.recent_index
        };
        if limit == 0 {
            return;
        }
        let total: Duration = self.recent_times[..limit].iter().sum();
        self.average_time = total / limit as u32;
    }

    /// Number of samples currently contributing to the average.
    pub fn window_len(&self) -> usize {
        if self.window_filled {
            self.recent_times.len()
        } else {
            self.recent_index
        }
    }
}

/// Tracks execution time of every registered system.
#[derive(Debug)]
pub struct PerformanceMonitor {
    metrics: HashMap<String, SystemMetrics>,
    /// Number of recent samples kept per system.
    window: usize,
    warning_threshold: Duration,
    critical_threshold: Duration,
}

impl PerformanceMonitor {
    /// The critical threshold is always twice the warning threshold.
    pub fn new(window: usize, warning_threshold: Duration) -> Self {
        Self {
            metrics: HashMap::new(),
            window: window.max(1),
            warning_threshold,
            critical_threshold: warning_threshold * 2,
        }
    }

    /// Create the metrics entry for a system. Re-registering a name keeps
    /// the existing statistics.
    pub fn register(&mut self, name: &str) {
        let window = self.window;
        self.metrics
            .entry(name.to_string())
            .or_insert_with(|| SystemMetrics::new(name, window));
    }

    /// Record one execution. Unknown names are ignored.
    pub fn record_execution(&mut self, name: &str, elapsed: Duration) {
        if let Some(metrics) = self.metrics.get_mut(name) {
            metrics.record(elapsed);
        }
    }

    /// Count a failure. Timing statistics are untouched.
    pub fn record_error(&mut self, name: &str) {
        if let Some(metrics) = self.metrics.get_mut(name) {
            metrics.errors += 1;
        }
    }

    pub fn classify(&self, elapsed: Duration) -> PerfLevel {
        if elapsed > self.critical_threshold {
            PerfLevel::Critical
        } else if elapsed > self.warning_threshold {
            PerfLevel::Warning
        } else {
            PerfLevel::Normal
        }
    }

    pub fn warning_threshold(&self) -> Duration {
        self.warning_threshold
    }

    pub fn critical_threshold(&self) -> Duration {
        self.critical_threshold
    }

    pub fn metrics(&self, name: &str) -> Option<&SystemMetrics> {
        self.metrics.get(name)
    }

    /// Copy of every system's metrics, sorted by name.
    pub fn snapshot(&self) -> Vec<SystemMetrics> {
        let mut all: Vec<SystemMetrics> = self.metrics.values().cloned().collect();
        all.sort_by(|a, b| a.name.cmp(&b.name));
        all
    }

    pub fn len(&self) -> usize {
        self.metrics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.metrics.is_empty()
    }
}
