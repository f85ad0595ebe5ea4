//! Line counters
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-minimal

use std::sync::atomic::{AtomicU64, Ordering};

/// Row counters of a versioning run, bucketed the way ETL steps report lines.
///
/// All counters use relaxed atomics; exact values are only meaningful once the
/// run has finished.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    /// Rows read from the input
    lines_input: AtomicU64,
    /// Rows that produced a new stored version
    lines_output: AtomicU64,
    /// Rows that modified stored state
    lines_updated: AtomicU64,
    /// Versions closed by purging
    lines_rejected: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment_input(&self) {
        self.lines_input.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_output(&self) {
        self.lines_output.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_updated(&self) {
        self.lines_updated.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_rejected(&self) {
        self.lines_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Add a bulk count to the rejected bucket
    pub fn add_rejected(&self, count: u64) {
        self.lines_rejected.fetch_add(count, Ordering::Relaxed);
    }

    /// Get current counters as JSON
    pub fn to_json(&self) -> String {
        let s = self.snapshot();
        format!(
            r#"{{"lines_input":{},"lines_output":{},"lines_updated":{},"lines_rejected":{}}}"#,
            s.lines_input, s.lines_output, s.lines_updated, s.lines_rejected,
        )
    }

    /// Get all counters as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            lines_input: self.lines_input.load(Ordering::Relaxed),
            lines_output: self.lines_output.load(Ordering::Relaxed),
            lines_updated: self.lines_updated.load(Ordering::Relaxed),
            lines_rejected: self.lines_rejected.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub lines_input: u64,
    pub lines_output: u64,
    pub lines_updated: u64,
    pub lines_rejected: u64,
}
