//! Line statistics
//!
//! | status            | input | output | updated | rejected |
//! |-------------------|-------|--------|---------|----------|
//! | new, outdated     | +1    | +1     |         |          |
//! | changed           | +1    | +1     | +1      |          |
//! | update            | +1    |        | +1      |          |
//! | identical, skipped| +1    |        |         |          |
//! | purged            |       |        |         | +1       |
//!
//! Purge counts go to `rejected` as well.

use std::sync::Arc;

use crate::compare::RowStatus;
use crate::observability::MetricsRegistry;

/// Counter sink for processed lines
pub trait LineCounters: Send + Sync {
    fn increment_input(&self);
    fn increment_output(&self);
    fn increment_updated(&self);
    fn increment_rejected(&self);
    fn add_rejected(&self, count: u64);
}

impl LineCounters for MetricsRegistry {
    fn increment_input(&self) {
        MetricsRegistry::increment_input(self);
    }

    fn increment_output(&self) {
        MetricsRegistry::increment_output(self);
    }

    fn increment_updated(&self) {
        MetricsRegistry::increment_updated(self);
    }

    fn increment_rejected(&self) {
        MetricsRegistry::increment_rejected(self);
    }

    fn add_rejected(&self, count: u64) {
        MetricsRegistry::add_rejected(self, count);
    }
}

/// Forwards row statuses to an optional counter sink
#[derive(Clone, Default)]
pub struct Statistic {
    counters: Option<Arc<dyn LineCounters>>,
}

impl Statistic {
    pub fn new(counters: Arc<dyn LineCounters>) -> Self {
        Self {
            counters: Some(counters),
        }
    }

    /// Statistic that records nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.counters.is_some()
    }

    /// Count one processed row.
    pub fn record(&self, status: RowStatus) {
        let Some(counters) = &self.counters else {
            return;
        };
        match status {
            RowStatus::New | RowStatus::Outdated => {
                counters.increment_input();
                counters.increment_output();
            }
            RowStatus::Changed => {
                counters.increment_input();
                counters.increment_output();
                counters.increment_updated();
            }
            RowStatus::Update => {
                counters.increment_input();
                counters.increment_updated();
            }
            RowStatus::Identical | RowStatus::Skipped => counters.increment_input(),
            RowStatus::Purged => counters.increment_rejected(),
        }
    }

    /// Count versions closed by a purge.
    pub fn add_count(&self, count: u64) {
        if let Some(counters) = &self.counters {
            counters.add_rejected(count);
        }
    }
}

impl std::fmt::Debug for Statistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statistic")
            .field("enabled", &self.is_enabled())
            .finish()
    }
}
