//! Observability for versioning sessions
//!
//! - Structured logging (JSON lines on stderr)
//! - Line counters
//! - Lifecycle event tracing
//!
//! Observability is read-only: nothing here influences versioning decisions,
//! and a failed log write is ignored.
//!
//! ```ignore
//! use table_versioning::observability::{log_event_with_fields, Event, Logger};
//!
//! Logger::info("CONFIG_LOADED", &[("table", "customers")]);
//! log_event_with_fields(Event::BatchCommit, &[("rows", "100")]);
//! ```

mod events;
mod logger;
mod metrics;
mod scope;

pub use events::Event;
pub use logger::{Logger, Severity};
pub use metrics::{MetricsRegistry, MetricsSnapshot};
pub use scope::ObservationScope;

/// Log a lifecycle event
pub fn log_event(event: Event) {
    log_event_with_fields(event, &[]);
}

/// Log a lifecycle event with fields
pub fn log_event_with_fields(event: Event, fields: &[(&str, &str)]) {
    let severity = if event.is_fatal() {
        Severity::Fatal
    } else {
        Severity::Info
    };
    Logger::log(severity, event.as_str(), fields);
}

/// Log a lifecycle event at an explicit severity
pub fn log_event_at(severity: Severity, event: Event, fields: &[(&str, &str)]) {
    Logger::log(severity, event.as_str(), fields);
}
