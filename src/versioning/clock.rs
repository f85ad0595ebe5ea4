//! Session clock
//!
//! Every tick is at least one microsecond after the previous one, so two
//! rows of the same session never share an instant. Interval bounds
//! written in one session therefore never tie.

use chrono::{DateTime, Duration, Utc};

use crate::value::truncate_to_micros;

#[derive(Debug, Clone, Copy)]
enum Source {
    System,
    /// Ticks advance from a fixed origin, one microsecond at a time
    Manual(DateTime<Utc>),
}

/// Strictly monotonic microsecond clock
#[derive(Debug, Clone)]
pub struct SessionClock {
    source: Source,
    last: Option<DateTime<Utc>>,
}

impl SessionClock {
    /// Clock following the system time
    pub fn system() -> Self {
        Self {
            source: Source::System,
            last: None,
        }
    }

    /// Deterministic clock whose first tick is `origin`
    pub fn starting_at(origin: DateTime<Utc>) -> Self {
        Self {
            source: Source::Manual(truncate_to_micros(origin)),
            last: None,
        }
    }

    /// Next instant, strictly after every earlier tick
    pub fn tick(&mut self) -> DateTime<Utc> {
        let now = match self.source {
            Source::System => truncate_to_micros(Utc::now()),
            Source::Manual(origin) => origin,
        };
        let next = match self.last {
            Some(last) => now.max(last + Duration::microseconds(1)),
            None => now,
        };
        self.last = Some(next);
        next
    }

    /// Make every following tick later than `instant`.
    pub fn observe(&mut self, instant: DateTime<Utc>) {
        let instant = truncate_to_micros(instant);
        self.last = Some(self.last.map_or(instant, |last| last.max(instant)));
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }
}

impl Default for SessionClock {
    fn default() -> Self {
        Self::system()
    }
}
