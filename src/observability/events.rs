//! Observable events of a versioning session
//!
//! Events are explicit and typed.

use std::fmt;

/// Observable events
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    // Session lifecycle
    /// Session opened, connection established
    SessionOpen,
    /// `finish` completed (purge, commit, close)
    SessionFinish,
    /// Session resources released
    SessionClosed,
    /// A fatal error closed the session
    SessionAborted,

    // Statements
    /// Statement built and prepared on the connection
    StatementPrepared,

    // Transactions
    /// Pending writes committed
    BatchCommit,
    /// Pending writes rolled back
    BatchRollback,
    /// Connection was closed and has been replaced
    ConnectionReconnect,
    /// Replacing the connection failed
    ConnectionLost,

    // Rows
    /// A forced status was downgraded to skipped
    RowSkipped,
    /// A row failed and the recovery callback accepted the error
    RowRecovered,
}

impl Event {
    /// Returns the string representation of the event
    pub fn as_str(&self) -> &'static str {
        match self {
            Event::SessionOpen => "SESSION_OPEN",
            Event::SessionFinish => "SESSION_FINISH",
            Event::SessionClosed => "SESSION_CLOSED",
            Event::SessionAborted => "SESSION_ABORTED",

            Event::StatementPrepared => "STATEMENT_PREPARED",

            Event::BatchCommit => "BATCH_COMMIT",
            Event::BatchRollback => "BATCH_ROLLBACK",
            Event::ConnectionReconnect => "CONNECTION_RECONNECT",
            Event::ConnectionLost => "CONNECTION_LOST",

            Event::RowSkipped => "ROW_SKIPPED",
            Event::RowRecovered => "ROW_RECOVERED",
        }
    }

    /// Returns true if this event indicates the session cannot continue
    pub fn is_fatal(&self) -> bool {
        matches!(self, Event::SessionAborted)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_events_have_string_representation() {
        let events = [
            Event::SessionOpen,
            Event::SessionFinish,
            Event::SessionClosed,
            Event::SessionAborted,
            Event::StatementPrepared,
            Event::BatchCommit,
            Event::BatchRollback,
            Event::ConnectionReconnect,
            Event::ConnectionLost,
            Event::RowSkipped,
            Event::RowRecovered,
        ];

        for event in events {
            let s = event.as_str();
            assert!(!s.is_empty());
            assert!(s.chars().all(|c| c.is_uppercase() || c == '_'));
        }
    }

    #[test]
    fn test_fatal_events() {
        assert!(Event::SessionAborted.is_fatal());
        assert!(!Event::BatchRollback.is_fatal());
    }
}
