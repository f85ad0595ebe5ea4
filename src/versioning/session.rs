//! Versioning session
//!
//! Drives rows one at a time through compare, mutate and report. Each row
//! is stamped from the session clock before it is written:
//! - `version` from the compare outcome
//! - `valid_from` = now
//! - `valid_to` = the resolved horizon
//! - `last_seen` = `valid_from`, when tracked
//!
//! A failing row rolls back the open transaction. The session survives
//! only if the recovery callback accepts a transient storage error;
//! anything else closes it.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::clock::SessionClock;
use super::errors::{Result, VersioningError};
use super::mutation::MutationRequest;
use super::options::VersioningOptions;
use super::result::{SkipReason, VersioningResult};
use super::statistics::{LineCounters, Statistic};
use crate::compare::{CompareEngine, CompareOutcome, RowStatus};
use crate::fields::{FieldKind, FieldNames};
use crate::observability::{log_event_at, log_event_with_fields, Event, ObservationScope, Severity};
use crate::storage::{Connector, StorageError, VersionStorage};
use crate::value::{truncate_to_micros, Row, Value};

/// One versioning run against one table
pub struct Versioning {
    options: VersioningOptions,
    session_id: String,
    compare: CompareEngine,
    storage: Option<VersionStorage>,
    statistic: Statistic,
    clock: SessionClock,
    start: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
}

impl Versioning {
    /// Validate `options` and connect.
    pub fn open(options: VersioningOptions, connector: Box<dyn Connector>) -> Result<Self> {
        Self::open_with_clock(options, connector, SessionClock::system())
    }

    /// Open with an explicit clock.
    pub fn open_with_clock(
        options: VersioningOptions,
        connector: Box<dyn Connector>,
        mut clock: SessionClock,
    ) -> Result<Self> {
        options.validate()?;

        let start = match options.start_date {
            Some(start) => {
                clock.observe(start);
                truncate_to_micros(start)
            }
            None => clock.tick(),
        };
        let valid_to = options.valid_to.resolve(start)?;

        let session_id = Uuid::new_v4().to_string();
        let target = connector.describe();
        let storage = VersionStorage::open(options.layout(), options.commit_size, connector)?
            .with_session_id(session_id.clone());

        log_event_with_fields(
            Event::SessionOpen,
            &[
                ("session", &session_id),
                ("table", &options.layout().table_path()),
                ("target", &target),
                ("commit_size", &options.commit_size.to_string()),
            ],
        );

        Ok(Self {
            compare: CompareEngine::new(options.fields.clone()),
            options,
            session_id,
            storage: Some(storage),
            statistic: Statistic::disabled(),
            clock,
            start,
            valid_to,
        })
    }

    /// Report processed rows to `counters`.
    pub fn with_counters(mut self, counters: Arc<dyn LineCounters>) -> Self {
        self.statistic = Statistic::new(counters);
        self
    }

    /// Register the callback consulted after a rollback.
    ///
    /// It receives the error and the rows that were not committed, and
    /// returns true if it handled them.
    pub fn set_recovery_callback<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&VersioningError, &[Row]) -> bool + 'static,
    {
        let storage = self.storage_mut()?;
        storage.set_recovery_callback(Box::new(
            move |error: &(dyn std::error::Error + 'static), rows: &[Row]| {
                match error.downcast_ref::<VersioningError>() {
                    Some(error) => callback(error, rows),
                    None => false,
                }
            },
        ));
        Ok(())
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn options(&self) -> &VersioningOptions {
        &self.options
    }

    /// Session start, also the purge cutoff
    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    /// validTo written to new versions
    pub fn valid_to(&self) -> Option<DateTime<Utc>> {
        self.valid_to
    }

    pub fn is_open(&self) -> bool {
        self.storage.is_some()
    }

    /// Version `row` against the table.
    ///
    /// Returns `None` if the row failed with an error the recovery
    /// callback accepted.
    pub fn process(&mut self, row: Row) -> Result<Option<VersioningResult>> {
        self.process_row(row, None)
    }

    /// Process `row` as seen but unchanged.
    ///
    /// Rows without an active version come back `skipped`.
    pub fn process_as_identical(&mut self, row: Row) -> Result<Option<VersioningResult>> {
        self.process_row(row, Some(RowStatus::Identical))
    }

    /// Close the active version of `row`. Only identifier fields are needed.
    ///
    /// Rows without an active version come back `skipped`.
    pub fn process_as_purged(&mut self, row: Row) -> Result<Option<VersioningResult>> {
        self.process_row(row, Some(RowStatus::Purged))
    }

    /// Process with an optional forced status.
    ///
    /// Only `identical` and `purged` can be forced; any other status closes
    /// the session.
    pub fn process_as(
        &mut self,
        row: Row,
        status: Option<RowStatus>,
    ) -> Result<Option<VersioningResult>> {
        match status {
            None => self.process(row),
            Some(RowStatus::Identical) => self.process_as_identical(row),
            Some(RowStatus::Purged) => self.process_as_purged(row),
            Some(other) => {
                self.storage_mut()?;
                let error = VersioningError::StatusNotAllowed(other);
                self.abort(&error);
                Err(error)
            }
        }
    }

    fn process_row(
        &mut self,
        mut row: Row,
        forced: Option<RowStatus>,
    ) -> Result<Option<VersioningResult>> {
        self.storage_mut()?;
        let now = self.clock.tick();
        match self.apply(&mut row, forced, now) {
            Ok((outcome, skip_reason)) => {
                let names = &self.options.field_names;
                let result = VersioningResult {
                    valid_from: row.value(&names.valid_from).as_timestamp(),
                    valid_to: row.value(&names.valid_to).as_timestamp(),
                    version: outcome.version,
                    status: outcome.status,
                    skip_reason,
                    row,
                };
                self.statistic.record(result.status);
                Ok(Some(result))
            }
            Err(error) => self.recover(error),
        }
    }

    fn apply(
        &mut self,
        row: &mut Row,
        forced: Option<RowStatus>,
        now: DateTime<Utc>,
    ) -> Result<(CompareOutcome, Option<SkipReason>)> {
        self.check_identifiers(row)?;
        let storage = self
            .storage
            .as_mut()
            .ok_or(VersioningError::SessionClosed)?;

        let natural = self.compare.compare(storage, row, now)?;
        // A forced status applies to the active version as stored
        let (status, version, skip_reason) = match forced {
            None => (natural.status, natural.version, None),
            Some(forced) => match SkipReason::for_natural_status(natural.status) {
                Some(reason) => (RowStatus::Skipped, natural.version, Some(reason)),
                None => (forced, natural.active_version(), None),
            },
        };
        if let Some(reason) = skip_reason {
            log_event_at(
                Severity::Trace,
                Event::RowSkipped,
                &[("session", &self.session_id), ("reason", reason.as_str())],
            );
        }

        let names = &self.options.field_names;
        stamp(row, names, version, now, self.valid_to);
        if status == RowStatus::Purged {
            row.set(names.valid_to.clone(), now);
        }

        let request = MutationRequest::for_status(status, names.tracks_last_seen());
        if request.writes() {
            storage.record_backup(row.clone());
        }
        request.apply(storage, row)?;

        Ok((CompareOutcome::new(status, version), skip_reason))
    }

    fn check_identifiers(&self, row: &Row) -> Result<()> {
        for name in self.options.fields.names(FieldKind::Id) {
            if row.value(name).is_null() {
                return Err(VersioningError::MissingIdentifier(name.to_string()));
            }
        }
        Ok(())
    }

    /// Roll back after a failed row and decide whether the session survives.
    fn recover(&mut self, error: VersioningError) -> Result<Option<VersioningResult>> {
        let handled = match self.storage.as_mut() {
            Some(storage) => storage.rollback(&error),
            None => false,
        };
        if handled && error.is_recoverable() {
            log_event_at(
                Severity::Warn,
                Event::RowRecovered,
                &[("session", &self.session_id), ("error", &error.to_string())],
            );
            return Ok(None);
        }
        self.abort(&error);
        Err(error)
    }

    /// Close every version still active and not seen since session start.
    /// Closed versions end at session start.
    ///
    /// Returns the number of versions closed.
    pub fn purge(&mut self) -> Result<u64> {
        if !self.options.field_names.tracks_last_seen() {
            return Err(VersioningError::Config(
                "purge requires field_names.last_seen".into(),
            ));
        }
        if self.storage.is_none() {
            return Err(VersioningError::SessionClosed);
        }
        let now = self.clock.tick();
        let storage = self
            .storage
            .as_mut()
            .ok_or(VersioningError::SessionClosed)?;
        let scope = ObservationScope::with_fields("PURGE", &[("session", &self.session_id)]);
        match storage.purge(self.start, now, self.options.purge_where.as_deref()) {
            Ok(count) => {
                scope.complete_with_fields(&[("closed", &count.to_string())]);
                self.statistic.add_count(count);
                Ok(count)
            }
            Err(e) => {
                scope.fail(&e.to_string());
                Err(self.fail_with(e))
            }
        }
    }

    /// End the session: purge if enabled, commit, close.
    pub fn finish(&mut self) -> Result<()> {
        self.storage_mut()?;
        if self.options.purge {
            self.purge()?;
        }
        let committed = self.storage_mut()?.commit();
        if let Err(e) = committed {
            return Err(self.fail_with(e));
        }
        log_event_with_fields(Event::SessionFinish, &[("session", &self.session_id)]);
        self.close()
    }

    /// Release the connection. Uncommitted writes are discarded.
    ///
    /// Closing a closed session does nothing.
    pub fn close(&mut self) -> Result<()> {
        match self.storage.take() {
            Some(mut storage) => {
                let closed = storage.close();
                log_event_with_fields(Event::SessionClosed, &[("session", &self.session_id)]);
                closed.map_err(VersioningError::from)
            }
            None => Ok(()),
        }
    }

    fn storage_mut(&mut self) -> Result<&mut VersionStorage> {
        self.storage.as_mut().ok_or(VersioningError::SessionClosed)
    }

    /// Roll back, close and hand back the error.
    fn fail_with(&mut self, error: StorageError) -> VersioningError {
        let error = VersioningError::from(error);
        if let Some(storage) = self.storage.as_mut() {
            storage.rollback(&error);
        }
        self.abort(&error);
        error
    }

    fn abort(&mut self, error: &VersioningError) {
        log_event_with_fields(
            Event::SessionAborted,
            &[("session", &self.session_id), ("error", &error.to_string())],
        );
        let _ = self.close();
    }
}

impl Drop for Versioning {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Write the bookkeeping columns of a row about to be stored.
fn stamp(
    row: &mut Row,
    names: &FieldNames,
    version: i64,
    now: DateTime<Utc>,
    valid_to: Option<DateTime<Utc>>,
) {
    row.set(names.version.clone(), version);
    row.set(names.valid_from.clone(), now);
    row.set(names.valid_to.clone(), Value::from(valid_to));
    if let Some(last_seen) = &names.last_seen {
        row.set(last_seen.clone(), now);
    }
}
