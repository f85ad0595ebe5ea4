//! Version storage engine
//!
//! Executes the versioning statements against one table:
//! - lookups of the latest and the active version of a record
//! - version inserts, in-place updates and interval closing
//! - lastSeen refresh and the end-of-load purge
//!
//! Writes join the open transaction and are committed in batches of
//! `commit_size` rows. A failed batch is rolled back as a whole; rows
//! processed since the last commit are handed to the recovery callback.
//!
//! Prepared statements are cached per session and dropped whenever the
//! connection is replaced.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::error::Error as StdError;

use chrono::{DateTime, Utc};

use super::batch::TransactionBatch;
use super::connection::{Connection, ConnectionState, Connector};
use super::errors::StorageResult;
use super::query::{PreparedQuery, QueryFactory, QueryKind, TableLayout};
use super::record::VersionedRecord;
use crate::observability::{log_event_at, log_event_with_fields, Event, Logger, Severity};
use crate::value::Row;

/// Called after a rollback with the error and the uncommitted rows.
///
/// Returning true marks the error as handled.
pub type RecoveryCallback = Box<dyn FnMut(&(dyn StdError + 'static), &[Row]) -> bool>;

/// Storage side of a versioning session
pub struct VersionStorage {
    queries: QueryFactory,
    connector: Box<dyn Connector>,
    state: ConnectionState,
    statements: HashMap<QueryKind, PreparedQuery>,
    batch: TransactionBatch<Row>,
    recovery: Option<RecoveryCallback>,
    session_id: String,
}

impl VersionStorage {
    /// Connect and prepare for versioning `layout`.
    pub fn open(
        layout: TableLayout,
        commit_size: usize,
        connector: Box<dyn Connector>,
    ) -> StorageResult<Self> {
        let connection = connector.connect()?;
        Ok(Self {
            queries: QueryFactory::new(layout),
            connector,
            state: ConnectionState::Connected(connection),
            statements: HashMap::new(),
            batch: TransactionBatch::new(commit_size),
            recovery: None,
            session_id: String::new(),
        })
    }

    /// Identifier attached to log lines
    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = session_id.into();
        self
    }

    pub fn set_recovery_callback(&mut self, callback: RecoveryCallback) {
        self.recovery = Some(callback);
    }

    pub fn layout(&self) -> &TableLayout {
        self.queries.layout()
    }

    pub fn is_connected(&self) -> bool {
        self.state.is_usable()
    }

    pub fn pending_writes(&self) -> usize {
        self.batch.pending_writes()
    }

    pub fn backup_rows(&self) -> &[Row] {
        self.batch.backup_rows()
    }

    /// Remember a row until the current transaction ends.
    pub fn record_backup(&mut self, row: Row) {
        self.batch.add_backup(row);
    }

    /// Latest version of the record identified by `row`, regardless of
    /// validity.
    pub fn get_version(&mut self, row: &Row) -> StorageResult<Option<VersionedRecord>> {
        self.select(QueryKind::VersionSelect, row, None)
    }

    /// Version of the record whose interval contains `now`.
    ///
    /// If intervals overlap, the highest version wins.
    pub fn get_active_version(
        &mut self,
        row: &Row,
        now: DateTime<Utc>,
    ) -> StorageResult<Option<VersionedRecord>> {
        self.select(QueryKind::ActiveVersionSelect, row, Some(now))
    }

    /// Insert `row` as a version of its own.
    pub fn insert_version(&mut self, row: &Row) -> StorageResult<()> {
        self.execute(QueryKind::Insert, row)?;
        self.commit_ready()
    }

    /// Close the active version at `row`'s validFrom and insert `row`.
    ///
    /// Both writes land in the same transaction.
    pub fn changed_version(&mut self, row: &Row) -> StorageResult<()> {
        self.execute(QueryKind::CloseActive, row)?;
        self.execute(QueryKind::Insert, row)?;
        self.commit_ready()
    }

    /// Overwrite update and lazy fields of the version `row` carries.
    pub fn update_version(&mut self, row: &Row) -> StorageResult<()> {
        self.execute(QueryKind::Update, row)?;
        self.commit_ready()
    }

    /// Refresh lastSeen on the version active at `row`'s validFrom.
    pub fn update_last_seen(&mut self, row: &Row) -> StorageResult<()> {
        self.execute(QueryKind::UpdateLastSeen, row)?;
        self.commit_ready()
    }

    /// End the active version of one record at `row`'s validFrom.
    pub fn purge_one(&mut self, row: &Row) -> StorageResult<()> {
        self.execute(QueryKind::PurgeOne, row)?;
        self.commit_ready()
    }

    /// End every version active at `now` and not seen since `cutoff`, then
    /// commit. Closed versions end at `cutoff`.
    ///
    /// Returns the number of versions closed.
    pub fn purge(
        &mut self,
        cutoff: DateTime<Utc>,
        now: DateTime<Utc>,
        condition: Option<&str>,
    ) -> StorageResult<u64> {
        let query = self.queries.purge_scope(condition)?;
        let connection = self.state.connection_mut()?;
        connection.prepare(&query)?;
        let params = query.bind_with_cutoff(&Row::new(), Some(now), Some(cutoff));
        let affected = connection.execute(&query, &params)?;
        self.commit()?;
        Ok(affected as u64)
    }

    /// Commit pending writes.
    pub fn commit(&mut self) -> StorageResult<()> {
        let pending = self.batch.pending_writes();
        self.state.connection_mut()?.commit()?;
        self.batch.clear();
        if pending > 0 {
            let rows = pending.to_string();
            log_event_at(
                Severity::Trace,
                Event::BatchCommit,
                &[("session", &self.session_id), ("rows", &rows)],
            );
        }
        Ok(())
    }

    /// Discard the open transaction after `error`.
    ///
    /// A connection found closed is replaced instead. The recovery callback
    /// then receives the rows that were not committed. Returns the
    /// callback's verdict, or false without a callback. Never fails.
    pub fn rollback(&mut self, error: &(dyn StdError + 'static)) -> bool {
        if self.state.is_usable() {
            if let Ok(connection) = self.state.connection_mut() {
                if let Err(e) = connection.rollback() {
                    Logger::warn(
                        "ROLLBACK_FAILED",
                        &[("session", &self.session_id), ("error", &e.to_string())],
                    );
                }
            }
        } else {
            self.reconnect();
        }

        let discarded = self.batch.pending_writes().to_string();
        let rows = self.batch.take_backup_rows();
        let backup = rows.len().to_string();
        log_event_at(
            Severity::Warn,
            Event::BatchRollback,
            &[
                ("session", &self.session_id),
                ("discarded_writes", &discarded),
                ("backup_rows", &backup),
                ("error", &error.to_string()),
            ],
        );

        match self.recovery.as_mut() {
            Some(callback) => callback(error, &rows),
            None => false,
        }
    }

    /// Release the connection and cached statements. Idempotent.
    ///
    /// Uncommitted writes are discarded.
    pub fn close(&mut self) -> StorageResult<()> {
        self.statements.clear();
        self.batch.clear();
        self.state.close()
    }

    fn reconnect(&mut self) {
        self.statements.clear();
        let _ = self.state.close();
        match self.connector.connect() {
            Ok(connection) => {
                self.state = ConnectionState::Connected(connection);
                log_event_with_fields(
                    Event::ConnectionReconnect,
                    &[
                        ("session", &self.session_id),
                        ("target", &self.connector.describe()),
                    ],
                );
            }
            Err(e) => {
                self.state = ConnectionState::Closed;
                log_event_at(
                    Severity::Error,
                    Event::ConnectionLost,
                    &[("session", &self.session_id), ("error", &e.to_string())],
                );
            }
        }
    }

    fn commit_ready(&mut self) -> StorageResult<()> {
        if self.batch.record_write() {
            self.commit()?;
        }
        Ok(())
    }

    fn select(
        &mut self,
        kind: QueryKind,
        row: &Row,
        instant: Option<DateTime<Utc>>,
    ) -> StorageResult<Option<VersionedRecord>> {
        let connection = self.state.connection_mut()?;
        let query = cached(
            &mut self.statements,
            &self.queries,
            connection,
            kind,
            &self.session_id,
        )?;
        let params = query.bind(row, instant);
        match connection.query_row(query, &params)? {
            Some(stored) => VersionedRecord::from_row(stored, &self.queries.layout().names).map(Some),
            None => Ok(None),
        }
    }

    fn execute(&mut self, kind: QueryKind, row: &Row) -> StorageResult<usize> {
        let connection = self.state.connection_mut()?;
        let query = cached(
            &mut self.statements,
            &self.queries,
            connection,
            kind,
            &self.session_id,
        )?;
        let params = query.bind(row, None);
        connection.execute(query, &params)
    }
}

/// Cached statement for `kind`, built and prepared on first use.
fn cached<'a>(
    statements: &'a mut HashMap<QueryKind, PreparedQuery>,
    queries: &QueryFactory,
    connection: &mut dyn Connection,
    kind: QueryKind,
    session_id: &str,
) -> StorageResult<&'a PreparedQuery> {
    match statements.entry(kind) {
        Entry::Occupied(entry) => Ok(entry.into_mut()),
        Entry::Vacant(entry) => {
            let query = queries.build(kind)?;
            connection.prepare(&query)?;
            log_event_at(
                Severity::Trace,
                Event::StatementPrepared,
                &[
                    ("session", session_id),
                    ("kind", kind.as_str()),
                    ("sql", query.sql()),
                ],
            );
            Ok(entry.insert(query))
        }
    }
}

impl Drop for VersionStorage {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fields::{FieldClassification, FieldKind, FieldNames, SemanticType};
    use crate::storage::query::IdentifierQuote;
    use crate::storage::sqlite::SqliteConnector;
    use crate::value::Value;
    use chrono::TimeZone;
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;

    const DDL: &str = "CREATE TABLE items (id INTEGER, name TEXT, note TEXT, \
                       dateFrom TEXT, dateTo TEXT, version INTEGER, lastSeen TEXT)";

    fn layout() -> TableLayout {
        TableLayout {
            schema: None,
            table: "items".to_string(),
            quote: IdentifierQuote::DoubleQuote,
            fields: FieldClassification::new()
                .with("id", FieldKind::Id, SemanticType::Integer)
                .with("name", FieldKind::Compare, SemanticType::String)
                .with("note", FieldKind::Update, SemanticType::String),
            names: FieldNames::default().with_last_seen("lastSeen"),
        }
    }

    fn storage(commit_size: usize) -> VersionStorage {
        let connector = SqliteConnector::memory().with_init_sql(DDL);
        VersionStorage::open(layout(), commit_size, Box::new(connector)).unwrap()
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, hour, 0, 0).unwrap()
    }

    fn version_row(id: i64, name: &str, version: i64, from: DateTime<Utc>) -> Row {
        Row::new()
            .with("id", id)
            .with("name", name)
            .with("note", Value::Null)
            .with("dateFrom", from)
            .with("dateTo", Value::Null)
            .with("version", version)
            .with("lastSeen", from)
    }

    #[test]
    fn test_insert_then_lookup() {
        let mut storage = storage(100);
        storage.insert_version(&version_row(1, "a", 1, at(1))).unwrap();

        let latest = storage.get_version(&Row::new().with("id", 1i64)).unwrap().unwrap();
        assert_eq!(latest.version(), 1);

        let probe = Row::new().with("id", 1i64);
        assert!(storage.get_active_version(&probe, at(2)).unwrap().is_some());
        assert!(storage.get_active_version(&probe, at(0)).unwrap().is_none());
        assert!(storage.get_version(&Row::new().with("id", 2i64)).unwrap().is_none());
    }

    #[test]
    fn test_changed_version_closes_previous_interval() {
        let mut storage = storage(100);
        storage.insert_version(&version_row(1, "a", 1, at(1))).unwrap();
        storage.changed_version(&version_row(1, "b", 2, at(3))).unwrap();

        let probe = Row::new().with("id", 1i64);
        let before = storage.get_active_version(&probe, at(2)).unwrap().unwrap();
        assert_eq!(before.version(), 1);
        assert_eq!(before.valid_to(), Some(at(3)));

        let after = storage.get_active_version(&probe, at(4)).unwrap().unwrap();
        assert_eq!(after.version(), 2);
        assert_eq!(after.row().value("name"), &Value::Text("b".into()));
    }

    #[test]
    fn test_update_version_in_place() {
        let mut storage = storage(100);
        storage.insert_version(&version_row(1, "a", 1, at(1))).unwrap();
        let update = version_row(1, "a", 1, at(2)).with("note", "hello");
        storage.update_version(&update).unwrap();

        let latest = storage.get_version(&Row::new().with("id", 1i64)).unwrap().unwrap();
        assert_eq!(latest.version(), 1);
        assert_eq!(latest.row().value("note"), &Value::Text("hello".into()));
        assert_eq!(latest.valid_from(), Some(at(2)));
    }

    #[test]
    fn test_commit_every_commit_size_writes() {
        let mut storage = storage(2);
        storage.insert_version(&version_row(1, "a", 1, at(1))).unwrap();
        assert_eq!(storage.pending_writes(), 1);
        storage.insert_version(&version_row(2, "a", 1, at(1))).unwrap();
        assert_eq!(storage.pending_writes(), 0);
    }

    #[test]
    fn test_rollback_hands_backup_rows_to_callback() {
        let mut storage = storage(100);
        let seen: Rc<RefCell<Vec<usize>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        storage.set_recovery_callback(Box::new(move |_: &(dyn StdError + 'static), rows: &[Row]| {
            sink.borrow_mut().push(rows.len());
            true
        }));

        let row = version_row(1, "a", 1, at(1));
        storage.record_backup(row.clone());
        storage.insert_version(&row).unwrap();

        let error = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(storage.rollback(&error));
        assert_eq!(*seen.borrow(), vec![1]);
        assert_eq!(storage.pending_writes(), 0);
        assert!(storage.backup_rows().is_empty());
        assert!(storage.get_version(&Row::new().with("id", 1i64)).unwrap().is_none());
    }

    #[test]
    fn test_rollback_without_callback_is_unhandled() {
        let mut storage = storage(100);
        let error = io::Error::new(io::ErrorKind::Other, "boom");
        assert!(!storage.rollback(&error));
    }

    #[test]
    fn test_purge_closes_unseen_versions() {
        let mut storage = storage(100);
        storage.insert_version(&version_row(1, "a", 1, at(1))).unwrap();
        storage.insert_version(&version_row(2, "b", 1, at(5))).unwrap();

        let closed = storage.purge(at(3), at(4), None).unwrap();
        assert_eq!(closed, 1);

        let probe = Row::new().with("id", 1i64);
        assert!(storage.get_active_version(&probe, at(4)).unwrap().is_none());
        let probe = Row::new().with("id", 2i64);
        assert!(storage.get_active_version(&probe, at(6)).unwrap().is_some());
    }

    #[test]
    fn test_purge_skips_versions_closed_before_now() {
        let mut storage = storage(100);
        storage.insert_version(&version_row(1, "a", 1, at(1))).unwrap();
        storage.changed_version(&version_row(1, "b", 2, at(2))).unwrap();

        // Only the open v2 qualifies; v1 already ended at its successor's start
        let closed = storage.purge(at(3), at(4), None).unwrap();
        assert_eq!(closed, 1);

        let probe = Row::new().with("id", 1i64);
        let v1 = storage.get_active_version(&probe, at(1)).unwrap().unwrap();
        assert_eq!(v1.version(), 1);
        assert_eq!(v1.valid_to(), Some(at(2)));
        let v2 = storage.get_version(&probe).unwrap().unwrap();
        assert_eq!(v2.valid_to(), Some(at(3)));
    }

    #[test]
    fn test_close_is_idempotent() {
        let mut storage = storage(100);
        storage.close().unwrap();
        assert!(!storage.is_connected());
        storage.close().unwrap();
        assert!(storage.get_version(&Row::new().with("id", 1i64)).is_err());
    }
}
