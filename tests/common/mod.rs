//! Shared fixtures for integration tests
//!
//! Tests run against file-backed SQLite databases in a temp dir so the
//! stored state can be read back through a separate connection.

#![allow(dead_code)]

use std::cell::Cell;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use table_versioning::fields::{FieldClassification, FieldKind, FieldNames, SemanticType};
use table_versioning::storage::{
    Connection, Connector, PreparedQuery, SqliteConnector, StorageError, StorageErrorCode,
    StorageResult,
};
use table_versioning::value::{Row, Value};
use table_versioning::versioning::{Versioning, VersioningOptions};
use tempfile::TempDir;

pub const DDL: &str = "CREATE TABLE IF NOT EXISTS customer (
    id INTEGER NOT NULL,
    name TEXT,
    balance TEXT,
    note TEXT,
    version INTEGER NOT NULL,
    dateFrom TEXT,
    dateTo TEXT,
    lastSeen TEXT
);";

/// A version as read back from the table
#[derive(Debug, Clone, PartialEq)]
pub struct StoredVersion {
    pub version: i64,
    pub name: Option<String>,
    pub note: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub last_seen: Option<String>,
}

pub struct TestDb {
    _dir: TempDir,
    path: PathBuf,
}

impl TestDb {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("dim.db");
        Self { _dir: dir, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn connector(&self) -> SqliteConnector {
        SqliteConnector::file(&self.path).with_init_sql(DDL)
    }

    pub fn open(&self, options: VersioningOptions) -> Versioning {
        Versioning::open(options, Box::new(self.connector())).unwrap()
    }

    /// All versions of `id`, oldest first
    pub fn versions(&self, id: i64) -> Vec<StoredVersion> {
        let conn = rusqlite::Connection::open(&self.path).unwrap();
        let mut stmt = conn
            .prepare(
                "SELECT version, name, note, dateFrom, dateTo, lastSeen
                 FROM customer WHERE id = ?1 ORDER BY version",
            )
            .unwrap();
        let rows = stmt
            .query_map([id], |r| {
                Ok(StoredVersion {
                    version: r.get(0)?,
                    name: r.get(1)?,
                    note: r.get(2)?,
                    date_from: r.get(3)?,
                    date_to: r.get(4)?,
                    last_seen: r.get(5)?,
                })
            })
            .unwrap();
        let versions = rows.map(Result::unwrap).collect();
        versions
    }

    pub fn count(&self) -> i64 {
        let conn = rusqlite::Connection::open(&self.path).unwrap();
        conn.query_row("SELECT COUNT(*) FROM customer", [], |r| r.get(0))
            .unwrap_or(0)
    }

    pub fn ids(&self) -> Vec<i64> {
        let conn = rusqlite::Connection::open(&self.path).unwrap();
        let mut stmt = conn
            .prepare("SELECT DISTINCT id FROM customer ORDER BY id")
            .unwrap();
        let rows = stmt.query_map([], |r| r.get::<_, i64>(0)).unwrap();
        let ids = rows.map(Result::unwrap).collect();
        ids
    }
}

pub fn fields() -> FieldClassification {
    FieldClassification::new()
        .with("id", FieldKind::Id, SemanticType::Integer)
        .with("name", FieldKind::Compare, SemanticType::String)
        .with("balance", FieldKind::Compare, SemanticType::Decimal { scale: 2 })
        .with("note", FieldKind::Update, SemanticType::String)
}

pub fn options() -> VersioningOptions {
    VersioningOptions::new("customer", fields())
}

pub fn options_with_last_seen() -> VersioningOptions {
    options().with_field_names(FieldNames::default().with_last_seen("lastSeen"))
}

pub fn row(id: i64, name: &str) -> Row {
    Row::new().with("id", id).with("name", name)
}

pub fn key(id: i64) -> Row {
    Row::new().with("id", id)
}

pub fn decimal(text: &str) -> Value {
    Value::Decimal(text.parse().unwrap())
}

/// How a `FlakyConnection` fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Report the database as busy
    Busy,
    /// Drop the underlying connection
    Disconnect,
    /// A non-transient statement failure
    Statement,
}

/// Fails the Nth write executed through any of its connections.
///
/// Writes are counted across reconnects; the failure fires once.
pub struct FlakyConnector {
    inner: SqliteConnector,
    fail_on: usize,
    failure: Failure,
    writes: Rc<Cell<usize>>,
    connects: Rc<Cell<usize>>,
}

impl FlakyConnector {
    pub fn new(inner: SqliteConnector, fail_on: usize, failure: Failure) -> Self {
        Self {
            inner,
            fail_on,
            failure,
            writes: Rc::new(Cell::new(0)),
            connects: Rc::new(Cell::new(0)),
        }
    }

    /// Shared handle on the number of connections opened
    pub fn connects(&self) -> Rc<Cell<usize>> {
        self.connects.clone()
    }
}

impl Connector for FlakyConnector {
    fn connect(&self) -> StorageResult<Box<dyn Connection>> {
        self.connects.set(self.connects.get() + 1);
        Ok(Box::new(FlakyConnection {
            inner: Some(self.inner.open()?),
            fail_on: self.fail_on,
            failure: self.failure,
            writes: self.writes.clone(),
        }))
    }

    fn describe(&self) -> String {
        format!("flaky({})", self.inner.describe())
    }
}

struct FlakyConnection {
    inner: Option<table_versioning::storage::SqliteConnection>,
    fail_on: usize,
    failure: Failure,
    writes: Rc<Cell<usize>>,
}

impl FlakyConnection {
    fn inner(&mut self) -> StorageResult<&mut table_versioning::storage::SqliteConnection> {
        self.inner.as_mut().ok_or_else(StorageError::connection_closed)
    }
}

impl Connection for FlakyConnection {
    fn prepare(&mut self, query: &PreparedQuery) -> StorageResult<()> {
        self.inner()?.prepare(query)
    }

    fn query_row(&mut self, query: &PreparedQuery, params: &[Value]) -> StorageResult<Option<Row>> {
        self.inner()?.query_row(query, params)
    }

    fn execute(&mut self, query: &PreparedQuery, params: &[Value]) -> StorageResult<usize> {
        let write = self.writes.get() + 1;
        self.writes.set(write);
        if write == self.fail_on {
            return Err(match self.failure {
                Failure::Busy => StorageError::new(StorageErrorCode::Busy, "database is locked"),
                Failure::Disconnect => {
                    if let Some(mut conn) = self.inner.take() {
                        let _ = conn.close();
                    }
                    StorageError::connection_closed()
                }
                Failure::Statement => {
                    StorageError::new(StorageErrorCode::StatementFailed, "no such column")
                }
            });
        }
        self.inner()?.execute(query, params)
    }

    fn commit(&mut self) -> StorageResult<()> {
        self.inner()?.commit()
    }

    fn rollback(&mut self) -> StorageResult<()> {
        self.inner()?.rollback()
    }

    fn is_closed(&self) -> bool {
        self.inner.as_ref().map_or(true, |c| c.is_closed())
    }

    fn close(&mut self) -> StorageResult<()> {
        match self.inner.take() {
            Some(mut conn) => conn.close(),
            None => Ok(()),
        }
    }
}
