//! SQLite connection adapter
//!
//! Value mapping:
//! - bool binds as 0/1
//! - integers and floats bind natively (f32 widened to f64)
//! - decimals and timestamps bind as text, timestamps in the fixed-width
//!   storage format
//! - blobs read back as lossy UTF-8 text
//!
//! Driver errors are classified so that busy, locked and I/O failures are
//! reported as transient.

use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::{params_from_iter, ErrorCode};

use super::connection::{Connection, Connector};
use super::errors::{StorageError, StorageErrorCode, StorageResult};
use super::query::PreparedQuery;
use crate::value::{format_timestamp, Row, Value};

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A rusqlite connection with an implicit open transaction
pub struct SqliteConnection {
    conn: Option<rusqlite::Connection>,
}

impl SqliteConnection {
    /// Open a database file, creating it if needed.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path).map_err(|e| {
            StorageError::connect_failed(format!("cannot open {}", path.display()), e)
        })?;
        Self::configure(conn)
    }

    /// Open a private in-memory database.
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| StorageError::connect_failed("cannot open in-memory database", e))?;
        Self::configure(conn)
    }

    fn configure(conn: rusqlite::Connection) -> StorageResult<Self> {
        conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)
            .map_err(|e| classify(e, "busy_timeout"))?;
        Ok(Self { conn: Some(conn) })
    }

    /// Run raw SQL outside the statement cache, e.g. schema setup.
    ///
    /// Commits any open transaction first.
    pub fn execute_batch(&mut self, sql: &str) -> StorageResult<()> {
        let conn = self.live()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| classify(e, "commit"))?;
        }
        conn.execute_batch(sql).map_err(|e| classify(e, "execute_batch"))
    }

    fn live(&self) -> StorageResult<&rusqlite::Connection> {
        self.conn.as_ref().ok_or_else(StorageError::connection_closed)
    }
}

fn begin_if_needed(conn: &rusqlite::Connection) -> StorageResult<()> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN").map_err(|e| classify(e, "begin"))?;
    }
    Ok(())
}

impl Connection for SqliteConnection {
    fn prepare(&mut self, query: &PreparedQuery) -> StorageResult<()> {
        let conn = self.live()?;
        conn.prepare_cached(query.sql())
            .map(|_| ())
            .map_err(|e| classify(e, query.label()))
    }

    fn query_row(&mut self, query: &PreparedQuery, params: &[Value]) -> StorageResult<Option<Row>> {
        let conn = self.live()?;
        begin_if_needed(conn)?;
        let mut stmt = conn
            .prepare_cached(query.sql())
            .map_err(|e| classify(e, query.label()))?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(str::to_string).collect();
        let mut rows = stmt
            .query(params_from_iter(params.iter().map(to_sql_value)))
            .map_err(|e| classify(e, query.label()))?;

        let result = match rows.next().map_err(|e| classify(e, query.label()))? {
            Some(sql_row) => {
                let mut row = Row::new();
                for (index, name) in columns.iter().enumerate() {
                    let value = sql_row
                        .get_ref(index)
                        .map_err(|e| classify(e, query.label()))?;
                    row.set(name.clone(), from_sql_ref(value));
                }
                Some(row)
            }
            None => None,
        };
        Ok(result)
    }

    fn execute(&mut self, query: &PreparedQuery, params: &[Value]) -> StorageResult<usize> {
        let conn = self.live()?;
        begin_if_needed(conn)?;
        let mut stmt = conn
            .prepare_cached(query.sql())
            .map_err(|e| classify(e, query.label()))?;
        stmt.execute(params_from_iter(params.iter().map(to_sql_value)))
            .map_err(|e| classify(e, query.label()))
    }

    fn commit(&mut self) -> StorageResult<()> {
        let conn = self.live()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")
                .map_err(|e| classify(e, "commit"))?;
        }
        Ok(())
    }

    fn rollback(&mut self) -> StorageResult<()> {
        let conn = self.live()?;
        if !conn.is_autocommit() {
            conn.execute_batch("ROLLBACK")
                .map_err(|e| classify(e, "rollback"))?;
        }
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.conn.is_none()
    }

    fn close(&mut self) -> StorageResult<()> {
        match self.conn.take() {
            Some(conn) => conn.close().map_err(|(_, e)| classify(e, "close")),
            None => Ok(()),
        }
    }
}

/// Where a [`SqliteConnector`] opens its connections
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteTarget {
    File(PathBuf),
    /// Every connection gets its own empty database
    Memory,
}

/// Opens SQLite connections, running optional setup SQL on each
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    target: SqliteTarget,
    init_sql: Option<String>,
}

impl SqliteConnector {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            target: SqliteTarget::File(path.into()),
            init_sql: None,
        }
    }

    pub fn memory() -> Self {
        Self {
            target: SqliteTarget::Memory,
            init_sql: None,
        }
    }

    /// SQL run after each connect, typically `CREATE TABLE IF NOT EXISTS`.
    pub fn with_init_sql(mut self, sql: impl Into<String>) -> Self {
        self.init_sql = Some(sql.into());
        self
    }

    pub fn target(&self) -> &SqliteTarget {
        &self.target
    }

    /// Open a concrete connection.
    pub fn open(&self) -> StorageResult<SqliteConnection> {
        let mut connection = match &self.target {
            SqliteTarget::File(path) => SqliteConnection::open(path)?,
            SqliteTarget::Memory => SqliteConnection::open_in_memory()?,
        };
        if let Some(sql) = &self.init_sql {
            connection.execute_batch(sql)?;
        }
        Ok(connection)
    }
}

impl Connector for SqliteConnector {
    fn connect(&self) -> StorageResult<Box<dyn Connection>> {
        Ok(Box::new(self.open()?))
    }

    fn describe(&self) -> String {
        match &self.target {
            SqliteTarget::File(path) => format!("sqlite:{}", path.display()),
            SqliteTarget::Memory => "sqlite::memory:".to_string(),
        }
    }
}

fn to_sql_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Int32(v) => SqlValue::Integer(i64::from(*v)),
        Value::Int64(v) => SqlValue::Integer(*v),
        Value::Float32(v) => SqlValue::Real(f64::from(*v)),
        Value::Float64(v) => SqlValue::Real(*v),
        Value::Decimal(d) => SqlValue::Text(d.to_string()),
        Value::Text(s) => SqlValue::Text(s.clone()),
        Value::Timestamp(ts) => SqlValue::Text(format_timestamp(ts)),
    }
}

fn from_sql_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Value::Text(String::from_utf8_lossy(bytes).into_owned())
        }
    }
}

/// Map a driver error onto a storage error code.
pub(crate) fn classify(err: rusqlite::Error, context: &str) -> StorageError {
    let sqlite_code = match &err {
        rusqlite::Error::SqliteFailure(failure, _) => Some(failure.code),
        _ => None,
    };
    let code = match sqlite_code {
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => StorageErrorCode::Busy,
        Some(ErrorCode::SystemIoFailure)
        | Some(ErrorCode::CannotOpen)
        | Some(ErrorCode::DiskFull)
        | Some(ErrorCode::FileLockingProtocolFailed) => StorageErrorCode::IoError,
        Some(ErrorCode::ConstraintViolation) => StorageErrorCode::ConstraintViolation,
        _ => StorageErrorCode::StatementFailed,
    };
    let message = err.to_string();
    StorageError::with_source(code, message, err).with_details(context)
}
