//! Connection abstraction
//!
//! The storage engine drives any SQL database through [`Connection`]. A
//! [`Connector`] opens fresh connections, which is how a session recovers
//! from a connection that was closed underneath it.
//!
//! Connections run every statement inside an open transaction. The first
//! statement after `commit` or `rollback` starts a new one.

use super::errors::{StorageError, StorageResult};
use super::query::PreparedQuery;
use crate::value::{Row, Value};

/// A live database connection
pub trait Connection {
    /// Prepare a statement ahead of its first execution.
    fn prepare(&mut self, query: &PreparedQuery) -> StorageResult<()>;

    /// Run a query and return its first row, if any.
    ///
    /// Columns are keyed by name. Timestamps and decimals may come back as
    /// text; interpreting them is left to the caller.
    fn query_row(&mut self, query: &PreparedQuery, params: &[Value]) -> StorageResult<Option<Row>>;

    /// Run a statement and return the number of affected rows.
    fn execute(&mut self, query: &PreparedQuery, params: &[Value]) -> StorageResult<usize>;

    fn commit(&mut self) -> StorageResult<()>;

    fn rollback(&mut self) -> StorageResult<()>;

    /// True once the connection can no longer run statements
    fn is_closed(&self) -> bool;

    /// Close the connection. Uncommitted work is discarded.
    fn close(&mut self) -> StorageResult<()>;
}

/// Opens connections for a session
pub trait Connector {
    fn connect(&self) -> StorageResult<Box<dyn Connection>>;

    /// Target description for logs, never containing credentials
    fn describe(&self) -> String;
}

/// Connection held by a session
pub enum ConnectionState {
    Connected(Box<dyn Connection>),
    Closed,
}

impl ConnectionState {
    /// True if a connection is held and still open
    pub fn is_usable(&self) -> bool {
        match self {
            ConnectionState::Connected(connection) => !connection.is_closed(),
            ConnectionState::Closed => false,
        }
    }

    pub fn connection_mut(&mut self) -> StorageResult<&mut dyn Connection> {
        match self {
            ConnectionState::Connected(connection) => Ok(connection.as_mut()),
            ConnectionState::Closed => Err(StorageError::connection_closed()),
        }
    }

    /// Release the connection, closing it if still open.
    pub fn close(&mut self) -> StorageResult<()> {
        match std::mem::replace(self, ConnectionState::Closed) {
            ConnectionState::Connected(mut connection) if !connection.is_closed() => {
                connection.close()
            }
            _ => Ok(()),
        }
    }
}

impl std::fmt::Debug for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionState::Connected(connection) => f
                .debug_struct("Connected")
                .field("closed", &connection.is_closed())
                .finish(),
            ConnectionState::Closed => f.write_str("Closed"),
        }
    }
}
