//! Version storage for SCD type-2 tables
//!
//! The storage layer owns the database side of a versioning session:
//! statement construction, the connection, transaction batching and
//! rollback recovery. It never decides what happens to a row; the
//! versioning layer tells it which statements to run.
//!
//! # Design Principles
//!
//! - One open transaction at a time, committed every `commit_size` rows
//! - A row's writes are never split across transactions
//! - Statements are built once per session and cached by kind
//! - Connectivity failures are transient, everything else is not
//!
//! ```ignore
//! let connector = SqliteConnector::file("warehouse.db");
//! let mut storage = VersionStorage::open(layout, 100, Box::new(connector))?;
//! if storage.get_active_version(&row, now)?.is_none() {
//!     storage.insert_version(&row)?;
//! }
//! storage.commit()?;
//! ```

mod batch;
mod connection;
mod engine;
mod errors;
mod query;
mod record;
mod sqlite;

pub use batch::{TransactionBatch, DEFAULT_COMMIT_SIZE};
pub use connection::{Connection, ConnectionState, Connector};
pub use engine::{RecoveryCallback, VersionStorage};
pub use errors::{Severity, StorageError, StorageErrorCode, StorageResult};
pub use query::{IdentifierQuote, Param, PreparedQuery, QueryFactory, QueryKind, TableLayout};
pub use record::VersionedRecord;
pub use sqlite::{SqliteConnection, SqliteConnector, SqliteTarget};
