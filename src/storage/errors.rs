//! Storage error types
//!
//! Error codes:
//! - VERSIONING_STORAGE_CONNECTION_CLOSED (ERROR, transient)
//! - VERSIONING_STORAGE_CONNECT_FAILED (ERROR, transient)
//! - VERSIONING_STORAGE_BUSY (ERROR, transient)
//! - VERSIONING_STORAGE_IO_ERROR (ERROR, transient)
//! - VERSIONING_STORAGE_STATEMENT_FAILED (ERROR)
//! - VERSIONING_STORAGE_CONSTRAINT_VIOLATION (ERROR)
//! - VERSIONING_STORAGE_MISCONFIGURED (FATAL)
//! - VERSIONING_STORAGE_INVALID_DATA (FATAL)
//!
//! Transient errors concern connectivity. They are the only errors a
//! versioning session may survive, and only when the recovery callback
//! accepts them.

use std::error::Error as StdError;
use std::fmt;

/// Severity levels for storage errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    /// Operation fails, the caller decides what happens next
    Error,
    /// Configuration or stored data is unusable
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Fatal => write!(f, "FATAL"),
        }
    }
}

/// Storage-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageErrorCode {
    /// Operation attempted on a closed connection
    ConnectionClosed,
    /// A connection could not be established
    ConnectFailed,
    /// Database busy or locked by another writer
    Busy,
    /// Driver-level I/O failure
    IoError,
    /// Statement could not be prepared or executed
    StatementFailed,
    /// Statement violated a table constraint
    ConstraintViolation,
    /// The table layout cannot produce the requested statement
    Misconfigured,
    /// A stored row cannot be interpreted
    InvalidData,
}

impl StorageErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            StorageErrorCode::ConnectionClosed => "VERSIONING_STORAGE_CONNECTION_CLOSED",
            StorageErrorCode::ConnectFailed => "VERSIONING_STORAGE_CONNECT_FAILED",
            StorageErrorCode::Busy => "VERSIONING_STORAGE_BUSY",
            StorageErrorCode::IoError => "VERSIONING_STORAGE_IO_ERROR",
            StorageErrorCode::StatementFailed => "VERSIONING_STORAGE_STATEMENT_FAILED",
            StorageErrorCode::ConstraintViolation => "VERSIONING_STORAGE_CONSTRAINT_VIOLATION",
            StorageErrorCode::Misconfigured => "VERSIONING_STORAGE_MISCONFIGURED",
            StorageErrorCode::InvalidData => "VERSIONING_STORAGE_INVALID_DATA",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            StorageErrorCode::Misconfigured | StorageErrorCode::InvalidData => Severity::Fatal,
            _ => Severity::Error,
        }
    }

    /// Returns true for connectivity errors a session may recover from
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            StorageErrorCode::ConnectionClosed
                | StorageErrorCode::ConnectFailed
                | StorageErrorCode::Busy
                | StorageErrorCode::IoError
        )
    }
}

impl fmt::Display for StorageErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

type Source = Box<dyn StdError + Send + Sync + 'static>;

/// Storage error with code, message and the driver error that caused it
#[derive(Debug)]
pub struct StorageError {
    code: StorageErrorCode,
    message: String,
    details: Option<String>,
    source: Option<Source>,
}

impl StorageError {
    /// Create an error with an explicit code and no source
    pub fn new(code: StorageErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: None,
        }
    }

    /// Create an error with an explicit code and a driver source
    pub fn with_source(
        code: StorageErrorCode,
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            source: Some(Box::new(source)),
        }
    }

    /// Operation attempted on a closed connection
    pub fn connection_closed() -> Self {
        Self::new(StorageErrorCode::ConnectionClosed, "connection is closed")
    }

    /// A connection could not be established
    pub fn connect_failed(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::with_source(StorageErrorCode::ConnectFailed, message, source)
    }

    /// The layout cannot produce a statement
    pub fn misconfigured(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::Misconfigured, message)
    }

    /// A stored row cannot be interpreted
    pub fn invalid_data(message: impl Into<String>) -> Self {
        Self::new(StorageErrorCode::InvalidData, message)
    }

    /// Attach context such as the statement kind
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn code(&self) -> StorageErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    pub fn is_transient(&self) -> bool {
        self.code.is_transient()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }
}

impl fmt::Display for StorageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.code.severity(),
            self.code.code(),
            self.message
        )?;
        if let Some(ref details) = self.details {
            write!(f, " ({})", details)?;
        }
        Ok(())
    }
}

impl StdError for StorageError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
