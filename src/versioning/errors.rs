//! Versioning error types

use thiserror::Error;

use crate::compare::{CompareError, RowStatus};
use crate::fields::FieldError;
use crate::storage::StorageError;

/// Errors surfaced by a versioning session
#[derive(Debug, Error)]
pub enum VersioningError {
    /// Options are unusable
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Only `identical` and `purged` may be forced
    #[error("status '{0}' not allowed")]
    StatusNotAllowed(RowStatus),

    /// An identifier field is absent or null
    #[error("identifier field '{0}' is missing")]
    MissingIdentifier(String),

    /// A value cannot be read as its field's declared type
    #[error("field '{field}' is declared {expected} but holds {found}")]
    FieldTypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The session was closed by `finish`, `close` or a fatal error
    #[error("versioning session is closed")]
    SessionClosed,
}

impl VersioningError {
    /// True for connectivity failures a recovery callback may accept
    pub fn is_recoverable(&self) -> bool {
        matches!(self, VersioningError::Storage(e) if e.is_transient())
    }
}

impl From<CompareError> for VersioningError {
    fn from(err: CompareError) -> Self {
        match err {
            CompareError::FieldTypeMismatch {
                field,
                expected,
                found,
            } => VersioningError::FieldTypeMismatch {
                field,
                expected,
                found,
            },
            CompareError::Storage(e) => VersioningError::Storage(e),
        }
    }
}

impl From<FieldError> for VersioningError {
    fn from(err: FieldError) -> Self {
        VersioningError::Config(err.to_string())
    }
}

/// Result type for versioning operations
pub type Result<T> = std::result::Result<T, VersioningError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageErrorCode;

    #[test]
    fn test_only_transient_storage_errors_are_recoverable() {
        let closed = VersioningError::from(StorageError::connection_closed());
        assert!(closed.is_recoverable());

        let statement = VersioningError::from(StorageError::new(
            StorageErrorCode::StatementFailed,
            "no such table",
        ));
        assert!(!statement.is_recoverable());

        assert!(!VersioningError::SessionClosed.is_recoverable());
        assert!(!VersioningError::MissingIdentifier("id".into()).is_recoverable());
    }

    #[test]
    fn test_compare_errors_convert() {
        let err = VersioningError::from(CompareError::FieldTypeMismatch {
            field: "price".into(),
            expected: "decimal",
            found: "bool",
        });
        assert!(matches!(err, VersioningError::FieldTypeMismatch { .. }));
        assert_eq!(
            err.to_string(),
            "field 'price' is declared decimal but holds bool"
        );
    }

    #[test]
    fn test_status_not_allowed_display() {
        let err = VersioningError::StatusNotAllowed(RowStatus::Changed);
        assert_eq!(err.to_string(), "status 'changed' not allowed");
    }
}
