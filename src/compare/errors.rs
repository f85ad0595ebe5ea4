//! Compare error types

use thiserror::Error;

use crate::storage::StorageError;

/// Errors raised while deciding the status of a row
#[derive(Debug, Error)]
pub enum CompareError {
    /// A value cannot be read as the field's declared type
    #[error("field '{field}' is declared {expected} but holds {found}")]
    FieldTypeMismatch {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    /// Looking up stored versions failed
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Result type for compare operations
pub type CompareResult<T> = Result<T, CompareError>;
