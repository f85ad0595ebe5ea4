//! Field classification errors

use thiserror::Error;

/// Result type for classification operations
pub type FieldResult<T> = Result<T, FieldError>;

/// Classification and row conversion errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FieldError {
    #[error("Field classified more than once: {0}")]
    Duplicate(String),

    #[error("At least one id field is required")]
    NoIdentifier,

    #[error("Field '{0}' collides with a versioning bookkeeping column")]
    Reserved(String),

    #[error("Field name must not be empty")]
    EmptyName,

    #[error("Field '{field}' expects {expected}, got JSON {found}")]
    InvalidJsonValue {
        field: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Row must be a JSON object")]
    NotAnObject,
}
