// DDS Ledger - Error types
//
// Domain errors are caller-input failures detected before any write.
// `Storage` and `Unavailable` are infrastructure failures and the only
// kinds a caller may reasonably retry.

use thiserror::Error;

/// Result type alias for DDS operations.
pub type Result<T, E = DdsError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DdsError {
    /// A supplied foreign-key id does not resolve to a row
    #[error("{entity} {id} does not exist")]
    ReferenceNotFound { entity: &'static str, id: i64 },

    /// The targeted entry does not exist
    #[error("entry {0} not found")]
    EntryNotFound(i64),

    /// Uniqueness violation on a reference name
    #[error("{entity} named {name:?} already exists")]
    DuplicateName { entity: &'static str, name: String },

    /// Amount is zero, negative or not a finite number
    #[error("amount must be a positive number, got {0}")]
    InvalidAmount(f64),

    /// Malformed filter input (bad date, bad id, unknown order)
    #[error("invalid filter: {0}")]
    InvalidFilter(String),

    /// Date outside the four-digit-year range that sorts correctly as text
    #[error("invalid date: {0}")]
    InvalidDate(String),

    /// Request body could not be read into the expected shape
    #[error("invalid request body: {0}")]
    InvalidBody(String),

    /// Reference names must contain something other than whitespace
    #[error("name must not be empty")]
    InvalidName,

    /// Category does not belong to the type, or subcategory to the category
    #[error("inconsistent classification: {0}")]
    HierarchyMismatch(String),

    /// Underlying SQLite failure
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// The storage handle could not be acquired
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl DdsError {
    pub fn reference_not_found(entity: &'static str, id: i64) -> Self {
        DdsError::ReferenceNotFound { entity, id }
    }

    pub fn duplicate_name(entity: &'static str, name: impl Into<String>) -> Self {
        DdsError::DuplicateName {
            entity,
            name: name.into(),
        }
    }

    /// Infrastructure failures may be retried; input errors never succeed on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DdsError::Storage(_) | DdsError::Unavailable(_))
    }
}

/// True when `err` is an SQLite constraint violation (UNIQUE, FOREIGN KEY, CHECK).
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}
