//! # Persistence Error Types
//!
//! Every repository operation returns one of these instead of panicking.
//! Losing a chunk write silently would orphan its children, so nothing here
//! is swallowed.

use delve_core::ModelError;
use thiserror::Error;

/// Errors that can occur in the persistence layer.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// The SQLite driver reported an error.
    #[error("sqlite error: {0}")]
    Sqlite(rusqlite::Error),

    /// A structured column could not be (de)serialized.
    #[error("serde error: {0}")]
    Serde(#[from] serde_json::Error),

    /// A persisted tag no longer maps onto the model.
    #[error("corrupt record: {0}")]
    Model(#[from] ModelError),

    /// A row references a parent that is not stored yet.
    #[error("{child} references missing parent {parent}")]
    MissingParent {
        /// Row being written.
        child: String,
        /// Missing referenced row.
        parent: String,
    },

    /// An update targeted a row that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The store rejected the write (unique or foreign-key constraint).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// The store cannot be reached.
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

impl From<rusqlite::Error> for PersistenceError {
    fn from(value: rusqlite::Error) -> Self {
        match value {
            rusqlite::Error::SqliteFailure(code, message)
                if code.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Self::Constraint(message.unwrap_or_else(|| code.to_string()))
            }
            rusqlite::Error::SqliteFailure(code, message)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::CannotOpen
                        | rusqlite::ErrorCode::DatabaseBusy
                        | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                Self::Unavailable(message.unwrap_or_else(|| code.to_string()))
            }
            other => Self::Sqlite(other),
        }
    }
}

/// Result type for persistence operations.
pub type PersistenceResult<T> = Result<T, PersistenceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constraint_failures_are_classified() {
        let raw = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_CONSTRAINT),
            Some("FOREIGN KEY constraint failed".to_string()),
        );
        assert!(matches!(
            PersistenceError::from(raw),
            PersistenceError::Constraint(msg) if msg.contains("FOREIGN KEY")
        ));
    }

    #[test]
    fn test_busy_is_unavailable() {
        let raw = rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_BUSY),
            None,
        );
        assert!(matches!(
            PersistenceError::from(raw),
            PersistenceError::Unavailable(_)
        ));
    }
}
