//! Database error types

use thiserror::Error;

/// Database operation errors
#[derive(Debug, Error)]
pub enum DbError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Competition is full (max {max} participants)")]
    CapacityExceeded { max: i32 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Corrupt row: {0}")]
    CorruptRow(String),

    #[error("Transaction error: {0}")]
    Transaction(String),
}

impl From<perpsarena_types::ParseEnumError> for DbError {
    fn from(e: perpsarena_types::ParseEnumError) -> Self {
        DbError::CorruptRow(e.to_string())
    }
}

/// Result type for database operations
pub type DbResult<T> = Result<T, DbError>;
