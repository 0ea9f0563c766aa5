//! Database error types.
//!
//! Provides error handling for database operations using `thiserror`.

use fieldlens_core::{ErrorCode, FieldLensError};
use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Failed to open or create database connection.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Migration execution failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// Serialization/deserialization of a stored payload failed.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// Underlying `SQLx` error.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// I/O error during database operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<DatabaseError> for FieldLensError {
    fn from(err: DatabaseError) -> Self {
        FieldLensError::new(ErrorCode::StorageError, err.to_string())
    }
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
