//! Error types for the Compass core crate.

use thiserror::Error;

/// Top-level error type for all Compass core operations.
#[derive(Debug, Error)]
pub enum CompassError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("password hashing error: {0}")]
    PasswordHash(String),
}

impl CompassError {
    /// True when the error wraps a SQLite UNIQUE constraint violation.
    pub fn is_unique_violation(&self) -> bool {
        match self {
            CompassError::Database(sqlx::Error::Database(db)) => db.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for CompassError {
    fn from(e: serde_json::Error) -> Self {
        CompassError::Serialization(e.to_string())
    }
}

/// A convenience Result alias that defaults to [`CompassError`].
pub type Result<T> = std::result::Result<T, CompassError>;
