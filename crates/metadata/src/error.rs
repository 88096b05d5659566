//! Metadata store error types.

use guideforge_core::OrderingError;
use thiserror::Error;

/// Metadata store operation errors.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid step order: {0}")]
    Ordering(#[from] OrderingError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    pub(crate) fn not_found(entity: &str, id: i64) -> Self {
        Self::NotFound(format!("{entity} {id}"))
    }

    /// Map a unique-constraint violation to `AlreadyExists`, passing other errors through.
    pub(crate) fn from_unique(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::AlreadyExists(what())
            }
            _ => Self::Database(err),
        }
    }

    /// Map a foreign-key violation on insert to `NotFound` for the missing
    /// parent row, passing other errors through.
    pub(crate) fn from_missing_parent(err: sqlx::Error, parent: impl FnOnce() -> String) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                Self::NotFound(parent())
            }
            _ => Self::Database(err),
        }
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(e: std::io::Error) -> Self {
        MetadataError::Config(e.to_string())
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
