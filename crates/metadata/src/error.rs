//! Metadata store error types.

use rdpg_cluster::ClusterError;
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

    #[error(transparent)]
    Connection(#[from] ClusterError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MetadataError {
    /// Classify an insert failure, turning unique and foreign-key violations
    /// into domain errors.
    pub(crate) fn from_insert(err: sqlx::Error, what: impl FnOnce() -> String) -> Self {
        match err.as_database_error() {
            Some(db_err) if db_err.is_unique_violation() => Self::AlreadyExists(what()),
            Some(db_err) if db_err.is_foreign_key_violation() => {
                Self::Constraint(format!("{}: {}", what(), db_err.message()))
            }
            _ => Self::Database(err),
        }
    }
}

/// Result type for metadata operations.
pub type MetadataResult<T> = std::result::Result<T, MetadataError>;
