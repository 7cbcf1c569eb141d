//! Cluster operation error types.

use thiserror::Error;

/// Cluster operation errors.
#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("connection to {node}/{database} failed: {source}")]
    Connect {
        node: String,
        database: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("connection to {node}/{database} timed out after {secs}s")]
    ConnectTimeout {
        node: String,
        database: String,
        secs: u64,
    },

    #[error("{operation} failed on {node}: {source}")]
    Operation {
        operation: &'static str,
        node: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("backup of {database} failed: {reason}")]
    Backup { database: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for cluster operations.
pub type ClusterResult<T> = std::result::Result<T, ClusterError>;
