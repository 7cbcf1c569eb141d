//! Error types for the core domain.

use thiserror::Error;

/// Validation failures raised while building an instance from tenant input.
///
/// These are caller-fixable and always returned before any side effect.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("service id is required")]
    ServiceIdRequired,

    #[error("plan id is required")]
    PlanIdRequired,

    #[error("organization id is required")]
    OrganizationIdRequired,

    #[error("space id is required")]
    SpaceIdRequired,

    #[error("instance id {0:?} contains no usable identifier characters")]
    InvalidInstanceId(String),

    #[error("binding id is required")]
    BindingIdRequired,
}

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid record status: {0}")]
    InvalidStatus(String),

    #[error("empty cluster topology: no node available for client connections")]
    EmptyTopology,

    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
