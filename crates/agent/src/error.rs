//! Agent error types.

use crate::bootstrap::BootstrapError;
use crate::provision::{CompensationReport, ProvisionStep, TeardownReport};
use rdpg_cluster::ClusterError;
use rdpg_core::ValidationError;
use rdpg_metadata::MetadataError;
use thiserror::Error;

/// Why a single provisioning step did not complete.
#[derive(Debug, Error)]
pub enum StepFailure {
    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),

    #[error("operation cancelled")]
    Cancelled,
}

/// A provisioning run that stopped after at least one step had succeeded.
#[derive(Debug, Error)]
#[error(
    "instance {instance_id}: step {failed} failed after {} completed step(s): {source}",
    .completed.len()
)]
pub struct PartialProvision {
    pub instance_id: String,
    pub failed: ProvisionStep,
    pub completed: Vec<ProvisionStep>,
    /// Undo results, including the failed step when it was a role or
    /// database create. `None` when compensation is disabled or the run was
    /// cancelled.
    pub compensation: Option<CompensationReport>,
    #[source]
    pub source: StepFailure,
}

/// Errors returned by tenant-facing operations.
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("database {database} for instance {instance_id} is already owned by instance {owner}")]
    IdentifierCollision {
        instance_id: String,
        database: String,
        owner: String,
    },

    #[error("{step} failed: {source}")]
    ExternalOperation {
        step: &'static str,
        #[source]
        source: ClusterError,
    },

    #[error("persistence failed: {0}")]
    Persistence(MetadataError),

    #[error(transparent)]
    PartiallyProvisioned(Box<PartialProvision>),

    #[error("cannot resolve client endpoint: {0}")]
    Resolve(#[source] rdpg_core::Error),

    #[error("schema bootstrap failed: {0}")]
    Bootstrap(#[from] BootstrapError),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("operation cancelled")]
    Cancelled,

    /// Removal stopped between teardown actions; `teardown` holds the
    /// actions that already ran.
    #[error("removal of instance {instance_id} cancelled after {} teardown step(s)", .teardown.steps.len())]
    RemovalCancelled {
        instance_id: String,
        teardown: TeardownReport,
    },
}

impl BrokerError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::NotFound(_) => "not_found",
            Self::AlreadyExists(_) => "already_exists",
            Self::IdentifierCollision { .. } => "identifier_collision",
            Self::ExternalOperation { .. } => "external_operation",
            Self::Persistence(_) => "persistence",
            Self::PartiallyProvisioned(_) => "partially_provisioned",
            Self::Resolve(_) => "resolve",
            Self::Bootstrap(_) => "bootstrap",
            Self::Config(_) => "config",
            Self::Cancelled | Self::RemovalCancelled { .. } => "cancelled",
        }
    }
}

impl From<MetadataError> for BrokerError {
    fn from(err: MetadataError) -> Self {
        match err {
            MetadataError::NotFound(what) => Self::NotFound(what),
            MetadataError::AlreadyExists(what) => Self::AlreadyExists(what),
            other => Self::Persistence(other),
        }
    }
}

impl From<PartialProvision> for BrokerError {
    fn from(partial: PartialProvision) -> Self {
        Self::PartiallyProvisioned(Box::new(partial))
    }
}

/// Result type for tenant-facing operations.
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;
