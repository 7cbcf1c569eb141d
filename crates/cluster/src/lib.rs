//! Cluster operations for the rdpg agent.
//!
//! This crate provides:
//! - The [`ClusterOps`] capability used to create and tear down tenant roles
//!   and databases and to manage replication-group membership
//! - Administrative connection helpers for individual nodes
//! - Backends: BDR multi-master PostgreSQL

pub mod backends;
pub mod connect;
pub mod error;
pub mod traits;

pub use backends::bdr::BdrCluster;
pub use error::{ClusterError, ClusterResult};
pub use traits::ClusterOps;

use rdpg_core::config::ClusterConfig;
use std::sync::Arc;

/// Create the cluster backend from configuration.
pub fn from_config(config: &ClusterConfig) -> ClusterResult<Arc<dyn ClusterOps>> {
    config.validate().map_err(ClusterError::Config)?;
    let backend = BdrCluster::new(config.clone())?;
    tracing::info!(
        backend = backend.backend_name(),
        nodes = config.nodes.len(),
        "Cluster backend initialized"
    );
    Ok(Arc::new(backend))
}
