//! Cluster operations trait definition.

use crate::error::ClusterResult;
use async_trait::async_trait;
use rdpg_core::{Node, Secret};

/// Administrative operations against the database cluster.
///
/// Implementations own the mechanics of reaching every node and of
/// replication-group membership; callers only sequence the calls.
/// Teardown operations (`disable_database` through `drop_role`) are
/// best-effort: callers record failures but keep going.
#[async_trait]
pub trait ClusterOps: Send + Sync {
    /// Create a login role with the given password on every node.
    async fn create_role(&self, name: &str, secret: &Secret) -> ClusterResult<()>;

    /// Create a database owned by `owner` on every node.
    async fn create_database(&self, name: &str, owner: &str) -> ClusterResult<()>;

    /// Make the database a member of the cluster's replication group.
    async fn add_to_replication_group(&self, database: &str) -> ClusterResult<()>;

    /// Stop the database from accepting new client connections.
    async fn disable_database(&self, name: &str) -> ClusterResult<()>;

    /// Take a backup of the database, if backups are configured.
    async fn backup_database(&self, name: &str) -> ClusterResult<()>;

    /// Drop the database on every node.
    async fn drop_database(&self, name: &str) -> ClusterResult<()>;

    /// Drop the role on every node.
    async fn drop_role(&self, name: &str) -> ClusterResult<()>;

    /// Current topology, in a stable order.
    async fn list_nodes(&self) -> ClusterResult<Vec<Node>>;

    /// Block until the local node reports it has caught up with the cluster.
    async fn wait_for_replication_ready(&self) -> ClusterResult<()>;

    /// Get a human-readable name for this backend.
    fn backend_name(&self) -> &'static str;
}
