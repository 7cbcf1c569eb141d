//! Client endpoint resolution.

use crate::error::{BrokerError, BrokerResult};
use rdpg_cluster::ClusterOps;
use rdpg_core::{Credentials, EndpointPolicy, Secret};
use std::sync::Arc;

/// Turns an instance's role and database into connection credentials for
/// the node the endpoint policy picks.
pub struct CredentialResolver {
    cluster: Arc<dyn ClusterOps>,
    policy: Box<dyn EndpointPolicy>,
}

impl CredentialResolver {
    pub fn new(cluster: Arc<dyn ClusterOps>, policy: Box<dyn EndpointPolicy>) -> Self {
        Self { cluster, policy }
    }

    pub async fn resolve(
        &self,
        username: &str,
        password: Secret,
        database: &str,
    ) -> BrokerResult<Credentials> {
        let nodes = self
            .cluster
            .list_nodes()
            .await
            .map_err(|source| BrokerError::ExternalOperation {
                step: "list_nodes",
                source,
            })?;
        let endpoint = self.policy.select(&nodes).map_err(BrokerError::Resolve)?;
        tracing::debug!(
            endpoint = %endpoint,
            policy = self.policy.name(),
            "Resolved client endpoint"
        );
        Ok(Credentials::new(endpoint, username, password, database))
    }
}
