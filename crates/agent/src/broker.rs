//! Tenant-facing facade over the provisioner, binding manager and
//! bootstrapper.

use crate::bindings::{Binding, BindingManager};
use crate::bootstrap::{BootstrapReport, Bootstrapper};
use crate::error::{BrokerError, BrokerResult};
use crate::provision::{Provisioner, RemovalOutcome};
use crate::resolver::CredentialResolver;
use rdpg_cluster::ClusterOps;
use rdpg_core::Instance;
use rdpg_core::config::{AppConfig, ProvisioningConfig};
use rdpg_metadata::{MetadataStore, PgSchemaConnector, SchemaCatalog};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

pub struct Broker {
    metadata: Arc<dyn MetadataStore>,
    provisioner: Provisioner,
    bindings: BindingManager,
    bootstrapper: Bootstrapper,
}

impl Broker {
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        metadata: Arc<dyn MetadataStore>,
        bootstrapper: Bootstrapper,
        config: &ProvisioningConfig,
    ) -> Self {
        let resolver =
            CredentialResolver::new(cluster.clone(), config.endpoint_selection.policy());
        Self {
            provisioner: Provisioner::new(cluster, metadata.clone(), config.clone()),
            bindings: BindingManager::new(metadata.clone(), resolver),
            metadata,
            bootstrapper,
        }
    }

    /// Wire up the BDR cluster, the Postgres metadata store and the schema
    /// connector from configuration.
    pub async fn from_config(config: &AppConfig) -> BrokerResult<Self> {
        config.validate().map_err(BrokerError::Config)?;

        let cluster = rdpg_cluster::from_config(&config.cluster)
            .map_err(|e| BrokerError::Config(e.to_string()))?;
        let metadata = rdpg_metadata::from_config(&config.control)
            .await
            .map_err(BrokerError::Persistence)?;
        let connector = PgSchemaConnector::from_config(&config.control, &config.cluster)
            .map_err(BrokerError::Persistence)?;
        let bootstrapper = Bootstrapper::new(
            Arc::new(connector),
            cluster.clone(),
            SchemaCatalog::standard(),
            config.bootstrap.clone(),
        )?;

        tracing::info!(
            cluster = cluster.backend_name(),
            metadata = metadata.backend_name(),
            endpoint_selection = ?config.provisioning.endpoint_selection,
            "Broker initialized"
        );
        Ok(Self::new(cluster, metadata, bootstrapper, &config.provisioning))
    }

    /// Validate tenant input into an unprovisioned instance.
    pub fn new_instance(
        &self,
        instance_id: &str,
        service_id: &str,
        plan_id: &str,
        organization_id: &str,
        space_id: &str,
    ) -> BrokerResult<Instance> {
        Ok(Instance::new(
            instance_id,
            service_id,
            plan_id,
            organization_id,
            space_id,
        )?)
    }

    pub async fn provision(
        &self,
        instance: Instance,
        cancel: &CancellationToken,
    ) -> BrokerResult<Instance> {
        self.provisioner.provision(instance, cancel).await
    }

    pub async fn remove(
        &self,
        instance_id: &str,
        cancel: &CancellationToken,
    ) -> BrokerResult<RemovalOutcome> {
        let instance = self.find_instance(instance_id).await?;
        self.provisioner.remove(&instance, cancel).await
    }

    /// Active instance by id, case-insensitive.
    pub async fn find_instance(&self, instance_id: &str) -> BrokerResult<Instance> {
        let row = self
            .metadata
            .get_active_instance(instance_id)
            .await?
            .ok_or_else(|| {
                BrokerError::NotFound(format!("instance {}", instance_id.to_lowercase()))
            })?;
        Ok(row.into_instance()?)
    }

    pub async fn create_binding(&self, instance_id: &str, binding_id: &str) -> BrokerResult<Binding> {
        self.bindings.create_binding(instance_id, binding_id).await
    }

    pub async fn remove_binding(&self, binding_id: &str) -> BrokerResult<Binding> {
        self.bindings.remove_binding(binding_id).await
    }

    pub async fn find_binding(&self, binding_id: &str) -> BrokerResult<Binding> {
        self.bindings.find_binding(binding_id).await
    }

    pub async fn init_schema(&self, cancel: &CancellationToken) -> BrokerResult<BootstrapReport> {
        Ok(self.bootstrapper.run(cancel).await?)
    }

    pub async fn health_check(&self) -> BrokerResult<()> {
        Ok(self.metadata.health_check().await?)
    }
}
