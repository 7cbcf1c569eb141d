//! Binding management.

use crate::error::{BrokerError, BrokerResult};
use crate::resolver::CredentialResolver;
use rdpg_core::{Credentials, RecordStatus, Secret, ValidationError};
use rdpg_metadata::MetadataStore;
use rdpg_metadata::models::{BindingRow, CredentialsRow};
use serde::Serialize;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::instrument;

/// An application's access grant to an instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Binding {
    pub instance_id: String,
    pub binding_id: String,
    pub status: RecordStatus,
    /// Absent when the binding row was written but its credentials were not.
    pub credentials: Option<Credentials>,
}

/// Creates, removes and looks up bindings.
pub struct BindingManager {
    metadata: Arc<dyn MetadataStore>,
    resolver: CredentialResolver,
}

impl BindingManager {
    pub fn new(metadata: Arc<dyn MetadataStore>, resolver: CredentialResolver) -> Self {
        Self { metadata, resolver }
    }

    /// Bind an application to an active instance.
    ///
    /// The binding row is written before the credentials row. If the second
    /// write fails the error is returned and the binding row stays in place.
    #[instrument(skip(self))]
    pub async fn create_binding(&self, instance_id: &str, binding_id: &str) -> BrokerResult<Binding> {
        let binding_id = binding_id.to_lowercase();
        if binding_id.is_empty() {
            return Err(ValidationError::BindingIdRequired.into());
        }

        let instance = self
            .metadata
            .get_active_instance(instance_id)
            .await?
            .ok_or_else(|| BrokerError::NotFound(format!("instance {}", instance_id.to_lowercase())))?;
        if self.metadata.get_binding_any(&binding_id).await?.is_some() {
            return Err(BrokerError::AlreadyExists(format!("binding {binding_id}")));
        }

        let credentials = self
            .resolver
            .resolve(&instance.uname, Secret::new(instance.pass.clone()), &instance.dbname)
            .await?;

        let now = OffsetDateTime::now_utc();
        self.metadata
            .create_binding(&BindingRow::new(&instance.instance_id, &binding_id, now))
            .await?;
        self.metadata
            .create_credentials(&CredentialsRow::new(
                &instance.instance_id,
                &binding_id,
                &credentials,
            ))
            .await
            .map_err(BrokerError::Persistence)?;

        tracing::info!(
            instance_id = %instance.instance_id,
            host = %credentials.host,
            port = credentials.port,
            "Binding created"
        );
        Ok(Binding {
            instance_id: instance.instance_id,
            binding_id,
            status: RecordStatus::Active,
            credentials: Some(credentials),
        })
    }

    /// Retire a binding, returning it as it was before removal.
    #[instrument(skip(self))]
    pub async fn remove_binding(&self, binding_id: &str) -> BrokerResult<Binding> {
        let binding = self.find_binding(binding_id).await?;
        let retired = self
            .metadata
            .retire_binding(&binding.binding_id, OffsetDateTime::now_utc())
            .await?;
        if !retired {
            // Retired concurrently between lookup and update.
            return Err(BrokerError::NotFound(format!("binding {}", binding.binding_id)));
        }
        tracing::info!(instance_id = %binding.instance_id, "Binding removed");
        Ok(binding)
    }

    /// Look up an active binding and its credentials.
    pub async fn find_binding(&self, binding_id: &str) -> BrokerResult<Binding> {
        let row = self
            .metadata
            .get_active_binding(binding_id)
            .await?
            .ok_or_else(|| BrokerError::NotFound(format!("binding {}", binding_id.to_lowercase())))?;
        let status = row.status()?;
        let credentials = self
            .metadata
            .get_credentials(&row.instance_id, &row.binding_id)
            .await?
            .map(CredentialsRow::into_credentials)
            .transpose()?;
        Ok(Binding {
            instance_id: row.instance_id,
            binding_id: row.binding_id,
            status,
            credentials,
        })
    }
}
