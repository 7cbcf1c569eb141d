//! In-memory implementation of the metadata store.
//!
//! State lives in `HashMap`s behind a single `tokio::sync::RwLock`, so every
//! mutation is atomic with respect to other callers in the same process.
//! Nothing is durable. The store mirrors the uniqueness and lower-casing rules
//! of the `cfsb` tables so the provisioning code behaves the same against
//! either backend; it backs the agent's tests and dry runs.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{BindingRow, CredentialsRow, InstanceRow, ProvisionStepRow};
use crate::repos::{BindingRepo, InstanceRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use rdpg_core::RecordStatus;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    instances: HashMap<String, InstanceRow>,
    bindings: HashMap<String, BindingRow>,
    credentials: HashMap<(String, String), CredentialsRow>,
    steps: Vec<ProvisionStepRow>,
}

/// Process-local metadata store.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn is_active(status: &str) -> bool {
    status == RecordStatus::Active.as_str()
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn health_check(&self) -> MetadataResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl InstanceRepo for MemoryStore {
    async fn create_instance(&self, instance: &InstanceRow) -> MetadataResult<()> {
        let key = instance.instance_id.to_lowercase();
        let mut state = self.state.write().await;
        if state.instances.contains_key(&key) {
            return Err(MetadataError::AlreadyExists(format!("instance {key}")));
        }
        let mut row = instance.clone();
        row.instance_id = key.clone();
        state.instances.insert(key, row);
        Ok(())
    }

    async fn get_active_instance(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>> {
        let state = self.state.read().await;
        Ok(state
            .instances
            .get(&instance_id.to_lowercase())
            .filter(|row| is_active(&row.status))
            .cloned())
    }

    async fn get_instance_any(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>> {
        let state = self.state.read().await;
        Ok(state.instances.get(&instance_id.to_lowercase()).cloned())
    }

    async fn get_active_instance_by_database(
        &self,
        dbname: &str,
    ) -> MetadataResult<Option<InstanceRow>> {
        let state = self.state.read().await;
        Ok(state
            .instances
            .values()
            .find(|row| row.dbname == dbname && is_active(&row.status))
            .cloned())
    }

    async fn retire_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        let mut state = self.state.write().await;
        match state.instances.get_mut(&instance_id.to_lowercase()) {
            Some(row) if is_active(&row.status) => {
                row.status = RecordStatus::Retired.as_str().to_string();
                row.ineffective_at = Some(retired_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn record_provision_step(&self, step: &ProvisionStepRow) -> MetadataResult<()> {
        self.state.write().await.steps.push(step.clone());
        Ok(())
    }

    async fn list_provision_steps(
        &self,
        instance_id: &str,
    ) -> MetadataResult<Vec<ProvisionStepRow>> {
        let instance_id = instance_id.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .steps
            .iter()
            .filter(|step| step.instance_id == instance_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl BindingRepo for MemoryStore {
    async fn create_binding(&self, binding: &BindingRow) -> MetadataResult<()> {
        let key = binding.binding_id.to_lowercase();
        let mut state = self.state.write().await;
        if !state.instances.contains_key(&binding.instance_id) {
            return Err(MetadataError::Constraint(format!(
                "binding {key}: unknown instance {}",
                binding.instance_id
            )));
        }
        if state.bindings.contains_key(&key) {
            return Err(MetadataError::AlreadyExists(format!("binding {key}")));
        }
        let mut row = binding.clone();
        row.binding_id = key.clone();
        state.bindings.insert(key, row);
        Ok(())
    }

    async fn create_credentials(&self, credentials: &CredentialsRow) -> MetadataResult<()> {
        let key = (
            credentials.instance_id.clone(),
            credentials.binding_id.to_lowercase(),
        );
        let mut state = self.state.write().await;
        if state.credentials.contains_key(&key) {
            return Err(MetadataError::AlreadyExists(format!(
                "credentials for binding {}",
                key.1
            )));
        }
        let mut row = credentials.clone();
        row.binding_id = key.1.clone();
        state.credentials.insert(key, row);
        Ok(())
    }

    async fn get_active_binding(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>> {
        let state = self.state.read().await;
        Ok(state
            .bindings
            .get(&binding_id.to_lowercase())
            .filter(|row| is_active(&row.status))
            .cloned())
    }

    async fn get_binding_any(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>> {
        let state = self.state.read().await;
        Ok(state.bindings.get(&binding_id.to_lowercase()).cloned())
    }

    async fn get_credentials(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> MetadataResult<Option<CredentialsRow>> {
        let key = (instance_id.to_lowercase(), binding_id.to_lowercase());
        Ok(self.state.read().await.credentials.get(&key).cloned())
    }

    async fn retire_binding(
        &self,
        binding_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        let mut state = self.state.write().await;
        match state.bindings.get_mut(&binding_id.to_lowercase()) {
            Some(row) if is_active(&row.status) => {
                row.status = RecordStatus::Retired.as_str().to_string();
                row.ineffective_at = Some(retired_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn retire_bindings_for_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<u64> {
        let instance_id = instance_id.to_lowercase();
        let mut state = self.state.write().await;
        let mut retired = 0;
        for row in state.bindings.values_mut() {
            if row.instance_id == instance_id && is_active(&row.status) {
                row.status = RecordStatus::Retired.as_str().to_string();
                row.ineffective_at = Some(retired_at);
                retired += 1;
            }
        }
        Ok(retired)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdpg_core::{Instance, Secret};

    fn row(id: &str) -> InstanceRow {
        let instance = Instance::new(id, "svc", "plan", "org", "space").unwrap();
        InstanceRow::new(&instance, &Secret::new("pw"), OffsetDateTime::now_utc())
    }

    #[tokio::test]
    async fn test_instance_lookup_is_case_insensitive() {
        let store = MemoryStore::new();
        store.create_instance(&row("Acme-1")).await.unwrap();

        let found = store.get_active_instance("ACME-1").await.unwrap().unwrap();
        assert_eq!(found.instance_id, "acme-1");
        assert!(
            store
                .get_active_instance_by_database("dacme1")
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_duplicate_instance_rejected_even_after_retire() {
        let store = MemoryStore::new();
        store.create_instance(&row("acme-1")).await.unwrap();
        assert!(
            store
                .retire_instance("acme-1", OffsetDateTime::now_utc())
                .await
                .unwrap()
        );

        let err = store.create_instance(&row("ACME-1")).await.unwrap_err();
        assert!(matches!(err, MetadataError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_retired_instance_hidden_from_active_lookups() {
        let store = MemoryStore::new();
        store.create_instance(&row("acme-1")).await.unwrap();
        let now = OffsetDateTime::now_utc();
        assert!(store.retire_instance("acme-1", now).await.unwrap());
        assert!(!store.retire_instance("acme-1", now).await.unwrap());

        assert!(store.get_active_instance("acme-1").await.unwrap().is_none());
        assert!(
            store
                .get_active_instance_by_database("dacme1")
                .await
                .unwrap()
                .is_none()
        );
        let kept = store.get_instance_any("acme-1").await.unwrap().unwrap();
        assert_eq!(kept.status, "retired");
        assert_eq!(kept.ineffective_at, Some(now));
    }

    #[tokio::test]
    async fn test_binding_requires_known_instance() {
        let store = MemoryStore::new();
        let binding = BindingRow::new("acme-1", "b1", OffsetDateTime::now_utc());
        let err = store.create_binding(&binding).await.unwrap_err();
        assert!(matches!(err, MetadataError::Constraint(_)));
    }

    #[tokio::test]
    async fn test_retire_bindings_for_instance() {
        let store = MemoryStore::new();
        store.create_instance(&row("acme-1")).await.unwrap();
        store.create_instance(&row("acme-2")).await.unwrap();
        let now = OffsetDateTime::now_utc();
        for (instance, binding) in [("acme-1", "B1"), ("acme-1", "b2"), ("acme-2", "b3")] {
            store
                .create_binding(&BindingRow::new(instance, binding, now))
                .await
                .unwrap();
        }

        assert_eq!(store.retire_bindings_for_instance("acme-1", now).await.unwrap(), 2);
        assert!(store.get_active_binding("b1").await.unwrap().is_none());
        assert!(store.get_binding_any("b1").await.unwrap().is_some());
        assert!(store.get_active_binding("B3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_provision_steps_filtered_by_instance() {
        let store = MemoryStore::new();
        for (instance, step) in [("acme-1", "create_role"), ("acme-2", "create_role"), ("acme-1", "create_database")] {
            store
                .record_provision_step(&ProvisionStepRow {
                    instance_id: instance.to_string(),
                    step: step.to_string(),
                    outcome: "succeeded".to_string(),
                    detail: None,
                    recorded_at: OffsetDateTime::now_utc(),
                })
                .await
                .unwrap();
        }
        let steps: Vec<_> = store
            .list_provision_steps("acme-1")
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.step)
            .collect();
        assert_eq!(steps, vec!["create_role", "create_database"]);
    }
}
