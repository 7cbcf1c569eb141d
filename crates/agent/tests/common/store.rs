//! Metadata store wrapper with injectable write failures.

use async_trait::async_trait;
use rdpg_metadata::models::{BindingRow, CredentialsRow, InstanceRow, ProvisionStepRow};
use rdpg_metadata::repos::{BindingRepo, InstanceRepo};
use rdpg_metadata::{MemoryStore, MetadataError, MetadataResult, MetadataStore};
use std::sync::atomic::{AtomicBool, Ordering};
use time::OffsetDateTime;

/// Delegates to a [`MemoryStore`] unless a failure switch is set.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: MemoryStore,
    fail_instances: AtomicBool,
    fail_credentials: AtomicBool,
    fail_journal: AtomicBool,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_instance_writes(&self) {
        self.fail_instances.store(true, Ordering::SeqCst);
    }

    pub fn fail_credential_writes(&self) {
        self.fail_credentials.store(true, Ordering::SeqCst);
    }

    pub fn fail_journal_writes(&self) {
        self.fail_journal.store(true, Ordering::SeqCst);
    }

    fn check(flag: &AtomicBool, what: &str) -> MetadataResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(MetadataError::Internal(format!("injected {what} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for FlakyStore {
    async fn health_check(&self) -> MetadataResult<()> {
        self.inner.health_check().await
    }

    fn backend_name(&self) -> &'static str {
        "flaky-memory"
    }
}

#[async_trait]
impl InstanceRepo for FlakyStore {
    async fn create_instance(&self, instance: &InstanceRow) -> MetadataResult<()> {
        Self::check(&self.fail_instances, "instance write")?;
        self.inner.create_instance(instance).await
    }

    async fn get_active_instance(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>> {
        self.inner.get_active_instance(instance_id).await
    }

    async fn get_instance_any(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>> {
        self.inner.get_instance_any(instance_id).await
    }

    async fn get_active_instance_by_database(
        &self,
        dbname: &str,
    ) -> MetadataResult<Option<InstanceRow>> {
        self.inner.get_active_instance_by_database(dbname).await
    }

    async fn retire_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        self.inner.retire_instance(instance_id, retired_at).await
    }

    async fn record_provision_step(&self, step: &ProvisionStepRow) -> MetadataResult<()> {
        Self::check(&self.fail_journal, "journal write")?;
        self.inner.record_provision_step(step).await
    }

    async fn list_provision_steps(
        &self,
        instance_id: &str,
    ) -> MetadataResult<Vec<ProvisionStepRow>> {
        self.inner.list_provision_steps(instance_id).await
    }
}

#[async_trait]
impl BindingRepo for FlakyStore {
    async fn create_binding(&self, binding: &BindingRow) -> MetadataResult<()> {
        self.inner.create_binding(binding).await
    }

    async fn create_credentials(&self, credentials: &CredentialsRow) -> MetadataResult<()> {
        Self::check(&self.fail_credentials, "credentials write")?;
        self.inner.create_credentials(credentials).await
    }

    async fn get_active_binding(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>> {
        self.inner.get_active_binding(binding_id).await
    }

    async fn get_binding_any(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>> {
        self.inner.get_binding_any(binding_id).await
    }

    async fn get_credentials(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> MetadataResult<Option<CredentialsRow>> {
        self.inner.get_credentials(instance_id, binding_id).await
    }

    async fn retire_binding(
        &self,
        binding_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        self.inner.retire_binding(binding_id, retired_at).await
    }

    async fn retire_bindings_for_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<u64> {
        self.inner
            .retire_bindings_for_instance(instance_id, retired_at)
            .await
    }
}
