//! Binding and credentials repository.

use crate::error::MetadataResult;
use crate::models::{BindingRow, CredentialsRow};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for bindings and the credentials issued with them.
///
/// Binding ids are stored lower-cased; lookups lower-case their argument.
#[async_trait]
pub trait BindingRepo: Send + Sync {
    /// Persist a new binding. Fails with `AlreadyExists` on a reused id.
    async fn create_binding(&self, binding: &BindingRow) -> MetadataResult<()>;

    /// Persist credentials for a binding.
    async fn create_credentials(&self, credentials: &CredentialsRow) -> MetadataResult<()>;

    /// Get the active binding with this id.
    async fn get_active_binding(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>>;

    /// Get a binding regardless of status.
    async fn get_binding_any(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>>;

    /// Credentials issued for a binding of an instance.
    async fn get_credentials(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> MetadataResult<Option<CredentialsRow>>;

    /// Retire an active binding. Returns false if none was active.
    async fn retire_binding(
        &self,
        binding_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Retire every active binding of an instance, returning how many changed.
    async fn retire_bindings_for_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<u64>;
}
