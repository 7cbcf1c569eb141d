//! Instance repository.

use crate::error::MetadataResult;
use crate::models::{InstanceRow, ProvisionStepRow};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for instance records and their provisioning journal.
///
/// Instance ids are stored lower-cased; lookups lower-case their argument.
#[async_trait]
pub trait InstanceRepo: Send + Sync {
    /// Persist a new instance. Fails with `AlreadyExists` if any record
    /// (active or retired) already uses the instance id.
    async fn create_instance(&self, instance: &InstanceRow) -> MetadataResult<()>;

    /// Get the active instance with this id.
    async fn get_active_instance(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>>;

    /// Get an instance regardless of status.
    async fn get_instance_any(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>>;

    /// Get the active instance owning a database name.
    async fn get_active_instance_by_database(
        &self,
        dbname: &str,
    ) -> MetadataResult<Option<InstanceRow>>;

    /// Retire an active instance. Returns false if none was active.
    async fn retire_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Append a provisioning step outcome.
    async fn record_provision_step(&self, step: &ProvisionStepRow) -> MetadataResult<()>;

    /// Journal entries for an instance, oldest first.
    async fn list_provision_steps(&self, instance_id: &str)
    -> MetadataResult<Vec<ProvisionStepRow>>;
}
