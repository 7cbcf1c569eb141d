//! Tenant database instances.

use crate::error::ValidationError;
use crate::identifier::{database_name, role_name, sanitize};
use crate::secret::Secret;
use crate::status::RecordStatus;
use serde::{Deserialize, Serialize};

/// A tenant-isolated database plus its owning role.
///
/// Built from tenant input with [`Instance::new`]; the secret only exists once
/// the instance has been provisioned or loaded from the metadata store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instance {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub organization_id: String,
    pub space_id: String,
    pub database: String,
    pub user: String,
    #[serde(skip)]
    pub pass: Option<Secret>,
    #[serde(default)]
    pub status: RecordStatus,
}

impl Instance {
    /// Build an instance from tenant input.
    ///
    /// All inputs are lower-cased and the database and role names are derived
    /// from the instance id. Missing classification fields are reported one at
    /// a time, in the order service, plan, organization, space.
    pub fn new(
        instance_id: &str,
        service_id: &str,
        plan_id: &str,
        organization_id: &str,
        space_id: &str,
    ) -> Result<Self, ValidationError> {
        let instance = Self {
            instance_id: instance_id.to_lowercase(),
            service_id: service_id.to_lowercase(),
            plan_id: plan_id.to_lowercase(),
            organization_id: organization_id.to_lowercase(),
            space_id: space_id.to_lowercase(),
            database: database_name(instance_id),
            user: role_name(instance_id),
            pass: None,
            status: RecordStatus::Active,
        };

        if instance.service_id.is_empty() {
            return Err(ValidationError::ServiceIdRequired);
        }
        if instance.plan_id.is_empty() {
            return Err(ValidationError::PlanIdRequired);
        }
        if instance.organization_id.is_empty() {
            return Err(ValidationError::OrganizationIdRequired);
        }
        if instance.space_id.is_empty() {
            return Err(ValidationError::SpaceIdRequired);
        }
        if sanitize(instance_id).is_empty() {
            return Err(ValidationError::InvalidInstanceId(instance_id.to_string()));
        }

        Ok(instance)
    }

    /// Whether a secret has been assigned.
    pub fn is_provisioned(&self) -> bool {
        self.pass.is_some()
    }
}
