//! Database models mapping to the `cfsb` schema.

use crate::error::{MetadataError, MetadataResult};
use rdpg_core::{Credentials, Instance, Node, RecordStatus, Secret};
use sqlx::FromRow;
use std::fmt;
use time::OffsetDateTime;

// =============================================================================
// Instances
// =============================================================================

/// Persisted tenant instance.
#[derive(Clone, FromRow)]
pub struct InstanceRow {
    pub instance_id: String,
    pub service_id: String,
    pub plan_id: String,
    pub organization_id: String,
    pub space_id: String,
    pub dbname: String,
    pub uname: String,
    pub pass: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub ineffective_at: Option<OffsetDateTime>,
}

impl InstanceRow {
    /// Active row for a freshly provisioned instance.
    pub fn new(instance: &Instance, pass: &Secret, created_at: OffsetDateTime) -> Self {
        Self {
            instance_id: instance.instance_id.clone(),
            service_id: instance.service_id.clone(),
            plan_id: instance.plan_id.clone(),
            organization_id: instance.organization_id.clone(),
            space_id: instance.space_id.clone(),
            dbname: instance.database.clone(),
            uname: instance.user.clone(),
            pass: pass.expose().to_string(),
            status: RecordStatus::Active.as_str().to_string(),
            created_at,
            ineffective_at: None,
        }
    }

    pub fn status(&self) -> MetadataResult<RecordStatus> {
        parse_status(&self.status)
    }

    pub fn into_instance(self) -> MetadataResult<Instance> {
        let status = self.status()?;
        Ok(Instance {
            instance_id: self.instance_id,
            service_id: self.service_id,
            plan_id: self.plan_id,
            organization_id: self.organization_id,
            space_id: self.space_id,
            database: self.dbname,
            user: self.uname,
            pass: Some(Secret::new(self.pass)),
            status,
        })
    }
}

impl fmt::Debug for InstanceRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InstanceRow")
            .field("instance_id", &self.instance_id)
            .field("dbname", &self.dbname)
            .field("uname", &self.uname)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .field("ineffective_at", &self.ineffective_at)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Bindings and credentials
// =============================================================================

/// Association between an application and an instance.
#[derive(Debug, Clone, FromRow)]
pub struct BindingRow {
    pub instance_id: String,
    pub binding_id: String,
    pub status: String,
    pub created_at: OffsetDateTime,
    pub ineffective_at: Option<OffsetDateTime>,
}

impl BindingRow {
    pub fn new(instance_id: &str, binding_id: &str, created_at: OffsetDateTime) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            binding_id: binding_id.to_string(),
            status: RecordStatus::Active.as_str().to_string(),
            created_at,
            ineffective_at: None,
        }
    }

    pub fn status(&self) -> MetadataResult<RecordStatus> {
        parse_status(&self.status)
    }
}

/// Canonical credential fields issued for one binding.
#[derive(Clone, FromRow)]
pub struct CredentialsRow {
    pub instance_id: String,
    pub binding_id: String,
    pub host: String,
    pub port: i32,
    pub uname: String,
    pub pass: String,
    pub dbname: String,
}

impl CredentialsRow {
    pub fn new(instance_id: &str, binding_id: &str, credentials: &Credentials) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            binding_id: binding_id.to_string(),
            host: credentials.host.clone(),
            port: i32::from(credentials.port),
            uname: credentials.username.clone(),
            pass: credentials.password.expose().to_string(),
            dbname: credentials.database.clone(),
        }
    }

    pub fn into_credentials(self) -> MetadataResult<Credentials> {
        let port = u16::try_from(self.port).map_err(|_| {
            MetadataError::Internal(format!(
                "credentials for binding {} have invalid port {}",
                self.binding_id, self.port
            ))
        })?;
        Ok(Credentials::new(
            &Node::new(self.host, port),
            &self.uname,
            Secret::new(self.pass),
            &self.dbname,
        ))
    }
}

impl fmt::Debug for CredentialsRow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsRow")
            .field("instance_id", &self.instance_id)
            .field("binding_id", &self.binding_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("uname", &self.uname)
            .field("dbname", &self.dbname)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Provisioning journal
// =============================================================================

/// One journaled provisioning step outcome.
#[derive(Debug, Clone, FromRow)]
pub struct ProvisionStepRow {
    pub instance_id: String,
    pub step: String,
    /// `succeeded`, `failed`, `compensated` or `compensation_failed`.
    pub outcome: String,
    pub detail: Option<String>,
    pub recorded_at: OffsetDateTime,
}

fn parse_status(raw: &str) -> MetadataResult<RecordStatus> {
    raw.parse()
        .map_err(|e: rdpg_core::Error| MetadataError::Internal(e.to_string()))
}
