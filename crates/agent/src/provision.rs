//! Instance provisioning and removal.
//!
//! Provisioning is a short saga: role, database, replication membership and
//! finally the instance record. Every step outcome is journaled to the
//! metadata store. When a step fails after others have succeeded, the
//! completed steps are undone in reverse order (unless disabled) and the
//! caller gets a [`PartialProvision`] naming what happened.
//!
//! Removal is best-effort teardown: every step is attempted regardless of
//! earlier failures and the outcome of each lands in a [`TeardownReport`].

use crate::error::{BrokerError, BrokerResult, PartialProvision, StepFailure};
use rdpg_cluster::ClusterOps;
use rdpg_core::config::ProvisioningConfig;
use rdpg_core::{Instance, Secret};
use rdpg_metadata::MetadataStore;
use rdpg_metadata::models::{InstanceRow, ProvisionStepRow};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use time::OffsetDateTime;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// One step of the provisioning saga.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionStep {
    CreateRole,
    CreateDatabase,
    JoinReplication,
    PersistRecord,
}

impl ProvisionStep {
    pub const ORDER: [ProvisionStep; 4] = [
        Self::CreateRole,
        Self::CreateDatabase,
        Self::JoinReplication,
        Self::PersistRecord,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateRole => "create_role",
            Self::CreateDatabase => "create_database",
            Self::JoinReplication => "join_replication",
            Self::PersistRecord => "persist_record",
        }
    }
}

impl fmt::Display for ProvisionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Journaled outcome of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Succeeded,
    Failed,
    Compensated,
    CompensationFailed,
}

impl StepOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::Compensated => "compensated",
            Self::CompensationFailed => "compensation_failed",
        }
    }
}

/// Result of undoing one completed step.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CompensationRecord {
    pub step: ProvisionStep,
    pub error: Option<String>,
}

/// Outcome of compensating a failed provisioning run, in undo order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct CompensationReport {
    pub steps: Vec<CompensationRecord>,
}

impl CompensationReport {
    /// Whether every completed step was undone.
    pub fn is_complete(&self) -> bool {
        self.steps.iter().all(|record| record.error.is_none())
    }
}

/// Teardown actions, in the order `remove` attempts them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TeardownAction {
    DisableDatabase,
    BackupDatabase,
    DropDatabase,
    DropRole,
}

impl TeardownAction {
    pub const ORDER: [TeardownAction; 4] = [
        Self::DisableDatabase,
        Self::BackupDatabase,
        Self::DropDatabase,
        Self::DropRole,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DisableDatabase => "disable_database",
            Self::BackupDatabase => "backup_database",
            Self::DropDatabase => "drop_database",
            Self::DropRole => "drop_role",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TeardownStep {
    pub action: TeardownAction,
    pub error: Option<String>,
}

/// Per-step results of a removal.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct TeardownReport {
    pub steps: Vec<TeardownStep>,
}

impl TeardownReport {
    fn record(&mut self, action: TeardownAction, error: Option<String>) {
        self.steps.push(TeardownStep { action, error });
    }

    pub fn failures(&self) -> impl Iterator<Item = &TeardownStep> {
        self.steps.iter().filter(|step| step.error.is_some())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn succeeded(&self, action: TeardownAction) -> bool {
        self.steps
            .iter()
            .any(|step| step.action == action && step.error.is_none())
    }

    /// Both the database and the role are gone.
    pub fn dropped(&self) -> bool {
        self.succeeded(TeardownAction::DropDatabase) && self.succeeded(TeardownAction::DropRole)
    }
}

/// What `remove` did.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RemovalOutcome {
    pub instance_id: String,
    pub teardown: TeardownReport,
    /// The instance record was retired.
    pub retired: bool,
    pub bindings_retired: u64,
}

/// Creates and removes tenant instances.
pub struct Provisioner {
    cluster: Arc<dyn ClusterOps>,
    metadata: Arc<dyn MetadataStore>,
    config: ProvisioningConfig,
}

impl Provisioner {
    pub fn new(
        cluster: Arc<dyn ClusterOps>,
        metadata: Arc<dyn MetadataStore>,
        config: ProvisioningConfig,
    ) -> Self {
        Self {
            cluster,
            metadata,
            config,
        }
    }

    /// Provision `instance`, returning it with its freshly generated secret.
    #[instrument(skip_all, fields(instance_id = %instance.instance_id, database = %instance.database))]
    pub async fn provision(
        &self,
        mut instance: Instance,
        cancel: &CancellationToken,
    ) -> BrokerResult<Instance> {
        self.check_available(&instance).await?;

        let secret = Secret::generate();
        let mut completed = Vec::with_capacity(ProvisionStep::ORDER.len());

        for step in ProvisionStep::ORDER {
            let result = if cancel.is_cancelled() {
                Err(StepFailure::Cancelled)
            } else {
                self.run_step(step, &instance, &secret).await
            };

            match result {
                Ok(()) => {
                    tracing::info!(step = %step, "Provisioning step succeeded");
                    self.journal(&instance.instance_id, step, StepOutcome::Succeeded, None)
                        .await;
                    completed.push(step);
                }
                Err(failure) => {
                    tracing::error!(step = %step, error = %failure, "Provisioning step failed");
                    self.journal(
                        &instance.instance_id,
                        step,
                        StepOutcome::Failed,
                        Some(failure.to_string()),
                    )
                    .await;
                    return Err(self.abort(&instance, step, completed, failure).await);
                }
            }
        }

        instance.pass = Some(secret);
        tracing::info!("Instance provisioned");
        Ok(instance)
    }

    /// Tear down `instance` and, when configured, retire its records.
    #[instrument(skip_all, fields(instance_id = %instance.instance_id, database = %instance.database))]
    pub async fn remove(
        &self,
        instance: &Instance,
        cancel: &CancellationToken,
    ) -> BrokerResult<RemovalOutcome> {
        let mut teardown = TeardownReport::default();

        for action in TeardownAction::ORDER {
            if cancel.is_cancelled() {
                tracing::warn!(action = action.as_str(), "Removal cancelled");
                return Err(BrokerError::RemovalCancelled {
                    instance_id: instance.instance_id.clone(),
                    teardown,
                });
            }
            let result = match action {
                TeardownAction::DisableDatabase => {
                    self.cluster.disable_database(&instance.database).await
                }
                TeardownAction::BackupDatabase => {
                    self.cluster.backup_database(&instance.database).await
                }
                TeardownAction::DropDatabase => self.cluster.drop_database(&instance.database).await,
                TeardownAction::DropRole => self.cluster.drop_role(&instance.user).await,
            };
            match result {
                Ok(()) => tracing::info!(action = action.as_str(), "Teardown step succeeded"),
                Err(ref e) => {
                    tracing::warn!(action = action.as_str(), error = %e, "Teardown step failed")
                }
            }
            teardown.record(action, result.err().map(|e| e.to_string()));
        }

        let mut outcome = RemovalOutcome {
            instance_id: instance.instance_id.clone(),
            teardown,
            retired: false,
            bindings_retired: 0,
        };

        if !self.config.retire_on_remove {
            return Ok(outcome);
        }
        if !outcome.teardown.dropped() {
            tracing::warn!("Teardown incomplete, instance record left active for retry");
            return Ok(outcome);
        }

        let now = OffsetDateTime::now_utc();
        outcome.bindings_retired = self
            .metadata
            .retire_bindings_for_instance(&instance.instance_id, now)
            .await?;
        outcome.retired = self
            .metadata
            .retire_instance(&instance.instance_id, now)
            .await?;
        tracing::info!(
            bindings_retired = outcome.bindings_retired,
            retired = outcome.retired,
            "Instance records retired"
        );
        Ok(outcome)
    }

    /// Reject reused instance ids and derived-name collisions before any
    /// side effect.
    async fn check_available(&self, instance: &Instance) -> BrokerResult<()> {
        if self
            .metadata
            .get_instance_any(&instance.instance_id)
            .await?
            .is_some()
        {
            return Err(BrokerError::AlreadyExists(format!(
                "instance {}",
                instance.instance_id
            )));
        }
        if let Some(owner) = self
            .metadata
            .get_active_instance_by_database(&instance.database)
            .await?
        {
            return Err(BrokerError::IdentifierCollision {
                instance_id: instance.instance_id.clone(),
                database: instance.database.clone(),
                owner: owner.instance_id,
            });
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: ProvisionStep,
        instance: &Instance,
        secret: &Secret,
    ) -> Result<(), StepFailure> {
        match step {
            ProvisionStep::CreateRole => self.cluster.create_role(&instance.user, secret).await?,
            ProvisionStep::CreateDatabase => {
                self.cluster
                    .create_database(&instance.database, &instance.user)
                    .await?
            }
            ProvisionStep::JoinReplication => {
                self.cluster
                    .add_to_replication_group(&instance.database)
                    .await?
            }
            ProvisionStep::PersistRecord => {
                let row = InstanceRow::new(instance, secret, OffsetDateTime::now_utc());
                self.metadata.create_instance(&row).await?
            }
        }
        Ok(())
    }

    async fn abort(
        &self,
        instance: &Instance,
        failed: ProvisionStep,
        completed: Vec<ProvisionStep>,
        failure: StepFailure,
    ) -> BrokerError {
        // Role and database creation run node by node, so a failed create can
        // leave the object behind on the nodes that were already done.
        let mut undo = completed.clone();
        if matches!(failure, StepFailure::Cluster(_))
            && matches!(
                failed,
                ProvisionStep::CreateRole | ProvisionStep::CreateDatabase
            )
        {
            undo.push(failed);
        }

        let compensation = match failure {
            StepFailure::Cancelled => None,
            _ if !self.config.compensate_on_failure => None,
            _ if undo.is_empty() => None,
            _ => Some(self.compensate(instance, &undo).await),
        };

        if completed.is_empty() {
            if compensation.as_ref().is_some_and(|report| !report.is_complete()) {
                tracing::warn!(step = %failed, "Cleanup of the failed step was incomplete");
            }
            return match failure {
                StepFailure::Cluster(source) => BrokerError::ExternalOperation {
                    step: failed.as_str(),
                    source,
                },
                StepFailure::Metadata(err) => err.into(),
                StepFailure::Cancelled => BrokerError::Cancelled,
            };
        }

        PartialProvision {
            instance_id: instance.instance_id.clone(),
            failed,
            completed,
            compensation,
            source: failure,
        }
        .into()
    }

    /// Undo `steps` in reverse order. Both drops are `IF EXISTS`, so undoing a
    /// step that only partly ran is safe.
    async fn compensate(&self, instance: &Instance, steps: &[ProvisionStep]) -> CompensationReport {
        let mut report = CompensationReport::default();
        for &step in steps.iter().rev() {
            let result = match step {
                ProvisionStep::CreateRole => self.cluster.drop_role(&instance.user).await,
                ProvisionStep::CreateDatabase => {
                    if let Err(e) = self.cluster.disable_database(&instance.database).await {
                        tracing::warn!(error = %e, "Could not disable database before drop");
                    }
                    self.cluster.drop_database(&instance.database).await
                }
                // Dropping the database takes its replication membership with it.
                ProvisionStep::JoinReplication | ProvisionStep::PersistRecord => continue,
            };

            let error = result.err().map(|e| e.to_string());
            let outcome = if error.is_some() {
                tracing::error!(step = %step, error = ?error, "Compensation failed");
                StepOutcome::CompensationFailed
            } else {
                tracing::info!(step = %step, "Step compensated");
                StepOutcome::Compensated
            };
            self.journal(&instance.instance_id, step, outcome, error.clone())
                .await;
            report.steps.push(CompensationRecord { step, error });
        }
        report
    }

    /// Journal writes never mask the step result.
    async fn journal(
        &self,
        instance_id: &str,
        step: ProvisionStep,
        outcome: StepOutcome,
        detail: Option<String>,
    ) {
        let row = ProvisionStepRow {
            instance_id: instance_id.to_string(),
            step: step.as_str().to_string(),
            outcome: outcome.as_str().to_string(),
            detail,
            recorded_at: OffsetDateTime::now_utc(),
        };
        if let Err(e) = self.metadata.record_provision_step(&row).await {
            tracing::warn!(
                step = %step,
                outcome = outcome.as_str(),
                error = %e,
                "Failed to journal provisioning step"
            );
        }
    }
}
