//! Schema bootstrap.
//!
//! Converges the control database and every node's admin database onto the
//! schema catalog. A run is idempotent: tables, routines and seed rows are
//! looked up first and only created when absent, and the few entries that are
//! always applied guard themselves. Connection, readiness and lookup failures
//! abort the run; a failing statement is logged, recorded in the report and
//! the run moves on so that a later run can finish the job.

use rdpg_cluster::{ClusterError, ClusterOps};
use rdpg_core::config::BootstrapConfig;
use rdpg_metadata::{
    CatalogKey, CatalogTarget, MetadataError, SchemaCatalog, SchemaConnector, SchemaSession,
};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::instrument;

/// Scope label for entries applied to the control database.
pub const CONTROL_SCOPE: &str = "control";

/// Fatal bootstrap errors.
#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("schema catalog is missing entries: {0:?}")]
    IncompleteCatalog(Vec<CatalogKey>),

    #[error("invalid bootstrap configuration: {0}")]
    Config(String),

    #[error("cannot connect to control database: {0}")]
    ControlConnect(#[source] MetadataError),

    #[error("replication not ready: {0}")]
    ReplicationNotReady(#[source] ClusterError),

    #[error("cannot list cluster nodes: {0}")]
    ListNodes(#[source] ClusterError),

    #[error("cannot connect to admin database on {node}: {source}")]
    NodeConnect {
        node: String,
        #[source]
        source: MetadataError,
    },

    #[error("lookup for {key} on {scope} failed: {source}")]
    Lookup {
        key: CatalogKey,
        scope: String,
        #[source]
        source: MetadataError,
    },

    #[error("bootstrap cancelled")]
    Cancelled,
}

/// What happened to one catalog entry in one scope.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntryOutcome {
    Applied,
    AlreadyPresent,
    Failed { error: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EntryRecord {
    #[serde(serialize_with = "serialize_key")]
    pub key: CatalogKey,
    /// `control` or the node address.
    pub scope: String,
    #[serde(flatten)]
    pub outcome: EntryOutcome,
}

fn serialize_key<S: Serializer>(key: &CatalogKey, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(key.as_str())
}

/// Per-entry results of a bootstrap run, in application order.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BootstrapReport {
    pub entries: Vec<EntryRecord>,
}

impl BootstrapReport {
    fn push(&mut self, scope: &str, key: CatalogKey, outcome: EntryOutcome) {
        self.entries.push(EntryRecord {
            key,
            scope: scope.to_string(),
            outcome,
        });
    }

    pub fn applied(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::Applied)
    }

    pub fn already_present(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries
            .iter()
            .filter(|e| e.outcome == EntryOutcome::AlreadyPresent)
    }

    pub fn failures(&self) -> impl Iterator<Item = &EntryRecord> {
        self.entries
            .iter()
            .filter(|e| matches!(e.outcome, EntryOutcome::Failed { .. }))
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Applies the schema catalog to the control database and every node.
pub struct Bootstrapper {
    connector: Arc<dyn SchemaConnector>,
    cluster: Arc<dyn ClusterOps>,
    catalog: SchemaCatalog,
    seeds: BootstrapConfig,
}

impl Bootstrapper {
    /// Fails if the catalog cannot serve every key the run applies.
    pub fn new(
        connector: Arc<dyn SchemaConnector>,
        cluster: Arc<dyn ClusterOps>,
        catalog: SchemaCatalog,
        seeds: BootstrapConfig,
    ) -> Result<Self, BootstrapError> {
        let missing = catalog.missing(&CatalogKey::ALL);
        if !missing.is_empty() {
            return Err(BootstrapError::IncompleteCatalog(missing));
        }
        seeds.validate().map_err(BootstrapError::Config)?;
        Ok(Self {
            connector,
            cluster,
            catalog,
            seeds,
        })
    }

    #[instrument(skip_all, fields(backend = self.cluster.backend_name()))]
    pub async fn run(&self, cancel: &CancellationToken) -> Result<BootstrapReport, BootstrapError> {
        let mut report = BootstrapReport::default();

        let mut control = self.connector.control().await.map_err(|e| {
            tracing::error!(error = %e, "Control database connection failed");
            BootstrapError::ControlConnect(e)
        })?;

        check_cancelled(cancel)?;
        self.cluster.wait_for_replication_ready().await.map_err(|e| {
            tracing::error!(error = %e, "Replication readiness check failed");
            BootstrapError::ReplicationNotReady(e)
        })?;

        for key in CatalogKey::CONTROL_ALWAYS
            .into_iter()
            .chain(CatalogKey::CONTROL_TABLES)
            .chain(CatalogKey::SEEDS)
        {
            check_cancelled(cancel)?;
            self.converge(control.as_mut(), CONTROL_SCOPE, key, &mut report)
                .await?;
        }
        close(control, CONTROL_SCOPE).await;

        let nodes = self.cluster.list_nodes().await.map_err(|e| {
            tracing::error!(error = %e, "Listing cluster nodes failed");
            BootstrapError::ListNodes(e)
        })?;
        for node in &nodes {
            check_cancelled(cancel)?;
            let scope = node.to_string();
            let mut session = self.connector.node_admin(node).await.map_err(|source| {
                tracing::error!(node = %scope, error = %source, "Node admin connection failed");
                BootstrapError::NodeConnect {
                    node: scope.clone(),
                    source,
                }
            })?;
            for key in std::iter::once(CatalogKey::PostgresSchemas).chain(CatalogKey::NODE_ROUTINES)
            {
                self.converge(session.as_mut(), &scope, key, &mut report)
                    .await?;
            }
            close(session, &scope).await;
        }

        tracing::info!(
            applied = report.applied().count(),
            already_present = report.already_present().count(),
            failed = report.failures().count(),
            nodes = nodes.len(),
            "Schema bootstrap finished"
        );
        Ok(report)
    }

    /// Look up `key`'s target and apply the entry if it is absent.
    async fn converge(
        &self,
        session: &mut dyn SchemaSession,
        scope: &str,
        key: CatalogKey,
        report: &mut BootstrapReport,
    ) -> Result<(), BootstrapError> {
        let present = match key.target() {
            CatalogTarget::Unchecked => Ok(false),
            CatalogTarget::Table { schema, table } => session.table_exists(schema, table).await,
            CatalogTarget::Routine { schema, name } => session.routine_exists(schema, name).await,
            CatalogTarget::NamedRow { schema, table } => {
                session
                    .named_row_exists(schema, table, &self.seeds.default_service)
                    .await
            }
            CatalogTarget::ServicePlan => {
                session
                    .service_plan_exists(&self.seeds.default_service, &self.seeds.default_plan)
                    .await
            }
        }
        .map_err(|source| {
            tracing::error!(key = %key, scope, error = %source, "Catalog lookup failed");
            BootstrapError::Lookup {
                key,
                scope: scope.to_string(),
                source,
            }
        })?;

        if present {
            tracing::debug!(key = %key, scope, "Catalog entry already present");
            report.push(scope, key, EntryOutcome::AlreadyPresent);
            return Ok(());
        }

        let sql = self
            .catalog
            .get(key)
            .ok_or_else(|| BootstrapError::IncompleteCatalog(vec![key]))?;
        // Seeds report their row count; the rest report nothing.
        let result = match self.seed_args(key) {
            Some(args) => session.execute_with(sql, &args).await.map(Some),
            None => session.execute(sql).await.map(|()| None),
        };
        match result {
            Ok(Some(0)) => {
                // Found absent yet nothing inserted: the parent service row is missing.
                tracing::error!(key = %key, scope, "Seed inserted no rows");
                report.push(
                    scope,
                    key,
                    EntryOutcome::Failed {
                        error: "seed inserted no rows".to_string(),
                    },
                );
            }
            Ok(_) => {
                tracing::info!(key = %key, scope, "Catalog entry applied");
                report.push(scope, key, EntryOutcome::Applied);
            }
            Err(e) => {
                tracing::error!(key = %key, scope, error = %e, "Catalog entry failed");
                report.push(
                    scope,
                    key,
                    EntryOutcome::Failed {
                        error: e.to_string(),
                    },
                );
            }
        }
        Ok(())
    }

    fn seed_args(&self, key: CatalogKey) -> Option<Vec<&str>> {
        match key {
            CatalogKey::InsertDefaultCfsbServices => Some(vec![self.seeds.default_service.as_str()]),
            CatalogKey::InsertDefaultCfsbPlans => Some(vec![
                self.seeds.default_service.as_str(),
                self.seeds.default_plan.as_str(),
            ]),
            _ => None,
        }
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), BootstrapError> {
    if cancel.is_cancelled() {
        tracing::warn!("Schema bootstrap cancelled");
        return Err(BootstrapError::Cancelled);
    }
    Ok(())
}

async fn close(session: Box<dyn SchemaSession>, scope: &str) {
    if let Err(e) = session.close().await {
        tracing::debug!(scope, error = %e, "Closing schema session failed");
    }
}
