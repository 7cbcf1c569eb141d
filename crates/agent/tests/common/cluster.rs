//! In-memory cluster that records every call.

use async_trait::async_trait;
use rdpg_cluster::{ClusterError, ClusterOps, ClusterResult};
use rdpg_core::{Node, Secret};
use std::collections::HashSet;
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Cluster fake. Calls are recorded as `operation:argument`; operations
/// registered with [`RecordingCluster::fail_on`] return an error.
#[allow(dead_code)]
pub struct RecordingCluster {
    nodes: Mutex<Vec<Node>>,
    calls: Mutex<Vec<String>>,
    failing: Mutex<HashSet<&'static str>>,
    secrets: Mutex<Vec<String>>,
    cancel_after: Mutex<Option<(&'static str, CancellationToken)>>,
}

#[allow(dead_code)]
impl RecordingCluster {
    pub fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes: Mutex::new(nodes),
            calls: Mutex::new(Vec::new()),
            failing: Mutex::new(HashSet::new()),
            secrets: Mutex::new(Vec::new()),
            cancel_after: Mutex::new(None),
        }
    }

    /// Make every later call of `operation` fail.
    pub fn fail_on(&self, operation: &'static str) {
        self.failing.lock().unwrap().insert(operation);
    }

    /// Cancel `token` once `operation` has run.
    pub fn cancel_after(&self, operation: &'static str, token: CancellationToken) {
        *self.cancel_after.lock().unwrap() = Some((operation, token));
    }

    pub fn clear_failures(&self) {
        self.failing.lock().unwrap().clear();
    }

    pub fn set_nodes(&self, nodes: Vec<Node>) {
        *self.nodes.lock().unwrap() = nodes;
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Operation names only, in call order.
    pub fn operations(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .map(|call| call.split(':').next().unwrap_or_default().to_string())
            .collect()
    }

    pub fn secrets(&self) -> Vec<String> {
        self.secrets.lock().unwrap().clone()
    }

    fn record(&self, operation: &'static str, argument: &str) -> ClusterResult<()> {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{operation}:{argument}"));
        if let Some((target, token)) = self.cancel_after.lock().unwrap().as_ref() {
            if *target == operation {
                token.cancel();
            }
        }
        if self.failing.lock().unwrap().contains(operation) {
            return Err(ClusterError::Config(format!("injected {operation} failure")));
        }
        Ok(())
    }
}

#[async_trait]
impl ClusterOps for RecordingCluster {
    async fn create_role(&self, name: &str, secret: &Secret) -> ClusterResult<()> {
        self.secrets.lock().unwrap().push(secret.expose().to_string());
        self.record("create_role", name)
    }

    async fn create_database(&self, name: &str, owner: &str) -> ClusterResult<()> {
        self.record("create_database", &format!("{name}/{owner}"))
    }

    async fn add_to_replication_group(&self, database: &str) -> ClusterResult<()> {
        self.record("add_to_replication_group", database)
    }

    async fn disable_database(&self, name: &str) -> ClusterResult<()> {
        self.record("disable_database", name)
    }

    async fn backup_database(&self, name: &str) -> ClusterResult<()> {
        self.record("backup_database", name)
    }

    async fn drop_database(&self, name: &str) -> ClusterResult<()> {
        self.record("drop_database", name)
    }

    async fn drop_role(&self, name: &str) -> ClusterResult<()> {
        self.record("drop_role", name)
    }

    async fn list_nodes(&self) -> ClusterResult<Vec<Node>> {
        if self.failing.lock().unwrap().contains("list_nodes") {
            return Err(ClusterError::Config("injected list_nodes failure".to_string()));
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn wait_for_replication_ready(&self) -> ClusterResult<()> {
        self.record("wait_for_replication_ready", "")
    }

    fn backend_name(&self) -> &'static str {
        "recording"
    }
}
