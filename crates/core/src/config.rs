//! Configuration types shared across crates.

use crate::topology::{EndpointSelection, Node};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// PostgreSQL SSL mode configuration.
#[derive(Clone, Copy, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PgSslMode {
    /// Disable SSL/TLS entirely.
    Disable,
    /// Prefer SSL/TLS but allow unencrypted connections (default).
    #[default]
    Prefer,
    /// Require SSL/TLS for all connections.
    Require,
}

/// Control database configuration.
///
/// The control database (`rdpg` by default) holds the broker's own tables and
/// is shared, through replication, by every node of the cluster.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ControlDbConfig {
    /// Connection URL (optional if using individual fields).
    /// Takes precedence over individual fields if both are provided.
    pub url: Option<String>,
    /// Database host.
    #[serde(default = "default_control_host")]
    pub host: Option<String>,
    /// Database port (default: 5432).
    #[serde(default = "default_pg_port")]
    pub port: Option<u16>,
    /// Database username.
    pub username: Option<String>,
    /// Database password.
    /// WARNING: Prefer RDPG_CONTROL__PASSWORD env var over storing in config.
    pub password: Option<String>,
    /// Database name.
    #[serde(default = "default_control_database")]
    pub database: String,
    /// SSL mode for connections.
    pub ssl_mode: Option<PgSslMode>,
    /// Maximum connections in the metadata pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Statement timeout in milliseconds.
    #[serde(default)]
    pub statement_timeout_ms: Option<u64>,
    /// Seconds to wait for a connection before failing.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

fn default_control_host() -> Option<String> {
    Some("127.0.0.1".to_string())
}

fn default_pg_port() -> Option<u16> {
    Some(crate::topology::DEFAULT_PG_PORT)
}

fn default_control_database() -> String {
    "rdpg".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    10
}

impl Default for ControlDbConfig {
    fn default() -> Self {
        Self {
            url: None,
            host: default_control_host(),
            port: default_pg_port(),
            username: None,
            password: None,
            database: default_control_database(),
            ssl_mode: None,
            max_connections: default_max_connections(),
            statement_timeout_ms: None,
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl ControlDbConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate control database configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_none() && self.host.is_none() {
            return Err("control config requires either 'url' or 'host'".to_string());
        }
        if self.url.is_none() && self.database.is_empty() {
            return Err("control config requires 'database' when using individual fields".to_string());
        }
        if self.connect_timeout_secs == 0 {
            return Err("control.connect_timeout_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Cluster topology and administrative access configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Every node of the cluster, in topology order.
    pub nodes: Vec<Node>,
    /// Index into `nodes` of the node this agent runs on.
    #[serde(default)]
    pub local_node: usize,
    /// Superuser used for role/database administration on every node.
    #[serde(default = "default_admin_username")]
    pub admin_username: String,
    /// Password of the administrative user.
    /// WARNING: Prefer RDPG_CLUSTER__ADMIN_PASSWORD env var over storing in config.
    pub admin_password: Option<String>,
    /// Node-local administrative database.
    #[serde(default = "default_admin_database")]
    pub admin_database: String,
    /// Replicated control database.
    #[serde(default = "default_control_database")]
    pub control_database: String,
    /// SSL mode for administrative connections.
    pub ssl_mode: Option<PgSslMode>,
    /// Seconds to wait for an administrative connection before failing.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Directory receiving `pg_dump` output before a database is dropped.
    /// Backups are skipped when unset.
    pub backup_dir: Option<PathBuf>,
    /// `pg_dump` executable.
    #[serde(default = "default_pg_dump")]
    pub pg_dump: String,
}

fn default_admin_username() -> String {
    "postgres".to_string()
}

fn default_admin_database() -> String {
    "postgres".to_string()
}

fn default_pg_dump() -> String {
    "pg_dump".to_string()
}

impl ClusterConfig {
    /// Single-node cluster on the given host, with every other field defaulted.
    pub fn single_node(host: &str, port: u16) -> Self {
        Self {
            nodes: vec![Node::new(host, port)],
            local_node: 0,
            admin_username: default_admin_username(),
            admin_password: None,
            admin_database: default_admin_database(),
            control_database: default_control_database(),
            ssl_mode: None,
            connect_timeout_secs: default_connect_timeout_secs(),
            backup_dir: None,
            pg_dump: default_pg_dump(),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Validate cluster configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("cluster.nodes must list at least one node".to_string());
        }
        if self.local_node >= self.nodes.len() {
            return Err(format!(
                "cluster.local_node {} is out of range for {} nodes",
                self.local_node,
                self.nodes.len()
            ));
        }
        if let Some(node) = self.nodes.iter().find(|n| n.host.is_empty()) {
            return Err(format!("cluster node with port {} has an empty host", node.port));
        }
        if self.connect_timeout_secs == 0 {
            return Err("cluster.connect_timeout_secs cannot be 0".to_string());
        }
        Ok(())
    }
}

/// Provisioning behavior.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Undo completed steps when a later provisioning step fails (default: true).
    #[serde(default = "default_true")]
    pub compensate_on_failure: bool,
    /// Retire the instance record (and its bindings) once teardown has dropped
    /// the database and role (default: true).
    #[serde(default = "default_true")]
    pub retire_on_remove: bool,
    /// How the client endpoint is picked from the topology.
    #[serde(default)]
    pub endpoint_selection: EndpointSelection,
}

fn default_true() -> bool {
    true
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            compensate_on_failure: true,
            retire_on_remove: true,
            endpoint_selection: EndpointSelection::default(),
        }
    }
}

/// Reference data seeded by the schema bootstrap.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BootstrapConfig {
    /// Name of the default service offering.
    #[serde(default = "default_service_name")]
    pub default_service: String,
    /// Name of the default plan of that service.
    #[serde(default = "default_plan_name")]
    pub default_plan: String,
}

fn default_service_name() -> String {
    "rdpg".to_string()
}

fn default_plan_name() -> String {
    "small".to_string()
}

impl Default for BootstrapConfig {
    fn default() -> Self {
        Self {
            default_service: default_service_name(),
            default_plan: default_plan_name(),
        }
    }
}

impl BootstrapConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.default_service.is_empty() {
            return Err("bootstrap.default_service cannot be empty".to_string());
        }
        if self.default_plan.is_empty() {
            return Err("bootstrap.default_plan cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Complete agent configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Control database configuration.
    #[serde(default)]
    pub control: ControlDbConfig,
    /// Cluster topology (required).
    pub cluster: ClusterConfig,
    /// Provisioning behavior.
    #[serde(default)]
    pub provisioning: ProvisioningConfig,
    /// Bootstrap reference data.
    #[serde(default)]
    pub bootstrap: BootstrapConfig,
}

impl AppConfig {
    /// Create a test configuration for a single local node.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            control: ControlDbConfig::default(),
            cluster: ClusterConfig::single_node("127.0.0.1", crate::topology::DEFAULT_PG_PORT),
            provisioning: ProvisioningConfig::default(),
            bootstrap: BootstrapConfig::default(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.control.validate()?;
        self.cluster.validate()?;
        self.bootstrap.validate()?;
        Ok(())
    }
}
