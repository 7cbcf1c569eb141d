//! BDR (bi-directional replication) PostgreSQL cluster backend.
//!
//! Roles and databases are global objects that BDR does not replicate, so
//! they are created on every node individually. Replication membership is per
//! database: the first node creates the group and every other node joins it.

use crate::connect::{connect, node_options, quote_ident, quote_literal, validate_identifier};
use crate::error::{ClusterError, ClusterResult};
use crate::traits::ClusterOps;
use async_trait::async_trait;
use rdpg_core::config::ClusterConfig;
use rdpg_core::{Node, Secret};
use sqlx::PgConnection;
use std::path::PathBuf;
use time::OffsetDateTime;
use tokio::process::Command;
use tracing::instrument;

/// Cluster backend for a static list of BDR nodes.
pub struct BdrCluster {
    config: ClusterConfig,
}

impl BdrCluster {
    /// Create a backend over the configured topology.
    pub fn new(config: ClusterConfig) -> ClusterResult<Self> {
        config.validate().map_err(ClusterError::Config)?;
        Ok(Self { config })
    }

    fn local_node(&self) -> &Node {
        &self.config.nodes[self.config.local_node]
    }

    async fn open(&self, node: &Node, database: &str) -> ClusterResult<PgConnection> {
        let opts = node_options(&self.config, node, database);
        connect(&opts, node, database, self.config.connect_timeout()).await
    }

    /// Run one statement against the admin database of every node, stopping
    /// at the first failure.
    async fn on_every_node(&self, operation: &'static str, sql: &str) -> ClusterResult<()> {
        for node in &self.config.nodes {
            let mut conn = self.open(node, &self.config.admin_database).await?;
            sqlx::Executor::execute(&mut conn, sqlx::raw_sql(sql))
                .await
                .map_err(|source| ClusterError::Operation {
                    operation,
                    node: node.to_string(),
                    source,
                })?;
            tracing::debug!(node = %node, operation, "Cluster operation applied");
        }
        Ok(())
    }

    /// DSN other nodes use to reach `database` on `node` for replication.
    fn replication_dsn(&self, node: &Node, database: &str) -> String {
        format!(
            "host={} port={} user={} dbname={}",
            node.host, node.port, self.config.admin_username, database
        )
    }

    fn backup_path(dir: &std::path::Path, database: &str) -> PathBuf {
        let stamp = OffsetDateTime::now_utc().unix_timestamp();
        dir.join(format!("{database}-{stamp}.sql"))
    }
}

/// BDR node name of the `index`-th node within `database`'s group.
fn bdr_node_name(database: &str, index: usize) -> String {
    format!("{database}_node{index}")
}

#[async_trait]
impl ClusterOps for BdrCluster {
    #[instrument(skip(self, secret), fields(backend = "bdr"))]
    async fn create_role(&self, name: &str, secret: &Secret) -> ClusterResult<()> {
        validate_identifier(name)?;
        let sql = format!(
            "CREATE ROLE {} WITH LOGIN PASSWORD {}",
            quote_ident(name),
            quote_literal(secret.expose())
        );
        self.on_every_node("create role", &sql).await
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn create_database(&self, name: &str, owner: &str) -> ClusterResult<()> {
        validate_identifier(name)?;
        validate_identifier(owner)?;
        let sql = format!(
            "CREATE DATABASE {} WITH OWNER {} TEMPLATE template0 ENCODING 'UTF8'",
            quote_ident(name),
            quote_ident(owner)
        );
        self.on_every_node("create database", &sql).await
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn add_to_replication_group(&self, database: &str) -> ClusterResult<()> {
        validate_identifier(database)?;
        let Some(origin) = self.config.nodes.first() else {
            return Err(ClusterError::Config("no cluster nodes configured".to_string()));
        };
        let origin_dsn = self.replication_dsn(origin, database);

        for (index, node) in self.config.nodes.iter().enumerate() {
            let mut conn = self.open(node, database).await?;
            let op_err = |operation: &'static str| {
                let node = node.to_string();
                move |source| ClusterError::Operation {
                    operation,
                    node,
                    source,
                }
            };

            sqlx::Executor::execute(
                &mut conn,
                sqlx::raw_sql(
                    "CREATE EXTENSION IF NOT EXISTS btree_gist; CREATE EXTENSION IF NOT EXISTS bdr;",
                ),
            )
            .await
            .map_err(op_err("enable bdr extensions"))?;

            let local_name = bdr_node_name(database, index);
            let local_dsn = self.replication_dsn(node, database);
            if index == 0 {
                sqlx::query(
                    "SELECT bdr.bdr_group_create(local_node_name := $1, node_external_dsn := $2)",
                )
                .bind(&local_name)
                .bind(&local_dsn)
                .execute(&mut conn)
                .await
                .map_err(op_err("bdr group create"))?;
            } else {
                sqlx::query(
                    "SELECT bdr.bdr_group_join(local_node_name := $1, node_external_dsn := $2, join_using_dsn := $3)",
                )
                .bind(&local_name)
                .bind(&local_dsn)
                .bind(&origin_dsn)
                .execute(&mut conn)
                .await
                .map_err(op_err("bdr group join"))?;
            }

            sqlx::query("SELECT bdr.bdr_node_join_wait_for_ready()")
                .execute(&mut conn)
                .await
                .map_err(op_err("bdr join wait"))?;
            tracing::info!(node = %node, database, bdr_node = %local_name, "Node joined replication group");
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn disable_database(&self, name: &str) -> ClusterResult<()> {
        validate_identifier(name)?;
        for node in &self.config.nodes {
            let mut conn = self.open(node, &self.config.admin_database).await?;
            sqlx::query("SELECT rdpg.disable_database($1)")
                .bind(name)
                .execute(&mut conn)
                .await
                .map_err(|source| ClusterError::Operation {
                    operation: "disable database",
                    node: node.to_string(),
                    source,
                })?;
        }
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn backup_database(&self, name: &str) -> ClusterResult<()> {
        validate_identifier(name)?;
        let Some(dir) = &self.config.backup_dir else {
            tracing::info!(database = name, "No backup directory configured, skipping backup");
            return Ok(());
        };
        tokio::fs::create_dir_all(dir).await?;
        let path = Self::backup_path(dir, name);
        let node = self.local_node();

        let mut cmd = Command::new(&self.config.pg_dump);
        cmd.arg("--host")
            .arg(&node.host)
            .arg("--port")
            .arg(node.port.to_string())
            .arg("--username")
            .arg(&self.config.admin_username)
            .arg("--no-password")
            .arg("--file")
            .arg(&path)
            .arg(name);
        if let Some(pass) = &self.config.admin_password {
            cmd.env("PGPASSWORD", pass);
        }

        let output = cmd.output().await?;
        if !output.status.success() {
            return Err(ClusterError::Backup {
                database: name.to_string(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        tracing::info!(database = name, path = %path.display(), "Database backed up");
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn drop_database(&self, name: &str) -> ClusterResult<()> {
        validate_identifier(name)?;
        let sql = format!("DROP DATABASE IF EXISTS {}", quote_ident(name));
        self.on_every_node("drop database", &sql).await
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn drop_role(&self, name: &str) -> ClusterResult<()> {
        validate_identifier(name)?;
        let sql = format!("DROP ROLE IF EXISTS {}", quote_ident(name));
        self.on_every_node("drop role", &sql).await
    }

    async fn list_nodes(&self) -> ClusterResult<Vec<Node>> {
        Ok(self.config.nodes.clone())
    }

    #[instrument(skip(self), fields(backend = "bdr"))]
    async fn wait_for_replication_ready(&self) -> ClusterResult<()> {
        let node = self.local_node().clone();
        let mut conn = self.open(&node, &self.config.control_database).await?;
        sqlx::query("SELECT bdr.bdr_node_join_wait_for_ready()")
            .execute(&mut conn)
            .await
            .map_err(|source| ClusterError::Operation {
                operation: "bdr join wait",
                node: node.to_string(),
                source,
            })?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "bdr"
    }
}
