//! Sessions used by the schema bootstrapper.
//!
//! A session is one connection to either the control database or a node's
//! admin database. The bootstrapper only needs to run statements and ask
//! whether a table, routine or seed row already exists.

use crate::error::MetadataResult;
use crate::postgres::control_options;
use async_trait::async_trait;
use rdpg_cluster::connect::{connect, node_options, quote_ident};
use rdpg_core::Node;
use rdpg_core::config::{ClusterConfig, ControlDbConfig};
use sqlx::postgres::PgConnectOptions;
use sqlx::{Connection, PgConnection};
use std::time::Duration;

/// One open connection the bootstrapper applies catalog entries through.
#[async_trait]
pub trait SchemaSession: Send {
    /// Run a (possibly multi-statement) script without parameters.
    async fn execute(&mut self, sql: &str) -> MetadataResult<()>;

    /// Run a single statement with positional text parameters, returning the
    /// number of rows it affected.
    async fn execute_with(&mut self, sql: &str, args: &[&str]) -> MetadataResult<u64>;

    async fn table_exists(&mut self, schema: &str, table: &str) -> MetadataResult<bool>;

    async fn routine_exists(&mut self, schema: &str, name: &str) -> MetadataResult<bool>;

    /// Whether `schema.table` has a row whose `name` column equals `name`.
    async fn named_row_exists(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
    ) -> MetadataResult<bool>;

    /// Whether `cfsb.plans` has a plan named `plan` under the service named
    /// `service`.
    async fn service_plan_exists(&mut self, service: &str, plan: &str) -> MetadataResult<bool>;

    /// Close the connection gracefully.
    async fn close(self: Box<Self>) -> MetadataResult<()>;
}

/// Opens schema sessions.
#[async_trait]
pub trait SchemaConnector: Send + Sync {
    /// Session on the control database.
    async fn control(&self) -> MetadataResult<Box<dyn SchemaSession>>;

    /// Session on the admin database of `node`.
    async fn node_admin(&self, node: &Node) -> MetadataResult<Box<dyn SchemaSession>>;
}

/// Schema session over a single PostgreSQL connection.
pub struct PgSchemaSession {
    conn: PgConnection,
}

impl PgSchemaSession {
    pub fn new(conn: PgConnection) -> Self {
        Self { conn }
    }
}

#[async_trait]
impl SchemaSession for PgSchemaSession {
    async fn execute(&mut self, sql: &str) -> MetadataResult<()> {
        sqlx::Executor::execute(&mut self.conn, sqlx::raw_sql(sql)).await?;
        Ok(())
    }

    async fn execute_with(&mut self, sql: &str, args: &[&str]) -> MetadataResult<u64> {
        let mut query = sqlx::query(sql);
        for arg in args {
            query = query.bind(*arg);
        }
        let result = query.execute(&mut self.conn).await?;
        Ok(result.rows_affected())
    }

    async fn table_exists(&mut self, schema: &str, table: &str) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.tables
                WHERE table_schema::text = $1 AND table_name::text = $2
            )
            "#,
        )
        .bind(schema)
        .bind(table)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    async fn routine_exists(&mut self, schema: &str, name: &str) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM information_schema.routines
                WHERE routine_type = 'FUNCTION'
                  AND routine_schema::text = $1
                  AND routine_name::text = $2
            )
            "#,
        )
        .bind(schema)
        .bind(name)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    async fn named_row_exists(
        &mut self,
        schema: &str,
        table: &str,
        name: &str,
    ) -> MetadataResult<bool> {
        let sql = format!(
            "SELECT EXISTS (SELECT 1 FROM {}.{} WHERE name = $1)",
            quote_ident(schema),
            quote_ident(table)
        );
        let exists: bool = sqlx::query_scalar(&sql)
            .bind(name)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(exists)
    }

    async fn service_plan_exists(&mut self, service: &str, plan: &str) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM cfsb.plans p
                JOIN cfsb.services s ON s.id = p.service_id
                WHERE s.name = $1 AND p.name = $2
            )
            "#,
        )
        .bind(service)
        .bind(plan)
        .fetch_one(&mut self.conn)
        .await?;
        Ok(exists)
    }

    async fn close(self: Box<Self>) -> MetadataResult<()> {
        self.conn.close().await?;
        Ok(())
    }
}

/// Opens sessions against the configured control database and cluster nodes.
pub struct PgSchemaConnector {
    control: PgConnectOptions,
    control_timeout: Duration,
    cluster: ClusterConfig,
}

impl PgSchemaConnector {
    pub fn from_config(control: &ControlDbConfig, cluster: &ClusterConfig) -> MetadataResult<Self> {
        Ok(Self {
            control: control_options(control)?,
            control_timeout: control.connect_timeout(),
            cluster: cluster.clone(),
        })
    }
}

#[async_trait]
impl SchemaConnector for PgSchemaConnector {
    async fn control(&self) -> MetadataResult<Box<dyn SchemaSession>> {
        let node = Node::new(self.control.get_host(), self.control.get_port());
        let database = self.control.get_database().unwrap_or_default().to_string();
        let conn = connect(&self.control, &node, &database, self.control_timeout).await?;
        Ok(Box::new(PgSchemaSession::new(conn)))
    }

    async fn node_admin(&self, node: &Node) -> MetadataResult<Box<dyn SchemaSession>> {
        let database = &self.cluster.admin_database;
        let opts = node_options(&self.cluster, node, database);
        let conn = connect(&opts, node, database, self.cluster.connect_timeout()).await?;
        Ok(Box::new(PgSchemaSession::new(conn)))
    }
}
