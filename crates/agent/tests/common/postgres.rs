//! PostgreSQL test database backed by a testcontainer.

use rdpg_core::config::{ClusterConfig, ControlDbConfig};
use rdpg_metadata::{MetadataError, MetadataResult, PgSchemaConnector, PostgresStore};
use sqlx::{Connection, PgConnection};
use testcontainers_modules::postgres::Postgres;
use testcontainers_modules::testcontainers::{ContainerAsync, ImageExt, runners::AsyncRunner};

/// Stable prefix for Docker/container startup failures in Postgres test setup.
/// Tests use this marker to decide whether to skip due to unavailable Docker.
pub const POSTGRES_CONTAINER_START_ERR_PREFIX: &str = "postgres-container-start:";

/// Control database name created inside the container.
pub const CONTROL_DB: &str = "rdpg";

/// A throwaway PostgreSQL server with an empty `rdpg` control database.
///
/// The server's `postgres` database plays the node admin database.
#[allow(dead_code)]
pub struct PostgresTestDb {
    pub host: String,
    pub port: u16,
    _container: ContainerAsync<Postgres>,
}

#[allow(dead_code)]
impl PostgresTestDb {
    pub async fn new() -> MetadataResult<Self> {
        let container = Postgres::default()
            .with_tag("15-alpine")
            .start()
            .await
            .map_err(|e| {
                MetadataError::Internal(format!(
                    "{} Failed to start PostgreSQL container: {e}",
                    POSTGRES_CONTAINER_START_ERR_PREFIX
                ))
            })?;

        let host = container
            .get_host()
            .await
            .expect("Failed to get host")
            .to_string();
        let port = container
            .get_host_port_ipv4(5432)
            .await
            .expect("Failed to get port");

        let db = Self {
            host,
            port,
            _container: container,
        };
        let mut admin = PgConnection::connect(&db.url("postgres")).await?;
        sqlx::raw_sql(&format!("CREATE DATABASE {CONTROL_DB}"))
            .execute(&mut admin)
            .await?;
        admin.close().await?;
        Ok(db)
    }

    /// Default credentials from testcontainers-modules postgres.
    pub fn url(&self, database: &str) -> String {
        format!(
            "postgres://postgres:postgres@{}:{}/{}",
            self.host, self.port, database
        )
    }

    pub fn control_config(&self) -> ControlDbConfig {
        ControlDbConfig {
            url: Some(self.url(CONTROL_DB)),
            max_connections: 5,
            ..ControlDbConfig::default()
        }
    }

    pub fn cluster_config(&self) -> ClusterConfig {
        let mut config = ClusterConfig::single_node(&self.host, self.port);
        config.admin_password = Some("postgres".to_string());
        config
    }

    pub async fn store(&self) -> MetadataResult<PostgresStore> {
        PostgresStore::from_url(&self.url(CONTROL_DB), 5).await
    }

    pub fn connector(&self) -> MetadataResult<PgSchemaConnector> {
        PgSchemaConnector::from_config(&self.control_config(), &self.cluster_config())
    }

    pub async fn connect(&self, database: &str) -> PgConnection {
        PgConnection::connect(&self.url(database))
            .await
            .expect("Failed to connect to test database")
    }
}

/// Start a test database, skipping if Docker is unavailable or
/// SKIP_POSTGRES_TESTS is set.
///
/// Only container-start failures cause a skip; setup errors still panic so
/// real regressions are not silently swallowed.
#[allow(dead_code)]
pub async fn postgres_or_skip() -> Option<PostgresTestDb> {
    if std::env::var("SKIP_POSTGRES_TESTS").is_ok() {
        return None;
    }
    match PostgresTestDb::new().await {
        Ok(db) => Some(db),
        Err(err) => {
            let msg = err.to_string();
            if msg.contains(POSTGRES_CONTAINER_START_ERR_PREFIX) {
                eprintln!("Skipping PostgreSQL test (Docker unavailable): {msg}");
                None
            } else {
                panic!("PostgreSQL test setup failed: {msg}");
            }
        }
    }
}
