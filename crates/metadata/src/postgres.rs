//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::*;
use crate::repos::{BindingRepo, InstanceRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use rdpg_cluster::connect::sqlx_ssl_mode;
use rdpg_core::RecordStatus;
use rdpg_core::config::ControlDbConfig;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{Pool, Postgres};
use std::str::FromStr;
use std::time::Duration;
use time::OffsetDateTime;

/// Connection options for the control database.
///
/// A full `url` wins over the individual fields; the password field, when
/// set, overrides whatever the URL carries.
pub fn control_options(config: &ControlDbConfig) -> MetadataResult<PgConnectOptions> {
    let mut opts = match (&config.url, &config.host) {
        (Some(url), _) => PgConnectOptions::from_str(url)?,
        (None, Some(host)) => {
            let mut opts = PgConnectOptions::new()
                .host(host)
                .database(&config.database);
            if let Some(port) = config.port {
                opts = opts.port(port);
            }
            if let Some(user) = &config.username {
                opts = opts.username(user);
            }
            opts
        }
        (None, None) => {
            return Err(MetadataError::Config(
                "control database requires either url or host".to_string(),
            ));
        }
    };

    if let Some(pass) = &config.password {
        opts = opts.password(pass);
    }
    if let Some(mode) = config.ssl_mode {
        opts = opts.ssl_mode(sqlx_ssl_mode(mode));
    }
    Ok(opts.application_name("rdpg-agent"))
}

/// PostgreSQL-based metadata store.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a store from the control database configuration.
    pub async fn from_config(config: &ControlDbConfig) -> MetadataResult<Self> {
        let opts = control_options(config)?;

        // Log connection info without password
        tracing::info!(
            host = opts.get_host(),
            port = opts.get_port(),
            database = opts.get_database().unwrap_or("<default>"),
            username = opts.get_username(),
            ssl_mode = ?config.ssl_mode,
            "Connecting to control database"
        );

        Self::connect(
            opts,
            config.max_connections,
            config.statement_timeout_ms,
            config.connect_timeout(),
        )
        .await
    }

    /// Create a store from a connection URL.
    pub async fn from_url(url: &str, max_connections: u32) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, None, Duration::from_secs(10)).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
        acquire_timeout: Duration,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(acquire_timeout)
            .connect_with(opts)
            .await?;

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl InstanceRepo for PostgresStore {
    async fn create_instance(&self, instance: &InstanceRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cfsb.instances
                (instance_id, service_id, plan_id, organization_id, space_id,
                 dbname, uname, pass, status, created_at, ineffective_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(instance.instance_id.to_lowercase())
        .bind(&instance.service_id)
        .bind(&instance.plan_id)
        .bind(&instance.organization_id)
        .bind(&instance.space_id)
        .bind(&instance.dbname)
        .bind(&instance.uname)
        .bind(&instance.pass)
        .bind(&instance.status)
        .bind(instance.created_at)
        .bind(instance.ineffective_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || format!("instance {}", instance.instance_id))
        })?;
        Ok(())
    }

    async fn get_active_instance(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>> {
        let row = sqlx::query_as::<_, InstanceRow>(
            "SELECT * FROM cfsb.instances WHERE instance_id = lower($1) AND status = $2 LIMIT 1",
        )
        .bind(instance_id)
        .bind(RecordStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_instance_any(&self, instance_id: &str) -> MetadataResult<Option<InstanceRow>> {
        let row = sqlx::query_as::<_, InstanceRow>(
            "SELECT * FROM cfsb.instances WHERE instance_id = lower($1) LIMIT 1",
        )
        .bind(instance_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_active_instance_by_database(
        &self,
        dbname: &str,
    ) -> MetadataResult<Option<InstanceRow>> {
        let row = sqlx::query_as::<_, InstanceRow>(
            "SELECT * FROM cfsb.instances WHERE dbname = $1 AND status = $2 LIMIT 1",
        )
        .bind(dbname)
        .bind(RecordStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn retire_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cfsb.instances
            SET status = $2, ineffective_at = $3
            WHERE instance_id = lower($1) AND status = $4
            "#,
        )
        .bind(instance_id)
        .bind(RecordStatus::Retired.as_str())
        .bind(retired_at)
        .bind(RecordStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn record_provision_step(&self, step: &ProvisionStepRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cfsb.provision_steps (instance_id, step, outcome, detail, recorded_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&step.instance_id)
        .bind(&step.step)
        .bind(&step.outcome)
        .bind(&step.detail)
        .bind(step.recorded_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_provision_steps(
        &self,
        instance_id: &str,
    ) -> MetadataResult<Vec<ProvisionStepRow>> {
        let rows = sqlx::query_as::<_, ProvisionStepRow>(
            "SELECT * FROM cfsb.provision_steps WHERE instance_id = lower($1) ORDER BY id",
        )
        .bind(instance_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }
}

#[async_trait]
impl BindingRepo for PostgresStore {
    async fn create_binding(&self, binding: &BindingRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cfsb.bindings (instance_id, binding_id, status, created_at, ineffective_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&binding.instance_id)
        .bind(binding.binding_id.to_lowercase())
        .bind(&binding.status)
        .bind(binding.created_at)
        .bind(binding.ineffective_at)
        .execute(&self.pool)
        .await
        .map_err(|e| MetadataError::from_insert(e, || format!("binding {}", binding.binding_id)))?;
        Ok(())
    }

    async fn create_credentials(&self, credentials: &CredentialsRow) -> MetadataResult<()> {
        sqlx::query(
            r#"
            INSERT INTO cfsb.credentials (instance_id, binding_id, host, port, uname, pass, dbname)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(&credentials.instance_id)
        .bind(credentials.binding_id.to_lowercase())
        .bind(&credentials.host)
        .bind(credentials.port)
        .bind(&credentials.uname)
        .bind(&credentials.pass)
        .bind(&credentials.dbname)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            MetadataError::from_insert(e, || {
                format!("credentials for binding {}", credentials.binding_id)
            })
        })?;
        Ok(())
    }

    async fn get_active_binding(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>> {
        let row = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM cfsb.bindings WHERE binding_id = lower($1) AND status = $2 LIMIT 1",
        )
        .bind(binding_id)
        .bind(RecordStatus::Active.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_binding_any(&self, binding_id: &str) -> MetadataResult<Option<BindingRow>> {
        let row = sqlx::query_as::<_, BindingRow>(
            "SELECT * FROM cfsb.bindings WHERE binding_id = lower($1) LIMIT 1",
        )
        .bind(binding_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn get_credentials(
        &self,
        instance_id: &str,
        binding_id: &str,
    ) -> MetadataResult<Option<CredentialsRow>> {
        let row = sqlx::query_as::<_, CredentialsRow>(
            r#"
            SELECT * FROM cfsb.credentials
            WHERE instance_id = lower($1) AND binding_id = lower($2)
            LIMIT 1
            "#,
        )
        .bind(instance_id)
        .bind(binding_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn retire_binding(
        &self,
        binding_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE cfsb.bindings
            SET status = $2, ineffective_at = $3
            WHERE binding_id = lower($1) AND status = $4
            "#,
        )
        .bind(binding_id)
        .bind(RecordStatus::Retired.as_str())
        .bind(retired_at)
        .bind(RecordStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn retire_bindings_for_instance(
        &self,
        instance_id: &str,
        retired_at: OffsetDateTime,
    ) -> MetadataResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE cfsb.bindings
            SET status = $2, ineffective_at = $3
            WHERE instance_id = lower($1) AND status = $4
            "#,
        )
        .bind(instance_id)
        .bind(RecordStatus::Retired.as_str())
        .bind(retired_at)
        .bind(RecordStatus::Active.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_options_from_fields() {
        let config = ControlDbConfig {
            username: Some("rdpg".to_string()),
            ..ControlDbConfig::default()
        };
        let opts = control_options(&config).unwrap();
        assert_eq!(opts.get_host(), "127.0.0.1");
        assert_eq!(opts.get_port(), 5432);
        assert_eq!(opts.get_username(), "rdpg");
        assert_eq!(opts.get_database(), Some("rdpg"));
    }

    #[test]
    fn test_control_options_prefers_url() {
        let config = ControlDbConfig {
            url: Some("postgres://agent@db.internal:6432/control".to_string()),
            ..ControlDbConfig::default()
        };
        let opts = control_options(&config).unwrap();
        assert_eq!(opts.get_host(), "db.internal");
        assert_eq!(opts.get_port(), 6432);
        assert_eq!(opts.get_database(), Some("control"));
    }

    #[test]
    fn test_control_options_requires_url_or_host() {
        let config = ControlDbConfig {
            host: None,
            ..ControlDbConfig::default()
        };
        assert!(matches!(
            control_options(&config),
            Err(MetadataError::Config(_))
        ));
    }
}
