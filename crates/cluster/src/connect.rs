//! Administrative connections to individual cluster nodes.

use crate::error::{ClusterError, ClusterResult};
use rdpg_core::Node;
use rdpg_core::config::{ClusterConfig, PgSslMode};
use sqlx::postgres::{PgConnectOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Connection, PgConnection};
use std::time::Duration;

/// Map the configured SSL mode onto sqlx's.
pub fn sqlx_ssl_mode(mode: PgSslMode) -> SqlxPgSslMode {
    match mode {
        PgSslMode::Disable => SqlxPgSslMode::Disable,
        PgSslMode::Prefer => SqlxPgSslMode::Prefer,
        PgSslMode::Require => SqlxPgSslMode::Require,
    }
}

/// Connection options for `database` on `node` as the cluster admin user.
pub fn node_options(config: &ClusterConfig, node: &Node, database: &str) -> PgConnectOptions {
    let mut opts = PgConnectOptions::new()
        .host(&node.host)
        .port(node.port)
        .username(&config.admin_username)
        .database(database)
        .application_name("rdpg-agent");

    if let Some(pass) = &config.admin_password {
        opts = opts.password(pass);
    }
    if let Some(mode) = config.ssl_mode {
        opts = opts.ssl_mode(sqlx_ssl_mode(mode));
    }
    opts
}

/// Open a single connection, failing after `timeout`.
pub async fn connect(
    opts: &PgConnectOptions,
    node: &Node,
    database: &str,
    timeout: Duration,
) -> ClusterResult<PgConnection> {
    match tokio::time::timeout(timeout, PgConnection::connect_with(opts)).await {
        Ok(Ok(conn)) => Ok(conn),
        Ok(Err(source)) => Err(ClusterError::Connect {
            node: node.to_string(),
            database: database.to_string(),
            source,
        }),
        Err(_) => Err(ClusterError::ConnectTimeout {
            node: node.to_string(),
            database: database.to_string(),
            secs: timeout.as_secs(),
        }),
    }
}

/// Reject anything that is not a plain lowercase identifier.
///
/// Role and database names are produced by the identifier sanitizer, so this
/// only trips on programming errors, but names are spliced into DDL.
pub fn validate_identifier(name: &str) -> ClusterResult<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(ClusterError::InvalidIdentifier(name.to_string()))
    }
}

/// Double-quote an identifier for use in DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Single-quote a string literal for use in DDL.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
