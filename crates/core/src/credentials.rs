//! Connection credentials handed to bound applications.
//!
//! Only the canonical fields are stored. The URI, DSN and JDBC forms are
//! rebuilt from them on every call so the three encodings can never disagree.

use crate::secret::Secret;
use crate::topology::Node;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use std::fmt;

/// Seconds a client waits for a connection before giving up.
pub const CLIENT_CONNECT_TIMEOUT_SECS: u32 = 5;

/// `sslmode` advertised to clients.
pub const CLIENT_SSL_MODE: &str = "disable";

/// Canonical connection parameters for one binding.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Secret,
    pub database: String,
}

impl Credentials {
    pub fn new(endpoint: &Node, username: &str, password: Secret, database: &str) -> Self {
        Self {
            host: endpoint.host.clone(),
            port: endpoint.port,
            username: username.to_string(),
            password,
            database: database.to_string(),
        }
    }

    /// Generic `postgres://` URI.
    pub fn uri(&self) -> String {
        format!(
            "postgres://{}@{}:{}/{}?connect_timeout={}&sslmode={}",
            self.username,
            self.host,
            self.port,
            self.database,
            CLIENT_CONNECT_TIMEOUT_SECS,
            CLIENT_SSL_MODE
        )
    }

    /// libpq keyword/value DSN.
    pub fn dsn(&self) -> String {
        format!(
            "user={} host={} port={} dbname={} connect_timeout={} sslmode={}",
            self.username,
            self.host,
            self.port,
            self.database,
            CLIENT_CONNECT_TIMEOUT_SECS,
            CLIENT_SSL_MODE
        )
    }

    /// JDBC form of [`Credentials::uri`].
    pub fn jdbc_uri(&self) -> String {
        format!("jdbc:{}", self.uri())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password)
            .field("database", &self.database)
            .finish()
    }
}

impl Serialize for Credentials {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut doc = serializer.serialize_struct("Credentials", 8)?;
        doc.serialize_field("uri", &self.uri())?;
        doc.serialize_field("dsn", &self.dsn())?;
        doc.serialize_field("jdbc_uri", &self.jdbc_uri())?;
        doc.serialize_field("host", &self.host)?;
        doc.serialize_field("port", &self.port.to_string())?;
        doc.serialize_field("username", &self.username)?;
        doc.serialize_field("password", self.password.expose())?;
        doc.serialize_field("database", &self.database)?;
        doc.end()
    }
}
