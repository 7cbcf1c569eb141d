//! Schema catalog and metadata store for the rdpg agent.
//!
//! This crate provides the control-plane data model:
//! - The catalog of DDL and seed statements the bootstrapper applies
//! - Schema sessions on the control database and node admin databases
//! - Instance, binding, credentials and provisioning-journal records
//! - PostgreSQL and in-memory store implementations

pub mod catalog;
pub mod error;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod schema;
pub mod store;

pub use catalog::{CatalogEntry, CatalogKey, CatalogTarget, SchemaCatalog};
pub use error::{MetadataError, MetadataResult};
pub use memory::MemoryStore;
pub use postgres::PostgresStore;
pub use schema::{PgSchemaConnector, SchemaConnector, SchemaSession};
pub use store::MetadataStore;

use rdpg_core::config::ControlDbConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &ControlDbConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;
    let store = PostgresStore::from_config(config).await?;
    Ok(Arc::new(store) as Arc<dyn MetadataStore>)
}
