//! Metadata store trait.

use crate::error::MetadataResult;
use crate::repos::{BindingRepo, InstanceRepo};
use async_trait::async_trait;

/// Combined metadata store trait.
///
/// The schema itself is owned by the bootstrapper; stores assume the `cfsb`
/// tables already exist.
#[async_trait]
pub trait MetadataStore: InstanceRepo + BindingRepo + Send + Sync {
    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Get a human-readable name for this store.
    fn backend_name(&self) -> &'static str;
}
