//! Broker wiring over in-memory fakes.

use super::cluster::RecordingCluster;
use super::schema::FakeConnector;
use super::store::FlakyStore;
use rdpg_agent::{Bootstrapper, Broker};
use rdpg_core::config::{BootstrapConfig, ProvisioningConfig};
use rdpg_core::{Instance, Node};
use rdpg_metadata::SchemaCatalog;
use std::sync::Arc;

/// A broker plus handles on every fake behind it.
#[allow(dead_code)]
pub struct Harness {
    pub broker: Broker,
    pub cluster: Arc<RecordingCluster>,
    pub store: Arc<FlakyStore>,
    pub schema: FakeConnector,
}

#[allow(dead_code)]
pub fn three_nodes() -> Vec<Node> {
    vec![
        Node::new("10.0.0.1", 7432),
        Node::new("10.0.0.2", 7432),
        Node::new("10.0.0.3", 7432),
    ]
}

#[allow(dead_code)]
pub fn harness() -> Harness {
    harness_with(ProvisioningConfig::default(), three_nodes())
}

#[allow(dead_code)]
pub fn harness_with(config: ProvisioningConfig, nodes: Vec<Node>) -> Harness {
    let cluster = Arc::new(RecordingCluster::new(nodes));
    let store = Arc::new(FlakyStore::new());
    let schema = FakeConnector::new();
    let bootstrapper = Bootstrapper::new(
        Arc::new(schema.clone()),
        cluster.clone(),
        SchemaCatalog::standard(),
        BootstrapConfig::default(),
    )
    .expect("standard catalog is complete");
    let broker = Broker::new(cluster.clone(), store.clone(), bootstrapper, &config);
    Harness {
        broker,
        cluster,
        store,
        schema,
    }
}

/// `acme-1` on the default service and plan.
#[allow(dead_code)]
pub fn acme() -> Instance {
    Instance::new("acme-1", "rdpg", "small", "o1", "s1").expect("valid instance")
}

#[allow(dead_code)]
pub fn is_lower_hex(value: &str, len: usize) -> bool {
    value.len() == len
        && value
            .chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}
