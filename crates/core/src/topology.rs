//! Cluster topology and client endpoint selection.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Default PostgreSQL port.
pub const DEFAULT_PG_PORT: u16 = 5432;

/// A cluster node reachable by clients and by the agent.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Node {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PG_PORT
}

impl Node {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// Chooses which node clients should connect to.
pub trait EndpointPolicy: Send + Sync {
    /// Pick one node out of the current topology.
    fn select<'a>(&self, nodes: &'a [Node]) -> crate::Result<&'a Node>;

    fn name(&self) -> &'static str;
}

/// Always hands out the first node of the topology list.
#[derive(Debug, Default)]
pub struct FirstNode;

impl EndpointPolicy for FirstNode {
    fn select<'a>(&self, nodes: &'a [Node]) -> crate::Result<&'a Node> {
        nodes.first().ok_or(crate::Error::EmptyTopology)
    }

    fn name(&self) -> &'static str {
        "first"
    }
}

/// Cycles through the topology list, one node per call.
#[derive(Debug, Default)]
pub struct RoundRobin {
    cursor: AtomicUsize,
}

impl EndpointPolicy for RoundRobin {
    fn select<'a>(&self, nodes: &'a [Node]) -> crate::Result<&'a Node> {
        if nodes.is_empty() {
            return Err(crate::Error::EmptyTopology);
        }
        let index = self.cursor.fetch_add(1, Ordering::Relaxed) % nodes.len();
        Ok(&nodes[index])
    }

    fn name(&self) -> &'static str {
        "round_robin"
    }
}

/// Endpoint selection policy configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndpointSelection {
    #[default]
    First,
    RoundRobin,
}

impl EndpointSelection {
    /// Build the policy this setting names.
    pub fn policy(self) -> Box<dyn EndpointPolicy> {
        match self {
            Self::First => Box::new(FirstNode),
            Self::RoundRobin => Box::new(RoundRobin::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn nodes() -> Vec<Node> {
        vec![
            Node::new("10.0.0.1", 5432),
            Node::new("10.0.0.2", 5432),
            Node::new("10.0.0.3", 7432),
        ]
    }

    #[test]
    fn test_first_node() {
        let nodes = nodes();
        let policy = FirstNode;
        assert_eq!(policy.select(&nodes).unwrap().host, "10.0.0.1");
        assert_eq!(policy.select(&nodes).unwrap().host, "10.0.0.1");
    }

    #[test]
    fn test_round_robin_cycles() {
        let nodes = nodes();
        let policy = RoundRobin::default();
        let picked: Vec<_> = (0..4)
            .map(|_| policy.select(&nodes).unwrap().to_string())
            .collect();
        assert_eq!(
            picked,
            vec!["10.0.0.1:5432", "10.0.0.2:5432", "10.0.0.3:7432", "10.0.0.1:5432"]
        );
    }

    #[test]
    fn test_empty_topology_is_an_error() {
        assert!(matches!(
            FirstNode.select(&[]),
            Err(crate::Error::EmptyTopology)
        ));
        assert!(matches!(
            RoundRobin::default().select(&[]),
            Err(crate::Error::EmptyTopology)
        ));
    }

    #[test]
    fn test_selection_config() {
        assert_eq!(EndpointSelection::default().policy().name(), "first");
        let parsed: EndpointSelection = serde_json::from_str("\"round_robin\"").unwrap();
        assert_eq!(parsed.policy().name(), "round_robin");
    }
}
