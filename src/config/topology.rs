//! Topology files
//!
//! A topology describes the member clusters, their nodes, and the pods of a
//! stretch cluster. The planning CLI seeds in-memory gateways from it.
//!
//! ```yaml
//! namespace: kafka
//! replicationPort: replication
//! engine:
//!   instance: my-cluster
//! clusters:
//!   central:
//!     nodes:
//!       - name: worker-1
//!         addresses:
//!           - { type: ExternalIP, address: 10.0.0.5 }
//! listeners:
//!   - { name: REPLICATION, port: replication }
//! pods:
//!   - name: my-cluster-pool-0
//!     cluster: central
//!     nodeId: 0
//!     controller: true
//!     ports: { replication: 9091 }
//! ```

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::engine::EngineConfig;
use crate::stretch::resources::{ClusterNode, ControllerPod};

/// Errors found while parsing or validating a topology
#[derive(Error, Debug)]
pub enum TopologyError {
    #[error("Failed to parse topology: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Local cluster '{0}' is not described in the topology")]
    MissingLocalCluster(String),

    #[error("Pod '{pod}' references unknown cluster '{cluster}'")]
    UnknownCluster { pod: String, cluster: String },

    #[error("Pod '{0}' is declared more than once")]
    DuplicatePod(String),

    #[error("Pod '{pod}' has no port named '{port}'")]
    MissingPort { pod: String, port: String },

    #[error("Controller pod '{0}' has no node id")]
    MissingNodeId(String),
}

/// Complete topology file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topology {
    /// Namespace all pods live in
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Port name used for quorum voter endpoints
    #[serde(default = "default_replication_port")]
    pub replication_port: String,

    pub engine: EngineConfig,

    /// Clusters keyed by id
    pub clusters: BTreeMap<String, ClusterTopology>,

    /// Advertised listeners, in output order
    #[serde(default)]
    pub listeners: Vec<ListenerTopology>,

    #[serde(default)]
    pub pods: Vec<PodTopology>,
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_replication_port() -> String {
    "replication".to_string()
}

/// One member cluster
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClusterTopology {
    #[serde(default)]
    pub nodes: Vec<ClusterNode>,
}

/// Listener name mapped to a pod port name
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerTopology {
    pub name: String,
    pub port: String,
}

/// One pod of the stretch cluster
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodTopology {
    pub name: String,

    /// Cluster the pod is scheduled in
    pub cluster: String,

    #[serde(default)]
    pub node_id: Option<i32>,

    /// Whether the pod is a quorum voter
    #[serde(default)]
    pub controller: bool,

    /// Port name to container port
    #[serde(default)]
    pub ports: BTreeMap<String, u16>,
}

impl Topology {
    /// Listener name to port name pairs, in declaration order
    pub fn listener_pairs(&self) -> Vec<(String, String)> {
        self.listeners
            .iter()
            .map(|l| (l.name.clone(), l.port.clone()))
            .collect()
    }

    /// Controller pods in declaration order
    pub fn controller_pods(&self) -> Vec<ControllerPod> {
        self.pods
            .iter()
            .filter(|p| p.controller)
            .filter_map(|p| {
                p.node_id
                    .map(|id| ControllerPod::new(id, p.name.clone(), p.cluster.clone()))
            })
            .collect()
    }
}

// ============================================================================
// SBIO: Pure parsing and validation
// ============================================================================

/// Parse a topology from YAML and validate it
pub fn parse_topology(content: &str) -> Result<Topology, TopologyError> {
    let topology: Topology = serde_yaml::from_str(content)?;
    validate_topology(&topology)?;
    Ok(topology)
}

/// Check cross references inside a topology
pub fn validate_topology(topology: &Topology) -> Result<(), TopologyError> {
    let local = &topology.engine.local_cluster_id;
    if !topology.clusters.contains_key(local) {
        return Err(TopologyError::MissingLocalCluster(local.clone()));
    }

    let mut seen = HashSet::new();
    for pod in &topology.pods {
        if !seen.insert(pod.name.as_str()) {
            return Err(TopologyError::DuplicatePod(pod.name.clone()));
        }

        if !topology.clusters.contains_key(&pod.cluster) {
            return Err(TopologyError::UnknownCluster {
                pod: pod.name.clone(),
                cluster: pod.cluster.clone(),
            });
        }

        for listener in &topology.listeners {
            if !pod.ports.contains_key(&listener.port) {
                return Err(TopologyError::MissingPort {
                    pod: pod.name.clone(),
                    port: listener.port.clone(),
                });
            }
        }

        if pod.controller {
            if pod.node_id.is_none() {
                return Err(TopologyError::MissingNodeId(pod.name.clone()));
            }
            if !pod.ports.contains_key(&topology.replication_port) {
                return Err(TopologyError::MissingPort {
                    pod: pod.name.clone(),
                    port: topology.replication_port.clone(),
                });
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOPOLOGY: &str = r#"
namespace: kafka
engine:
  instance: my-cluster
clusters:
  central:
    nodes:
      - name: c-worker
        addresses:
          - { type: ExternalIP, address: 10.0.0.5 }
  east:
    nodes:
      - name: e-worker
        addresses:
          - { type: InternalIP, address: 10.0.1.7 }
listeners:
  - { name: REPLICATION, port: replication }
  - { name: PLAIN, port: plain }
pods:
  - name: my-cluster-pool-0
    cluster: central
    nodeId: 0
    controller: true
    ports: { replication: 9091, plain: 9092 }
  - name: my-cluster-pool-1
    cluster: east
    nodeId: 1
    ports: { replication: 9091, plain: 9092 }
"#;

    #[test]
    fn test_parse_topology() {
        let topology = parse_topology(TOPOLOGY).unwrap();
        assert_eq!(topology.namespace, "kafka");
        assert_eq!(topology.replication_port, "replication");
        assert_eq!(topology.clusters.len(), 2);
        assert_eq!(topology.pods.len(), 2);
        assert_eq!(
            topology.listener_pairs(),
            vec![
                ("REPLICATION".to_string(), "replication".to_string()),
                ("PLAIN".to_string(), "plain".to_string()),
            ]
        );
    }

    #[test]
    fn test_controller_pods() {
        let topology = parse_topology(TOPOLOGY).unwrap();
        let controllers = topology.controller_pods();
        assert_eq!(controllers, vec![ControllerPod::new(0, "my-cluster-pool-0", "central")]);
    }

    #[test]
    fn test_missing_local_cluster() {
        let yaml = TOPOLOGY.replace("central:", "west:").replace("cluster: central", "cluster: west");
        let result = parse_topology(&yaml);
        assert!(matches!(result, Err(TopologyError::MissingLocalCluster(_))));
    }

    #[test]
    fn test_unknown_cluster() {
        let yaml = TOPOLOGY.replace("cluster: east", "cluster: south");
        let result = parse_topology(&yaml);
        assert!(matches!(result, Err(TopologyError::UnknownCluster { .. })));
    }

    #[test]
    fn test_missing_listener_port() {
        let yaml = TOPOLOGY.replace("{ replication: 9091, plain: 9092 }\n  - name", "{ replication: 9091 }\n  - name");
        let result = parse_topology(&yaml);
        assert!(matches!(result, Err(TopologyError::MissingPort { .. })));
    }

    #[test]
    fn test_duplicate_pod() {
        let yaml = TOPOLOGY.replace("my-cluster-pool-1", "my-cluster-pool-0");
        let result = parse_topology(&yaml);
        assert!(matches!(result, Err(TopologyError::DuplicatePod(_))));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = parse_topology("clusters: [");
        assert!(matches!(result, Err(TopologyError::Parse(_))));
    }
}
