//! Resource types shared by the stretch networking engine
//!
//! These mirror the small subset of Kubernetes objects the engine needs:
//! nodes (for address discovery) and the per-pod exposure object.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// A node as reported by a cluster's control plane
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterNode {
    /// Node name
    pub name: String,

    /// Node labels (role markers live here)
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    /// Addresses in the order the control plane reports them
    #[serde(default)]
    pub addresses: Vec<NodeAddress>,
}

impl ClusterNode {
    /// Create a node without labels or addresses
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            labels: BTreeMap::new(),
            addresses: Vec::new(),
        }
    }

    /// Add a label
    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    /// Add an external address
    pub fn with_external_ip(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(NodeAddress::new(NodeAddressType::ExternalIP, address));
        self
    }

    /// Add an internal address
    pub fn with_internal_ip(mut self, address: impl Into<String>) -> Self {
        self.addresses.push(NodeAddress::new(NodeAddressType::InternalIP, address));
        self
    }
}

/// A single node address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeAddress {
    /// Address type
    #[serde(rename = "type")]
    pub address_type: NodeAddressType,

    /// IP (or hostname) value
    pub address: String,
}

impl NodeAddress {
    pub fn new(address_type: NodeAddressType, address: impl Into<String>) -> Self {
        Self {
            address_type,
            address: address.into(),
        }
    }
}

/// Types of node addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAddressType {
    /// Routable from outside the cluster
    ExternalIP,
    /// Routable inside the cluster's network
    InternalIP,
    /// Anything else (Hostname, InternalDNS, ...); never selected
    #[serde(other)]
    Other,
}

/// One named port on an exposure object
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposurePort {
    /// Logical port name, unique within the pod
    pub name: String,

    /// Port the container listens on (also used as target port)
    #[serde(rename = "containerPort")]
    pub container_port: u16,

    /// Protocol, always TCP for now
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Externally reachable port, assigned by the control plane
    #[serde(rename = "externalPort")]
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_port: Option<u16>,
}

fn default_protocol() -> String {
    "TCP".to_string()
}

impl ExposurePort {
    /// Create a port whose external port is not yet assigned
    pub fn pending(name: impl Into<String>, container_port: u16) -> Self {
        Self {
            name: name.into(),
            container_port,
            protocol: default_protocol(),
            external_port: None,
        }
    }
}

/// Per-pod object that makes a pod reachable from outside its cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureResource {
    /// Derived name (`<pod><suffix>`)
    pub name: String,

    pub namespace: String,

    /// Ownership labels
    #[serde(default)]
    pub labels: BTreeMap<String, String>,

    #[serde(default)]
    pub annotations: BTreeMap<String, String>,

    /// Selector matching exactly one pod
    pub selector: BTreeMap<String, String>,

    /// Ports ordered by name
    pub ports: Vec<ExposurePort>,

    #[serde(rename = "externalTrafficPolicy")]
    pub external_traffic_policy: String,
}

impl ExposureResource {
    /// Find a port entry by logical name
    pub fn port(&self, name: &str) -> Option<&ExposurePort> {
        self.ports.iter().find(|p| p.name == name)
    }

    /// Whether every port has an external port assigned
    pub fn is_fully_assigned(&self) -> bool {
        self.ports.iter().all(|p| p.external_port.is_some())
    }
}

/// A resolved `address:port` endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    /// Stable address of the cluster the pod runs in
    pub address: String,

    /// External port assigned to the pod's exposure object
    pub port: u16,

    /// Set when the address came from the local cluster because the
    /// pod's own cluster had no cached address
    #[serde(default)]
    pub fallback: bool,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Identifies a controller (voter) pod across clusters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerPod {
    /// Node id in the quorum
    #[serde(rename = "nodeId")]
    pub node_id: i32,

    /// Pod name
    #[serde(rename = "podName")]
    pub pod_name: String,

    /// Cluster the pod runs in
    #[serde(rename = "clusterId")]
    pub cluster_id: String,
}

impl ControllerPod {
    pub fn new(node_id: i32, pod_name: impl Into<String>, cluster_id: impl Into<String>) -> Self {
        Self {
            node_id,
            pod_name: pod_name.into(),
            cluster_id: cluster_id.into(),
        }
    }
}
