//! Stable address selection
//!
//! An exposure object is reachable through every node of its cluster, so
//! one worker node address is enough. Selection is a pure function over the
//! node list; the [`AddressSelector`] trait lets a pool or failover strategy
//! replace the default without touching the cache or its callers.

use super::resources::{ClusterNode, NodeAddressType};

/// Role labels that mark a control-plane node
pub const DEFAULT_CONTROL_PLANE_ROLES: [&str; 2] = [
    "node-role.kubernetes.io/master",
    "node-role.kubernetes.io/control-plane",
];

/// The address chosen for a cluster and where it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedAddress {
    pub node_name: String,
    pub address: String,
    pub address_type: NodeAddressType,
}

/// Strategy for picking a cluster's stable address
pub trait AddressSelector: Send + Sync {
    /// Pick one address from `nodes`, `None` when no node is eligible
    fn select(&self, cluster_id: &str, nodes: &[ClusterNode]) -> Option<SelectedAddress>;
}

/// Picks the first non-control-plane node that has an address,
/// preferring its external address over the internal one
#[derive(Debug, Clone)]
pub struct FirstWorkerNode {
    control_plane_roles: Vec<String>,
}

impl Default for FirstWorkerNode {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_PLANE_ROLES.iter().map(|r| r.to_string()))
    }
}

impl FirstWorkerNode {
    pub fn new(control_plane_roles: impl IntoIterator<Item = String>) -> Self {
        Self {
            control_plane_roles: control_plane_roles.into_iter().collect(),
        }
    }
}

impl AddressSelector for FirstWorkerNode {
    fn select(&self, _cluster_id: &str, nodes: &[ClusterNode]) -> Option<SelectedAddress> {
        select_first_worker(nodes, &self.control_plane_roles)
    }
}

// ============================================================================
// SBIO: Pure selection logic
// ============================================================================

/// Whether a node carries any of the control-plane role labels
pub fn is_control_plane(node: &ClusterNode, roles: &[String]) -> bool {
    roles.iter().any(|role| node.labels.contains_key(role))
}

/// External address if present, otherwise the first internal one
pub fn preferred_address(node: &ClusterNode) -> Option<(NodeAddressType, &str)> {
    let mut internal = None;
    for addr in &node.addresses {
        match addr.address_type {
            NodeAddressType::ExternalIP => {
                return Some((NodeAddressType::ExternalIP, addr.address.as_str()));
            }
            NodeAddressType::InternalIP if internal.is_none() => {
                internal = Some((NodeAddressType::InternalIP, addr.address.as_str()));
            }
            _ => {}
        }
    }
    internal
}

/// First worker node (in list order) yielding an address wins
pub fn select_first_worker(nodes: &[ClusterNode], roles: &[String]) -> Option<SelectedAddress> {
    nodes
        .iter()
        .filter(|node| !is_control_plane(node, roles))
        .find_map(|node| {
            preferred_address(node).map(|(address_type, address)| SelectedAddress {
                node_name: node.name.clone(),
                address: address.to_string(),
                address_type,
            })
        })
}
