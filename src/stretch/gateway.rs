//! Cluster resource gateway - the engine's only view of a control plane
//!
//! One gateway exists per member cluster, plus one for the local cluster.
//! Implementations own transport, retries and timeouts; the engine only
//! calls this small method set and never retries on its own.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use super::resources::{ClusterNode, ExposureResource};

/// Errors reported by a gateway implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Control plane unreachable: {0}")]
    Unreachable(String),

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

// ============================================================================
// SBIO: Trait for abstraction (allows in-memory gateways in tests)
// ============================================================================

/// Operations the engine needs from a single cluster's control plane
#[async_trait]
pub trait ClusterGateway: Send + Sync {
    /// Lists the cluster's nodes in control-plane order
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>, GatewayError>;

    /// Creates the exposure object or updates it in place.
    ///
    /// Returns the stored object; external ports may still be unassigned.
    async fn upsert_exposure(
        &self,
        namespace: &str,
        name: &str,
        desired: &ExposureResource,
    ) -> Result<ExposureResource, GatewayError>;

    /// Reads back an exposure object, `None` if it does not exist
    async fn get_exposure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ExposureResource>, GatewayError>;

    /// Deletes an exposure object if it exists
    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), GatewayError>;
}

/// Shared handle to a gateway
pub type SharedGateway = Arc<dyn ClusterGateway>;

/// Gateways keyed by cluster id, including the local cluster
///
/// Iteration order is sorted by cluster id so discovery and error
/// reporting are deterministic.
#[derive(Clone)]
pub struct GatewayRegistry {
    local_cluster_id: String,
    gateways: BTreeMap<String, SharedGateway>,
}

impl GatewayRegistry {
    /// Create a registry holding only the local cluster's gateway
    pub fn new(local_cluster_id: impl Into<String>, local: SharedGateway) -> Self {
        let local_cluster_id = local_cluster_id.into();
        let mut gateways = BTreeMap::new();
        gateways.insert(local_cluster_id.clone(), local);
        Self {
            local_cluster_id,
            gateways,
        }
    }

    /// Register a remote cluster's gateway
    pub fn with_remote(mut self, cluster_id: impl Into<String>, gateway: SharedGateway) -> Self {
        self.insert(cluster_id, gateway);
        self
    }

    /// Register (or replace) a remote cluster's gateway
    pub fn insert(&mut self, cluster_id: impl Into<String>, gateway: SharedGateway) {
        self.gateways.insert(cluster_id.into(), gateway);
    }

    /// Gateway registered for `cluster_id`. Never falls back to the local one.
    pub fn get(&self, cluster_id: &str) -> Option<SharedGateway> {
        self.gateways.get(cluster_id).cloned()
    }

    pub fn contains(&self, cluster_id: &str) -> bool {
        self.gateways.contains_key(cluster_id)
    }

    pub fn local_cluster_id(&self) -> &str {
        &self.local_cluster_id
    }

    /// Iterate over `(cluster_id, gateway)` pairs in sorted order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SharedGateway)> {
        self.gateways.iter().map(|(id, gw)| (id.as_str(), gw))
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        self.gateways.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.gateways.len()
    }

    pub fn is_empty(&self) -> bool {
        self.gateways.is_empty()
    }
}
