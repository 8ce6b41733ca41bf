//! Endpoint Resolver
//!
//! Joins a cluster's stable address with the external port currently
//! assigned on a pod's exposure object. Nothing is cached here: each call
//! reads the exposure object back from the pod's cluster.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, warn};

use super::cache::StableAddressCache;
use super::gateway::{GatewayError, GatewayRegistry};
use super::resources::{Endpoint, ExposureResource};
use crate::config::EngineConfig;

/// Errors from resolving a single endpoint
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResolveError {
    #[error("No gateway registered for cluster '{0}'")]
    GatewayUnavailable(String),

    #[error("No stable address found for cluster '{0}'; address discovery has not succeeded")]
    NoStableAddress(String),

    #[error("Exposure '{name}' not found in cluster '{cluster_id}'")]
    ExposureNotFound { name: String, cluster_id: String },

    #[error("External port for '{port_name}' not assigned on exposure '{name}'")]
    PortNotAssigned { name: String, port_name: String },

    #[error("Gateway for cluster '{cluster_id}' failed: {source}")]
    Gateway {
        cluster_id: String,
        #[source]
        source: GatewayError,
    },
}

impl ResolveError {
    /// Whether a later reconciliation pass may succeed without intervention
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ResolveError::ExposureNotFound { .. }
                | ResolveError::PortNotAssigned { .. }
                | ResolveError::Gateway { .. }
        )
    }
}

// ============================================================================
// SBIO: Pure port lookup
// ============================================================================

/// External port assigned to `port_name` on an exposure object
pub fn assigned_port(resource: &ExposureResource, port_name: &str) -> Result<u16, ResolveError> {
    resource
        .port(port_name)
        .and_then(|p| p.external_port)
        .ok_or_else(|| ResolveError::PortNotAssigned {
            name: resource.name.clone(),
            port_name: port_name.to_string(),
        })
}

/// Resolves pod endpoints
pub struct EndpointResolver {
    config: Arc<EngineConfig>,
    registry: Arc<GatewayRegistry>,
    cache: Arc<StableAddressCache>,
}

impl EndpointResolver {
    pub fn new(
        config: Arc<EngineConfig>,
        registry: Arc<GatewayRegistry>,
        cache: Arc<StableAddressCache>,
    ) -> Self {
        Self {
            config,
            registry,
            cache,
        }
    }

    /// Stable address for a cluster, `(address, fallback)`.
    ///
    /// Falls back to the local cluster's address when the cluster has none.
    /// This can hide a failed discovery, so every fallback is logged and
    /// flagged on the resulting endpoint.
    pub fn stable_address(&self, cluster_id: &str) -> Result<(String, bool), ResolveError> {
        if let Some(address) = self.cache.lookup(cluster_id) {
            return Ok((address, false));
        }

        match self.cache.lookup(&self.config.local_cluster_id) {
            Some(address) => {
                warn!(
                    "No stable address cached for cluster {}, falling back to local cluster {} address {}",
                    cluster_id, self.config.local_cluster_id, address
                );
                Ok((address, true))
            }
            None => Err(ResolveError::NoStableAddress(cluster_id.to_string())),
        }
    }

    /// Resolve `address:port` for a named port of a pod
    pub async fn resolve(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
        port_name: &str,
    ) -> Result<Endpoint, ResolveError> {
        let (address, fallback) = self.stable_address(cluster_id)?;

        let gateway = self
            .registry
            .get(cluster_id)
            .ok_or_else(|| ResolveError::GatewayUnavailable(cluster_id.to_string()))?;

        let name = self.config.exposure_name(pod_name);
        let resource = gateway
            .get_exposure(namespace, &name)
            .await
            .map_err(|source| ResolveError::Gateway {
                cluster_id: cluster_id.to_string(),
                source,
            })?
            .ok_or_else(|| ResolveError::ExposureNotFound {
                name: name.clone(),
                cluster_id: cluster_id.to_string(),
            })?;

        let port = assigned_port(&resource, port_name)?;
        let endpoint = Endpoint {
            address,
            port,
            fallback,
        };

        debug!(
            "Resolved endpoint for pod {} port {} in cluster {}: {}",
            pod_name, port_name, cluster_id, endpoint
        );
        Ok(endpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stretch::exposure::ExposureManager;
    use crate::stretch::memory::InMemoryGateway;
    use crate::stretch::resources::ClusterNode;
    use std::collections::BTreeMap;

    struct Fixture {
        manager: ExposureManager,
        resolver: EndpointResolver,
        east: Arc<InMemoryGateway>,
    }

    async fn fixture(east_nodes: Vec<ClusterNode>) -> Fixture {
        let central = Arc::new(
            InMemoryGateway::new().with_nodes(vec![ClusterNode::new("c1").with_external_ip("10.0.0.5")]),
        );
        let east = Arc::new(InMemoryGateway::new().with_nodes(east_nodes).with_deferred_allocation());
        let registry = Arc::new(
            GatewayRegistry::new("central", central).with_remote("east", east.clone()),
        );
        let config = Arc::new(EngineConfig::new("my-cluster"));
        let cache = Arc::new(StableAddressCache::default());
        let _ = cache.initialize(&registry).await;

        Fixture {
            manager: ExposureManager::new(config.clone(), registry.clone()),
            resolver: EndpointResolver::new(config, registry, cache),
            east,
        }
    }

    fn ports() -> BTreeMap<String, u16> {
        let mut ports = BTreeMap::new();
        ports.insert("replication".to_string(), 9091);
        ports
    }

    #[tokio::test]
    async fn test_resolve_before_ensure() {
        let f = fixture(vec![ClusterNode::new("e1").with_internal_ip("10.0.1.7")]).await;
        let result = f.resolver.resolve("east", "kafka", "pod-1", "replication").await;

        let err = result.unwrap_err();
        assert!(matches!(err, ResolveError::ExposureNotFound { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_resolve_pending_then_assigned() {
        let f = fixture(vec![ClusterNode::new("e1").with_internal_ip("10.0.1.7")]).await;
        f.manager.ensure("east", "kafka", "pod-1", &ports()).await.unwrap();

        let pending = f.resolver.resolve("east", "kafka", "pod-1", "replication").await;
        assert!(matches!(pending, Err(ResolveError::PortNotAssigned { .. })));

        f.east.set_external_port("kafka", "pod-1-exposure", "replication", 31094);
        let endpoint = f
            .resolver
            .resolve("east", "kafka", "pod-1", "replication")
            .await
            .unwrap();

        assert_eq!(endpoint.to_string(), "10.0.1.7:31094");
        assert!(!endpoint.fallback);
    }

    #[tokio::test]
    async fn test_unknown_port_name() {
        let f = fixture(vec![ClusterNode::new("e1").with_internal_ip("10.0.1.7")]).await;
        f.manager.ensure("east", "kafka", "pod-1", &ports()).await.unwrap();
        f.east.assign_pending_ports().unwrap();

        let result = f.resolver.resolve("east", "kafka", "pod-1", "plain").await;
        assert_eq!(
            result,
            Err(ResolveError::PortNotAssigned {
                name: "pod-1-exposure".to_string(),
                port_name: "plain".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_fallback_to_local_address_is_flagged() {
        // East has only control-plane nodes, so its discovery fails
        let f = fixture(vec![ClusterNode::new("cp")
            .with_label("node-role.kubernetes.io/master", "")
            .with_external_ip("10.0.1.1")])
        .await;
        f.manager.ensure("east", "kafka", "pod-1", &ports()).await.unwrap();
        f.east.assign_pending_ports().unwrap();

        let endpoint = f
            .resolver
            .resolve("east", "kafka", "pod-1", "replication")
            .await
            .unwrap();

        assert_eq!(endpoint.address, "10.0.0.5");
        assert!(endpoint.fallback);
    }

    #[tokio::test]
    async fn test_no_stable_address() {
        let config = Arc::new(EngineConfig::new("my-cluster"));
        let registry = Arc::new(GatewayRegistry::new("central", Arc::new(InMemoryGateway::new())));
        let resolver = EndpointResolver::new(config, registry, Arc::new(StableAddressCache::default()));

        let result = resolver.resolve("central", "kafka", "pod-0", "replication").await;
        let err = result.unwrap_err();
        assert_eq!(err, ResolveError::NoStableAddress("central".to_string()));
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_unknown_cluster_gateway() {
        let f = fixture(vec![ClusterNode::new("e1").with_internal_ip("10.0.1.7")]).await;
        let result = f.resolver.resolve("west", "kafka", "pod-9", "replication").await;
        assert_eq!(result, Err(ResolveError::GatewayUnavailable("west".to_string())));
    }
}
