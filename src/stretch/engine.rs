//! Stretch networking engine
//!
//! Entry point for the orchestration loop: initialize once at startup,
//! ensure/remove exposure objects per pod on every reconciliation pass, and
//! build listener/voter strings when a member's configuration is rendered.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::aggregator::{AggregateError, ListenerAggregator};
use super::cache::{AddressCacheError, StableAddressCache};
use super::exposure::{ExposureError, ExposureManager};
use super::gateway::GatewayRegistry;
use super::resolver::{EndpointResolver, ResolveError};
use super::resources::{ControllerPod, Endpoint, ExposureResource};
use super::selector::{AddressSelector, FirstWorkerNode};
use super::PROVIDER_NAME;
use crate::config::EngineConfig;

/// Cross-cluster endpoint resolution for a stretch cluster
pub struct StretchEngine {
    config: Arc<EngineConfig>,
    registry: Arc<GatewayRegistry>,
    cache: Arc<StableAddressCache>,
    exposures: ExposureManager,
    resolver: Arc<EndpointResolver>,
    aggregator: ListenerAggregator,
}

impl StretchEngine {
    /// Create an engine using the first-worker-node address selection
    pub fn new(config: EngineConfig, registry: GatewayRegistry) -> Self {
        let selector = FirstWorkerNode::new(config.control_plane_roles.clone());
        Self::with_selector(config, registry, Arc::new(selector))
    }

    /// Create an engine with a custom address selection strategy
    pub fn with_selector(
        config: EngineConfig,
        registry: GatewayRegistry,
        selector: Arc<dyn AddressSelector>,
    ) -> Self {
        let config = Arc::new(config);
        let registry = Arc::new(registry);
        let cache = Arc::new(StableAddressCache::new(selector));
        let resolver = Arc::new(EndpointResolver::new(
            config.clone(),
            registry.clone(),
            cache.clone(),
        ));

        Self {
            exposures: ExposureManager::new(config.clone(), registry.clone()),
            aggregator: ListenerAggregator::new(resolver.clone()),
            config,
            registry,
            cache,
            resolver,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &GatewayRegistry {
        &self.registry
    }

    /// Short name of the exposure strategy
    pub fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    /// Discover and cache one stable address per registered cluster
    pub async fn initialize(&self) -> Result<(), AddressCacheError> {
        self.cache.initialize(&self.registry).await
    }

    /// Cached stable addresses by cluster id
    pub fn stable_addresses(&self) -> BTreeMap<String, String> {
        self.cache.snapshot()
    }

    /// Create or update the exposure object for a pod
    pub async fn ensure_exposure(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
        ports: &BTreeMap<String, u16>,
    ) -> Result<ExposureResource, ExposureError> {
        self.exposures
            .ensure(cluster_id, namespace, pod_name, ports)
            .await
    }

    /// Delete the exposure object for a pod
    pub async fn remove_exposure(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
    ) -> Result<(), ExposureError> {
        self.exposures.remove(cluster_id, namespace, pod_name).await
    }

    /// Resolve a single pod endpoint
    pub async fn resolve_endpoint(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
        port_name: &str,
    ) -> Result<Endpoint, ResolveError> {
        self.resolver
            .resolve(cluster_id, namespace, pod_name, port_name)
            .await
    }

    /// Advertised listener string for a pod
    pub async fn build_advertised_listeners(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
        listeners: &[(String, String)],
    ) -> Result<String, AggregateError> {
        self.aggregator
            .build_advertised_listeners(cluster_id, namespace, pod_name, listeners)
            .await
    }

    /// Quorum voter string for the controller pods
    pub async fn build_quorum_voters(
        &self,
        namespace: &str,
        controllers: &[ControllerPod],
        replication_port_name: &str,
    ) -> Result<String, AggregateError> {
        self.aggregator
            .build_quorum_voters(namespace, controllers, replication_port_name)
            .await
    }

    /// In-cluster DNS name of a service
    pub fn service_dns_name(&self, namespace: &str, service_name: &str) -> String {
        format!("{}.{}.svc", service_name, namespace)
    }

    /// In-cluster DNS name of a pod behind a headless service
    pub fn pod_dns_name(&self, namespace: &str, service_name: &str, pod_name: &str) -> String {
        format!("{}.{}.{}.svc", pod_name, service_name, namespace)
    }
}
