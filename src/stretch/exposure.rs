//! Exposure Resource Manager
//!
//! Creates, updates and deletes the per-pod exposure object. Names and
//! labels are derived from the pod name and the engine config, so repeated
//! reconciliation passes upsert the same object instead of creating new ones.
//! Calls for the same object are serialized here; calls for different pods
//! run independently.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::debug;

use super::gateway::{GatewayError, GatewayRegistry};
use super::resources::{ExposurePort, ExposureResource};
use crate::config::EngineConfig;

/// Errors from ensuring or removing exposure objects
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExposureError {
    #[error("No gateway registered for cluster '{0}'")]
    GatewayUnavailable(String),

    #[error("Gateway for cluster '{cluster_id}' failed: {source}")]
    Gateway {
        cluster_id: String,
        #[source]
        source: GatewayError,
    },
}

// ============================================================================
// SBIO: Pure resource construction
// ============================================================================

/// Build the desired exposure object for one pod.
///
/// Ports come out ordered by name; external ports are left unassigned.
pub fn build_exposure(
    config: &EngineConfig,
    cluster_id: &str,
    namespace: &str,
    pod_name: &str,
    ports: &BTreeMap<String, u16>,
) -> ExposureResource {
    let mut labels = BTreeMap::new();
    labels.insert("app".to_string(), config.app.clone());
    labels.insert(config.label_key("cluster"), config.instance.clone());
    labels.insert(config.label_key("kind"), config.kind.clone());
    labels.insert(
        config.label_key("name"),
        format!("{}-{}", config.instance, config.kind.to_lowercase()),
    );
    labels.insert(config.label_key("stretch-cluster-id"), cluster_id.to_string());

    let mut annotations = BTreeMap::new();
    annotations.insert(config.label_key("stretch-cluster-id"), cluster_id.to_string());

    let mut selector = BTreeMap::new();
    selector.insert(config.pod_name_label.clone(), pod_name.to_string());

    ExposureResource {
        name: config.exposure_name(pod_name),
        namespace: namespace.to_string(),
        labels,
        annotations,
        selector,
        ports: ports
            .iter()
            .map(|(name, port)| ExposurePort::pending(name.clone(), *port))
            .collect(),
        external_traffic_policy: config.external_traffic_policy.clone(),
    }
}

/// Manages exposure objects across all registered clusters
pub struct ExposureManager {
    config: Arc<EngineConfig>,
    registry: Arc<GatewayRegistry>,

    // cluster/namespace/name -> lock
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ExposureManager {
    pub fn new(config: Arc<EngineConfig>, registry: Arc<GatewayRegistry>) -> Self {
        Self {
            config,
            registry,
            locks: DashMap::new(),
        }
    }

    /// Create or update the exposure object for a pod.
    ///
    /// Issues exactly one upsert to the pod's cluster. The returned object
    /// may still have unassigned external ports.
    pub async fn ensure(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
        ports: &BTreeMap<String, u16>,
    ) -> Result<ExposureResource, ExposureError> {
        let gateway = self
            .registry
            .get(cluster_id)
            .ok_or_else(|| ExposureError::GatewayUnavailable(cluster_id.to_string()))?;

        let desired = build_exposure(&self.config, cluster_id, namespace, pod_name, ports);
        let lock = self.lock_for(cluster_id, namespace, &desired.name);
        let _guard = lock.lock().await;

        debug!(
            "Upserting exposure {}/{} for pod {} in cluster {}",
            namespace, desired.name, pod_name, cluster_id
        );

        gateway
            .upsert_exposure(namespace, &desired.name, &desired)
            .await
            .map_err(|source| ExposureError::Gateway {
                cluster_id: cluster_id.to_string(),
                source,
            })
    }

    /// Delete the exposure object for a pod.
    ///
    /// An unknown cluster is treated as already cleaned up.
    pub async fn remove(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
    ) -> Result<(), ExposureError> {
        let Some(gateway) = self.registry.get(cluster_id) else {
            debug!(
                "No gateway for cluster {}, nothing to remove for pod {}",
                cluster_id, pod_name
            );
            return Ok(());
        };

        let name = self.config.exposure_name(pod_name);
        let lock = self.lock_for(cluster_id, namespace, &name);
        let _guard = lock.lock().await;

        debug!(
            "Deleting exposure {}/{} in cluster {}",
            namespace, name, cluster_id
        );

        gateway
            .delete_exposure(namespace, &name)
            .await
            .map_err(|source| ExposureError::Gateway {
                cluster_id: cluster_id.to_string(),
                source,
            })
    }

    fn lock_for(&self, cluster_id: &str, namespace: &str, name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(format!("{}/{}/{}", cluster_id, namespace, name))
            .or_default()
            .clone()
    }
}
