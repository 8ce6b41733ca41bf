//! Stable Address Cache
//!
//! Holds one externally reachable address per cluster for the lifetime of
//! the process. Entries are written once and never overwritten; there is no
//! health checking, so a cached node that goes away keeps being handed out
//! until restart. Swap the [`AddressSelector`] to change how the address is
//! picked.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::gateway::{GatewayError, GatewayRegistry};
use super::selector::{AddressSelector, FirstWorkerNode};

/// Errors raised while discovering stable addresses
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressCacheError {
    #[error("No eligible node with an address found in cluster '{0}'")]
    NoEligibleNode(String),

    #[error("Failed to list nodes in cluster '{cluster_id}': {source}")]
    Gateway {
        cluster_id: String,
        #[source]
        source: GatewayError,
    },
}

impl AddressCacheError {
    /// Cluster the failure belongs to
    pub fn cluster_id(&self) -> &str {
        match self {
            AddressCacheError::NoEligibleNode(id) => id,
            AddressCacheError::Gateway { cluster_id, .. } => cluster_id,
        }
    }
}

/// Write-once map of cluster id to stable address
pub struct StableAddressCache {
    addresses: DashMap<String, String>,
    selector: Arc<dyn AddressSelector>,
}

impl Default for StableAddressCache {
    fn default() -> Self {
        Self::new(Arc::new(FirstWorkerNode::default()))
    }
}

impl StableAddressCache {
    pub fn new(selector: Arc<dyn AddressSelector>) -> Self {
        Self {
            addresses: DashMap::new(),
            selector,
        }
    }

    /// Discover an address for every cluster in `registry`.
    ///
    /// Discoveries run concurrently and all run to completion; successful
    /// clusters are cached even when others fail. The first failure (in
    /// cluster id order) is returned. Clusters that already have an entry
    /// are skipped, so calling this again only retries failed clusters.
    pub async fn initialize(&self, registry: &GatewayRegistry) -> Result<(), AddressCacheError> {
        let pending: Vec<_> = registry
            .iter()
            .filter(|(cluster_id, _)| !self.addresses.contains_key(*cluster_id))
            .collect();

        let discoveries = pending.iter().map(|(cluster_id, gateway)| async move {
            let nodes = gateway
                .list_nodes()
                .await
                .map_err(|source| AddressCacheError::Gateway {
                    cluster_id: cluster_id.to_string(),
                    source,
                })?;

            let selected = self
                .selector
                .select(cluster_id, &nodes)
                .ok_or_else(|| AddressCacheError::NoEligibleNode(cluster_id.to_string()))?;

            info!(
                "Selected stable address {} ({:?}) from node {} in cluster {}",
                selected.address, selected.address_type, selected.node_name, cluster_id
            );
            Ok::<_, AddressCacheError>((cluster_id.to_string(), selected.address))
        });

        let mut first_error = None;
        for result in join_all(discoveries).await {
            match result {
                Ok((cluster_id, address)) => self.insert_if_absent(cluster_id, address),
                Err(e) => {
                    warn!("Stable address discovery failed: {}", e);
                    first_error.get_or_insert(e);
                }
            }
        }

        info!("Stable addresses: {:?}", self.snapshot());

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Cached address for a cluster
    pub fn lookup(&self, cluster_id: &str) -> Option<String> {
        self.addresses.get(cluster_id).map(|a| a.value().clone())
    }

    /// All cached addresses, sorted by cluster id
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.addresses
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    fn insert_if_absent(&self, cluster_id: String, address: String) {
        match self.addresses.entry(cluster_id) {
            Entry::Occupied(existing) => debug!(
                "Keeping cached address {} for cluster {}",
                existing.get(),
                existing.key()
            ),
            Entry::Vacant(slot) => {
                slot.insert(address);
            }
        }
    }
}
