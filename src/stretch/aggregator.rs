//! Listener/Voter Aggregator
//!
//! Renders the two boot configuration strings a member needs:
//! advertised listeners (`NAME://address:port,...`) and quorum voters
//! (`id@address:port,...`). Every entry is resolved concurrently, output
//! keeps input order, and any failed entry fails the whole string.

use std::sync::Arc;

use futures::future::join_all;
use thiserror::Error;
use tracing::debug;

use super::resolver::{EndpointResolver, ResolveError};
use super::resources::{ControllerPod, Endpoint};

/// A failed listener or voter aggregation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    #[error("Failed to resolve endpoint for {entry}: {source}")]
    Resolution {
        /// Listener name or voter node id that failed
        entry: String,
        #[source]
        source: ResolveError,
    },
}

impl AggregateError {
    /// The underlying resolution failure
    pub fn resolve_error(&self) -> &ResolveError {
        match self {
            AggregateError::Resolution { source, .. } => source,
        }
    }
}

// ============================================================================
// SBIO: Pure rendering
// ============================================================================

/// `NAME://address:port` entries joined by commas
pub fn render_listeners(entries: &[(String, Endpoint)]) -> String {
    entries
        .iter()
        .map(|(name, endpoint)| format!("{}://{}", name, endpoint))
        .collect::<Vec<_>>()
        .join(",")
}

/// `id@address:port` entries joined by commas
pub fn render_voters(entries: &[(i32, Endpoint)]) -> String {
    entries
        .iter()
        .map(|(id, endpoint)| format!("{}@{}", id, endpoint))
        .collect::<Vec<_>>()
        .join(",")
}

/// Pair labels with results, surfacing the first failure in input order
fn collect_ordered<K: ToString + Clone>(
    keys: &[K],
    results: Vec<Result<Endpoint, ResolveError>>,
) -> Result<Vec<(K, Endpoint)>, AggregateError> {
    keys.iter()
        .zip(results)
        .map(|(key, result)| {
            result
                .map(|endpoint| (key.clone(), endpoint))
                .map_err(|source| AggregateError::Resolution {
                    entry: key.to_string(),
                    source,
                })
        })
        .collect()
}

/// Builds listener and voter strings from resolved endpoints
pub struct ListenerAggregator {
    resolver: Arc<EndpointResolver>,
}

impl ListenerAggregator {
    pub fn new(resolver: Arc<EndpointResolver>) -> Self {
        Self { resolver }
    }

    /// Advertised listeners for one pod.
    ///
    /// `listeners` maps listener name to port name; the output follows its order.
    pub async fn build_advertised_listeners(
        &self,
        cluster_id: &str,
        namespace: &str,
        pod_name: &str,
        listeners: &[(String, String)],
    ) -> Result<String, AggregateError> {
        let resolutions = listeners.iter().map(|(_, port_name)| {
            self.resolver
                .resolve(cluster_id, namespace, pod_name, port_name)
        });
        let results = join_all(resolutions).await;

        let names: Vec<String> = listeners.iter().map(|(name, _)| name.clone()).collect();
        let entries = collect_ordered(&names, results)?;
        let rendered = render_listeners(&entries);

        debug!("Advertised listeners for pod {}: {}", pod_name, rendered);
        Ok(rendered)
    }

    /// Quorum voters for a set of controller pods, in the given order
    pub async fn build_quorum_voters(
        &self,
        namespace: &str,
        controllers: &[ControllerPod],
        replication_port_name: &str,
    ) -> Result<String, AggregateError> {
        let resolutions = controllers.iter().map(|pod| {
            self.resolver.resolve(
                &pod.cluster_id,
                namespace,
                &pod.pod_name,
                replication_port_name,
            )
        });
        let results = join_all(resolutions).await;

        let ids: Vec<i32> = controllers.iter().map(|pod| pod.node_id).collect();
        let entries = collect_ordered(&ids, results)?;
        let rendered = render_voters(&entries);

        debug!("Quorum voters: {}", rendered);
        Ok(rendered)
    }
}
