//! In-memory cluster gateway
//!
//! Behaves like a control plane that assigns external ports from the
//! NodePort range. Used by the planning CLI and by tests; it also supports
//! deferred port allocation, pinned ports, per-object read latency and
//! simulated outages.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::RwLock;
use tracing::trace;

use super::gateway::{ClusterGateway, GatewayError};
use super::resources::{ClusterNode, ExposureResource};

/// First port handed out by the in-memory allocator
pub const EXTERNAL_PORT_RANGE_START: u16 = 30000;

/// Last port handed out by the in-memory allocator
pub const EXTERNAL_PORT_RANGE_END: u16 = 32767;

/// Gateway backed by process memory
pub struct InMemoryGateway {
    nodes: RwLock<Vec<ClusterNode>>,
    exposures: DashMap<String, ExposureResource>,
    read_delays: DashMap<String, Duration>,

    // Ports are never recycled within one gateway
    next_port: AtomicU32,
    defer_allocation: AtomicBool,
    unreachable: AtomicBool,

    list_nodes_calls: AtomicUsize,
    upsert_calls: AtomicUsize,
    get_calls: AtomicUsize,
    delete_calls: AtomicUsize,
}

impl Default for InMemoryGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryGateway {
    /// Create an empty gateway with immediate port allocation
    pub fn new() -> Self {
        Self {
            nodes: RwLock::new(Vec::new()),
            exposures: DashMap::new(),
            read_delays: DashMap::new(),
            next_port: AtomicU32::new(EXTERNAL_PORT_RANGE_START as u32),
            defer_allocation: AtomicBool::new(false),
            unreachable: AtomicBool::new(false),
            list_nodes_calls: AtomicUsize::new(0),
            upsert_calls: AtomicUsize::new(0),
            get_calls: AtomicUsize::new(0),
            delete_calls: AtomicUsize::new(0),
        }
    }

    /// Seed the node list
    pub fn with_nodes(self, nodes: Vec<ClusterNode>) -> Self {
        Self {
            nodes: RwLock::new(nodes),
            ..self
        }
    }

    /// Leave external ports unassigned until [`assign_pending_ports`] runs
    ///
    /// [`assign_pending_ports`]: InMemoryGateway::assign_pending_ports
    pub fn with_deferred_allocation(self) -> Self {
        self.defer_allocation.store(true, Ordering::SeqCst);
        self
    }

    /// Replace the node list
    pub async fn set_nodes(&self, nodes: Vec<ClusterNode>) {
        *self.nodes.write().await = nodes;
    }

    /// Make every call fail with [`GatewayError::Unreachable`]
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay reads of one exposure object
    pub fn set_read_delay(&self, name: impl Into<String>, delay: Duration) {
        self.read_delays.insert(name.into(), delay);
    }

    /// Assign external ports to every port still pending allocation
    pub fn assign_pending_ports(&self) -> Result<usize, GatewayError> {
        let mut assigned = 0;
        for mut entry in self.exposures.iter_mut() {
            for port in entry.value_mut().ports.iter_mut() {
                if port.external_port.is_none() {
                    port.external_port = Some(self.allocate_port()?);
                    assigned += 1;
                }
            }
        }
        Ok(assigned)
    }

    /// Pin the external port of one named port, returns false if the
    /// object or port does not exist
    pub fn set_external_port(&self, namespace: &str, name: &str, port_name: &str, port: u16) -> bool {
        let Some(mut resource) = self.exposures.get_mut(&key(namespace, name)) else {
            return false;
        };
        match resource.ports.iter_mut().find(|p| p.name == port_name) {
            Some(entry) => {
                entry.external_port = Some(port);
                true
            }
            None => false,
        }
    }

    /// Snapshot of a stored exposure object
    pub fn exposure(&self, namespace: &str, name: &str) -> Option<ExposureResource> {
        self.exposures.get(&key(namespace, name)).map(|r| r.clone())
    }

    pub fn exposure_count(&self) -> usize {
        self.exposures.len()
    }

    pub fn list_nodes_calls(&self) -> usize {
        self.list_nodes_calls.load(Ordering::SeqCst)
    }

    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }

    pub fn delete_calls(&self) -> usize {
        self.delete_calls.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<(), GatewayError> {
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(GatewayError::Unreachable(
                "in-memory gateway marked unreachable".to_string(),
            ));
        }
        Ok(())
    }

    fn allocate_port(&self) -> Result<u16, GatewayError> {
        let port = self.next_port.fetch_add(1, Ordering::SeqCst);
        u16::try_from(port)
            .ok()
            .filter(|p| *p <= EXTERNAL_PORT_RANGE_END)
            .ok_or_else(|| GatewayError::Rejected("external port range exhausted".to_string()))
    }
}

fn key(namespace: &str, name: &str) -> String {
    format!("{}/{}", namespace, name)
}

#[async_trait]
impl ClusterGateway for InMemoryGateway {
    async fn list_nodes(&self) -> Result<Vec<ClusterNode>, GatewayError> {
        self.list_nodes_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        Ok(self.nodes.read().await.clone())
    }

    async fn upsert_exposure(
        &self,
        namespace: &str,
        name: &str,
        desired: &ExposureResource,
    ) -> Result<ExposureResource, GatewayError> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        let mut stored = desired.clone();
        stored.name = name.to_string();
        stored.namespace = namespace.to_string();

        let defer = self.defer_allocation.load(Ordering::SeqCst);
        let mut entry = self
            .exposures
            .entry(key(namespace, name))
            .or_insert_with(|| stored.clone());

        // Ports that keep their name keep their external port
        for port in stored.ports.iter_mut() {
            let previous = entry
                .ports
                .iter()
                .find(|p| p.name == port.name)
                .and_then(|p| p.external_port);
            port.external_port = match previous {
                Some(assigned) => Some(assigned),
                None if defer => None,
                None => Some(self.allocate_port()?),
            };
        }

        *entry = stored.clone();
        trace!("Stored exposure {}/{}", namespace, name);
        Ok(stored)
    }

    async fn get_exposure(
        &self,
        namespace: &str,
        name: &str,
    ) -> Result<Option<ExposureResource>, GatewayError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;

        let delay = self.read_delays.get(name).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self.exposure(namespace, name))
    }

    async fn delete_exposure(&self, namespace: &str, name: &str) -> Result<(), GatewayError> {
        self.delete_calls.fetch_add(1, Ordering::SeqCst);
        self.check_reachable()?;
        self.exposures.remove(&key(namespace, name));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stretch::resources::ExposurePort;
    use std::collections::BTreeMap;

    fn resource(ports: &[(&str, u16)]) -> ExposureResource {
        ExposureResource {
            name: "pod-0-exposure".to_string(),
            namespace: "kafka".to_string(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            selector: BTreeMap::new(),
            ports: ports
                .iter()
                .map(|(name, port)| ExposurePort::pending(*name, *port))
                .collect(),
            external_traffic_policy: "Local".to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_assigns_ports() {
        let gateway = InMemoryGateway::new();
        let stored = gateway
            .upsert_exposure("kafka", "pod-0-exposure", &resource(&[("a", 9091), ("b", 9092)]))
            .await
            .unwrap();

        assert_eq!(stored.ports[0].external_port, Some(30000));
        assert_eq!(stored.ports[1].external_port, Some(30001));
        assert_eq!(gateway.exposure_count(), 1);
    }

    #[tokio::test]
    async fn test_upsert_keeps_assigned_ports() {
        let gateway = InMemoryGateway::new();
        gateway
            .upsert_exposure("kafka", "pod-0-exposure", &resource(&[("a", 9091)]))
            .await
            .unwrap();
        let updated = gateway
            .upsert_exposure("kafka", "pod-0-exposure", &resource(&[("a", 9091), ("b", 9092)]))
            .await
            .unwrap();

        assert_eq!(updated.port("a").unwrap().external_port, Some(30000));
        assert_eq!(updated.port("b").unwrap().external_port, Some(30001));
        assert_eq!(gateway.exposure_count(), 1);
        assert_eq!(gateway.upsert_calls(), 2);
    }

    #[tokio::test]
    async fn test_deferred_allocation() {
        let gateway = InMemoryGateway::new().with_deferred_allocation();
        let stored = gateway
            .upsert_exposure("kafka", "pod-0-exposure", &resource(&[("a", 9091)]))
            .await
            .unwrap();
        assert_eq!(stored.ports[0].external_port, None);

        assert_eq!(gateway.assign_pending_ports().unwrap(), 1);
        let read = gateway
            .get_exposure("kafka", "pod-0-exposure")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(read.ports[0].external_port, Some(30000));
    }

    #[tokio::test]
    async fn test_pinned_port() {
        let gateway = InMemoryGateway::new().with_deferred_allocation();
        gateway
            .upsert_exposure("kafka", "pod-0-exposure", &resource(&[("a", 9091)]))
            .await
            .unwrap();

        assert!(gateway.set_external_port("kafka", "pod-0-exposure", "a", 31001));
        assert!(!gateway.set_external_port("kafka", "pod-0-exposure", "missing", 31002));
        assert!(!gateway.set_external_port("kafka", "other", "a", 31002));
        assert_eq!(
            gateway.exposure("kafka", "pod-0-exposure").unwrap().ports[0].external_port,
            Some(31001)
        );
    }

    #[tokio::test]
    async fn test_delete_missing_is_ok() {
        let gateway = InMemoryGateway::new();
        assert!(gateway.delete_exposure("kafka", "nothing").await.is_ok());
        assert_eq!(gateway.delete_calls(), 1);
    }

    #[tokio::test]
    async fn test_unreachable() {
        let gateway = InMemoryGateway::new();
        gateway.set_unreachable(true);
        let result = gateway.list_nodes().await;
        assert!(matches!(result, Err(GatewayError::Unreachable(_))));
        assert_eq!(gateway.list_nodes_calls(), 1);
    }
}
