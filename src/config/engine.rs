//! Engine configuration
//!
//! Naming and labelling conventions for exposure objects, plus the
//! reserved id of the local cluster.

use serde::{Deserialize, Serialize};

use crate::stretch::selector::DEFAULT_CONTROL_PLANE_ROLES;

/// Configuration for a [`crate::stretch::StretchEngine`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    /// Name of the logical distributed-system instance
    pub instance: String,

    /// Kind of the owning resource
    #[serde(default = "default_kind")]
    pub kind: String,

    /// Value of the `app` label
    #[serde(default = "default_app")]
    pub app: String,

    /// Prefix for ownership labels and annotations
    #[serde(default = "default_label_prefix")]
    pub label_prefix: String,

    /// Reserved id of the local (central) cluster
    #[serde(default = "default_local_cluster_id")]
    pub local_cluster_id: String,

    /// Appended to the pod name to derive the exposure object name
    #[serde(default = "default_exposure_suffix")]
    pub exposure_suffix: String,

    /// Label that identifies exactly one pod
    #[serde(default = "default_pod_name_label")]
    pub pod_name_label: String,

    #[serde(default = "default_external_traffic_policy")]
    pub external_traffic_policy: String,

    /// Node labels marking control-plane nodes
    #[serde(default = "default_control_plane_roles")]
    pub control_plane_roles: Vec<String>,
}

fn default_kind() -> String {
    "StretchCluster".to_string()
}

fn default_app() -> String {
    "stretchnet".to_string()
}

fn default_label_prefix() -> String {
    "stretch.io".to_string()
}

fn default_local_cluster_id() -> String {
    crate::stretch::LOCAL_CLUSTER_ID.to_string()
}

fn default_exposure_suffix() -> String {
    "-exposure".to_string()
}

fn default_pod_name_label() -> String {
    "statefulset.kubernetes.io/pod-name".to_string()
}

fn default_external_traffic_policy() -> String {
    "Local".to_string()
}

fn default_control_plane_roles() -> Vec<String> {
    DEFAULT_CONTROL_PLANE_ROLES
        .iter()
        .map(|r| r.to_string())
        .collect()
}

impl EngineConfig {
    /// Config with defaults for everything but the instance name
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            kind: default_kind(),
            app: default_app(),
            label_prefix: default_label_prefix(),
            local_cluster_id: default_local_cluster_id(),
            exposure_suffix: default_exposure_suffix(),
            pod_name_label: default_pod_name_label(),
            external_traffic_policy: default_external_traffic_policy(),
            control_plane_roles: default_control_plane_roles(),
        }
    }

    /// Set the local cluster id
    pub fn with_local_cluster_id(mut self, id: impl Into<String>) -> Self {
        self.local_cluster_id = id.into();
        self
    }

    /// Set the exposure name suffix
    pub fn with_exposure_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.exposure_suffix = suffix.into();
        self
    }

    /// Derived exposure object name for a pod
    pub fn exposure_name(&self, pod_name: &str) -> String {
        format!("{}{}", pod_name, self.exposure_suffix)
    }

    /// Fully qualified label/annotation key
    pub fn label_key(&self, name: &str) -> String {
        format!("{}/{}", self.label_prefix, name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::new("my-cluster");
        assert_eq!(config.local_cluster_id, "central");
        assert_eq!(config.exposure_name("my-cluster-broker-0"), "my-cluster-broker-0-exposure");
        assert_eq!(config.label_key("cluster"), "stretch.io/cluster");
        assert_eq!(config.control_plane_roles.len(), 2);
    }

    #[test]
    fn test_yaml_defaults_fill_in() {
        let config: EngineConfig = serde_yaml::from_str("instance: prod\nexposureSuffix: -nodeport\n").unwrap();
        assert_eq!(config.instance, "prod");
        assert_eq!(config.exposure_name("pod-1"), "pod-1-nodeport");
        assert_eq!(config.external_traffic_policy, "Local");
        assert_eq!(config.pod_name_label, "statefulset.kubernetes.io/pod-name");
    }

    #[test]
    fn test_builders() {
        let config = EngineConfig::new("x")
            .with_local_cluster_id("hub")
            .with_exposure_suffix("-np");
        assert_eq!(config.local_cluster_id, "hub");
        assert_eq!(config.exposure_name("p"), "p-np");
    }
}
