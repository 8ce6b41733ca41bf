use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use serde::Serialize;
use tracing::{info, warn};

use crate::config::Topology;
use crate::stretch::{GatewayRegistry, InMemoryGateway, StretchEngine};

#[derive(Parser, Debug)]
#[command(name = "stretchnet")]
#[command(about = "Plan cross-cluster endpoints for a stretch cluster from a topology file")]
#[command(version)]
pub struct Args {
    /// Path to the topology file (YAML)
    #[arg(required = true)]
    pub topology_file: PathBuf,

    /// Enable verbose logging output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,

    /// Only render listeners for this pod
    #[arg(long, value_name = "POD")]
    pub pod: Option<String>,

    /// Print the plan as JSON
    #[arg(long)]
    pub json: bool,
}

/// Rendered networking for a whole topology
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    pub provider: String,
    pub namespace: String,
    pub stable_addresses: BTreeMap<String, String>,
    pub pods: Vec<PodPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quorum_voters: Option<String>,
}

/// Rendered networking for one pod
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PodPlan {
    pub name: String,
    pub cluster: String,
    pub exposure: String,
    pub advertised_listeners: String,
}

/// Build one in-memory gateway per topology cluster
pub fn gateways_from_topology(
    topology: &Topology,
) -> Result<(GatewayRegistry, BTreeMap<String, Arc<InMemoryGateway>>)> {
    let gateways: BTreeMap<String, Arc<InMemoryGateway>> = topology
        .clusters
        .iter()
        .map(|(id, cluster)| {
            let gateway = InMemoryGateway::new().with_nodes(cluster.nodes.clone());
            (id.clone(), Arc::new(gateway))
        })
        .collect();

    let local_id = &topology.engine.local_cluster_id;
    let local = gateways
        .get(local_id)
        .cloned()
        .with_context(|| format!("local cluster '{}' missing from topology", local_id))?;

    let mut registry = GatewayRegistry::new(local_id.clone(), local);
    for (id, gateway) in &gateways {
        if id != local_id {
            registry.insert(id.clone(), gateway.clone());
        }
    }

    Ok((registry, gateways))
}

/// Initialize an engine over in-memory gateways, ensure every pod's
/// exposure object and render listeners and voters
pub async fn build_plan(topology: &Topology, pod_filter: Option<&str>) -> Result<Plan> {
    let (registry, _) = gateways_from_topology(topology)?;
    let engine = StretchEngine::new(topology.engine.clone(), registry);

    if let Err(e) = engine.initialize().await {
        // Other clusters are still usable; resolution reports what is missing
        warn!("Address discovery incomplete: {}", e);
    }

    let namespace = topology.namespace.as_str();
    for pod in &topology.pods {
        engine
            .ensure_exposure(&pod.cluster, namespace, &pod.name, &pod.ports)
            .await
            .with_context(|| format!("failed to ensure exposure for pod {}", pod.name))?;
    }

    let listeners = topology.listener_pairs();
    let mut pods = Vec::new();
    for pod in &topology.pods {
        if pod_filter.is_some_and(|name| name != pod.name) {
            continue;
        }

        let advertised_listeners = engine
            .build_advertised_listeners(&pod.cluster, namespace, &pod.name, &listeners)
            .await
            .with_context(|| format!("failed to build listeners for pod {}", pod.name))?;

        pods.push(PodPlan {
            name: pod.name.clone(),
            cluster: pod.cluster.clone(),
            exposure: engine.config().exposure_name(&pod.name),
            advertised_listeners,
        });
    }

    if let Some(name) = pod_filter {
        if pods.is_empty() {
            anyhow::bail!("pod '{}' not found in topology", name);
        }
    }

    let controllers = topology.controller_pods();
    let quorum_voters = if controllers.is_empty() {
        None
    } else {
        let voters = engine
            .build_quorum_voters(namespace, &controllers, &topology.replication_port)
            .await
            .context("failed to build quorum voters")?;
        Some(voters)
    };

    info!("Planned {} pods", pods.len());

    Ok(Plan {
        provider: engine.provider_name().to_string(),
        namespace: namespace.to_string(),
        stable_addresses: engine.stable_addresses(),
        pods,
        quorum_voters,
    })
}

// ============================================================================
// SBIO: Pure display logic (no I/O - returns formatted strings)
// ============================================================================

/// Format a plan for terminal output.
/// Pure function - returns a formatted string.
pub fn format_plan(plan: &Plan) -> String {
    let mut output = String::new();

    output.push_str(&format!(
        "stretchnet - {} plan (namespace {})\n\n",
        plan.provider, plan.namespace
    ));

    output.push_str("Stable addresses:\n");
    for (cluster, address) in &plan.stable_addresses {
        output.push_str(&format!("  {:<12} {}\n", cluster, address));
    }
    output.push('\n');

    output.push_str(&format!("Pods ({}):\n", plan.pods.len()));
    for pod in &plan.pods {
        output.push_str(&format!("  [{}] cluster={} exposure={}\n", pod.name, pod.cluster, pod.exposure));
        output.push_str(&format!("    advertised.listeners={}\n", pod.advertised_listeners));
    }

    if let Some(ref voters) = plan.quorum_voters {
        output.push('\n');
        output.push_str(&format!("controller.quorum.voters={}\n", voters));
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_topology;

    const TOPOLOGY: &str = r#"
namespace: kafka
engine:
  instance: my-cluster
clusters:
  central:
    nodes:
      - name: c-worker
        addresses:
          - { type: ExternalIP, address: 10.0.0.5 }
  east:
    nodes:
      - name: e-worker
        addresses:
          - { type: InternalIP, address: 10.0.1.7 }
listeners:
  - { name: REPLICATION, port: replication }
pods:
  - name: pool-0
    cluster: central
    nodeId: 0
    controller: true
    ports: { replication: 9091 }
  - name: pool-1
    cluster: east
    nodeId: 1
    controller: true
    ports: { replication: 9091 }
"#;

    #[test]
    fn test_args_parse() {
        let args = Args::parse_from(["stretchnet", "topology.yaml", "-vv", "--json"]);
        assert_eq!(args.verbose, 2);
        assert!(args.json);
        assert!(args.pod.is_none());
    }

    #[test]
    fn test_gateways_from_topology() {
        let topology = parse_topology(TOPOLOGY).unwrap();
        let (registry, gateways) = gateways_from_topology(&topology).unwrap();
        assert_eq!(registry.cluster_ids(), vec!["central", "east"]);
        assert_eq!(gateways.len(), 2);
    }

    #[tokio::test]
    async fn test_build_plan() {
        let topology = parse_topology(TOPOLOGY).unwrap();
        let plan = build_plan(&topology, None).await.unwrap();

        assert_eq!(plan.provider, "nodeport");
        assert_eq!(plan.pods.len(), 2);
        assert_eq!(plan.pods[0].exposure, "pool-0-exposure");
        assert_eq!(plan.pods[0].advertised_listeners, "REPLICATION://10.0.0.5:30000");
        assert_eq!(plan.pods[1].advertised_listeners, "REPLICATION://10.0.1.7:30000");
        assert_eq!(
            plan.quorum_voters.as_deref(),
            Some("0@10.0.0.5:30000,1@10.0.1.7:30000")
        );
    }

    #[tokio::test]
    async fn test_build_plan_pod_filter() {
        let topology = parse_topology(TOPOLOGY).unwrap();
        let plan = build_plan(&topology, Some("pool-1")).await.unwrap();
        assert_eq!(plan.pods.len(), 1);
        assert_eq!(plan.pods[0].cluster, "east");

        let missing = build_plan(&topology, Some("pool-9")).await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_format_plan() {
        let plan = Plan {
            provider: "nodeport".to_string(),
            namespace: "kafka".to_string(),
            stable_addresses: [("central".to_string(), "10.0.0.5".to_string())]
                .into_iter()
                .collect(),
            pods: vec![PodPlan {
                name: "pool-0".to_string(),
                cluster: "central".to_string(),
                exposure: "pool-0-exposure".to_string(),
                advertised_listeners: "REPLICATION://10.0.0.5:30000".to_string(),
            }],
            quorum_voters: Some("0@10.0.0.5:30000".to_string()),
        };

        let output = format_plan(&plan);
        assert!(output.contains("10.0.0.5"));
        assert!(output.contains("[pool-0] cluster=central exposure=pool-0-exposure"));
        assert!(output.contains("advertised.listeners=REPLICATION://10.0.0.5:30000"));
        assert!(output.contains("controller.quorum.voters=0@10.0.0.5:30000"));
    }
}
