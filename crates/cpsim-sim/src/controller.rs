//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Cluster-wide controller: mirrors full `Node` objects into `MeshNode`
//! objects and garbage-collects mesh nodes whose `Node` is gone.

use std::collections::HashSet;

use anyhow::Context;
use indexmap::IndexMap;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use cpsim_common::ControllerConfig;
use cpsim_logging::{log_lifecycle_event, sim_debug, sim_info, LifecycleOutcome, LogContext};
use cpsim_schema::variants::full::{FullObject, Node};
use cpsim_schema::variants::mesh::{MeshNode, MeshNodeAddress, MeshObject};
use cpsim_schema::ApiObject;
use cpsim_store::{Mutation, StoreClients};

use crate::discovery::Discovery;
use crate::process::{ProcessHandle, ProcessKind};
use crate::readiness::Readiness;

#[derive(Debug, Clone)]
pub struct ControllerContext {
    pub config: ControllerConfig,
    pub clients: StoreClients,
    pub discovery: Discovery,
}

/// A started controller.
#[derive(Debug)]
pub struct ControllerHandle {
    pub process: ProcessHandle,
    pub nodes_synced: Readiness,
    pub pods_synced: Readiness,
}

/// Validate the configuration and spawn the controller loop on `runtime`.
/// Each start gets fresh readiness signals.
pub fn start_controller(
    runtime: &Handle,
    context: ControllerContext,
) -> anyhow::Result<ControllerHandle> {
    context
        .config
        .validate()
        .context("invalid controller configuration")?;
    let nodes_synced = Readiness::new("controller node sync");
    let pods_synced = Readiness::new("controller pod sync");

    let signals = (nodes_synced.clone(), pods_synced.clone());
    let process = ProcessHandle::spawn(runtime, ProcessKind::Controller, move |shutdown| {
        run_controller(context, signals, shutdown)
    });
    Ok(ControllerHandle {
        process,
        nodes_synced,
        pods_synced,
    })
}

async fn run_controller(
    context: ControllerContext,
    (nodes_synced, pods_synced): (Readiness, Readiness),
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let log_ctx = LogContext::new().with_process("controller");
    log_lifecycle_event(
        Some(&log_ctx),
        "process.start",
        &format!(
            "controller running against cluster {}",
            context.discovery.server_version()
        ),
        LifecycleOutcome::Success,
    );

    let mut interval = tokio::time::interval(context.config.sync_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                sim_debug!(context = log_ctx.clone(), "controller shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                sync_nodes(&context);
                if nodes_synced.mark_ready() {
                    sim_info!(context = log_ctx.clone(), "controller node cache synced");
                }
                let pods = pods_per_node(&context.clients);
                if pods_synced.mark_ready() {
                    sim_info!(
                        context = log_ctx.clone(),
                        "controller pod cache synced across {} node(s)",
                        pods.len()
                    );
                }
            }
        }
    }
    Ok(())
}

fn sync_nodes(context: &ControllerContext) {
    let clients = &context.clients;
    let nodes: Vec<Node> = clients
        .full
        .list("Node")
        .into_iter()
        .filter_map(|object| match object {
            FullObject::Node(node) => Some(node),
            _ => None,
        })
        .collect();

    if context.config.enable_node_mirroring {
        for node in &nodes {
            let desired = MeshObject::from(mesh_node_for(node));
            let current = clients.mesh.get(&desired.coordinate()).ok();
            if current.as_ref() == Some(&desired) {
                continue;
            }
            let name = desired.name().to_owned();
            let mutation = clients.mesh.upsert(desired);
            let ctx = LogContext::new()
                .with_process("controller")
                .with_kind("MeshNode");
            match mutation {
                Mutation::Added => sim_info!(context = ctx, "created mesh node {name}"),
                Mutation::Updated => sim_debug!(context = ctx, "updated mesh node {name}"),
            }
        }
    }

    if context.config.node_gc_enabled {
        let live: HashSet<&str> = nodes.iter().map(|node| node.metadata.name.as_str()).collect();
        for object in clients.mesh.list("MeshNode") {
            if live.contains(object.name()) {
                continue;
            }
            if clients.mesh.delete(&object.coordinate()).is_ok() {
                sim_info!(
                    context = LogContext::new().with_process("controller").with_kind("MeshNode"),
                    "garbage-collected mesh node {}",
                    object.name()
                );
            }
        }
    }
}

/// Mesh node derived from a full node: same name, addresses, and pod CIDRs.
pub fn mesh_node_for(node: &Node) -> MeshNode {
    let mut mesh = MeshNode::new(node.metadata.name.clone());
    mesh.metadata.labels = node.metadata.labels.clone();
    mesh.spec.addresses = node
        .status
        .addresses
        .iter()
        .map(|address| MeshNodeAddress {
            address_type: address.address_type.clone(),
            ip: address.address.clone(),
        })
        .collect();
    mesh.spec.ipam.pod_cidrs = if node.spec.pod_cidrs.is_empty() {
        node.spec.pod_cidr.iter().cloned().collect()
    } else {
        node.spec.pod_cidrs.clone()
    };
    mesh
}

fn pods_per_node(clients: &StoreClients) -> IndexMap<String, usize> {
    let mut counts = IndexMap::new();
    for object in clients.full.list("Pod") {
        if let FullObject::Pod(pod) = object {
            let node = pod.spec.node_name.unwrap_or_default();
            *counts.entry(node).or_insert(0) += 1;
        }
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpsim_schema::variants::full::NodeAddress;

    #[test]
    fn mesh_node_carries_addresses_and_cidrs() {
        let mut node = Node::new("k8s1");
        node.spec.pod_cidr = Some("10.0.1.0/24".into());
        node.status.addresses.push(NodeAddress {
            address_type: "InternalIP".into(),
            address: "172.18.0.2".into(),
        });
        let mesh = mesh_node_for(&node);
        assert_eq!(mesh.metadata.name, "k8s1");
        assert_eq!(mesh.spec.ipam.pod_cidrs, vec!["10.0.1.0/24"]);
        assert_eq!(mesh.spec.addresses[0].ip, "172.18.0.2");
        assert_eq!(mesh.spec.addresses[0].address_type, "InternalIP");
    }

    #[test]
    fn sync_mirrors_and_collects() {
        let clients = StoreClients::new();
        let context = ControllerContext {
            config: ControllerConfig::default(),
            clients: clients.clone(),
            discovery: Discovery::new(cpsim_common::ClusterVersion::lookup("1.25").unwrap()),
        };
        clients.full.upsert(FullObject::from(Node::new("k8s1")));
        clients.mesh.upsert(MeshObject::from(MeshNode::new("stale")));

        sync_nodes(&context);
        let names: Vec<_> = clients
            .mesh
            .list("MeshNode")
            .iter()
            .map(|object| object.name().to_owned())
            .collect();
        assert_eq!(names, vec!["k8s1"]);

        let revision = clients.mesh.revision();
        sync_nodes(&context);
        assert_eq!(clients.mesh.revision(), revision, "unchanged nodes are not rewritten");
    }
}
