//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Per-node agent: reads the slim projection and mesh policies, programs the
//! fake datapath, and forwards FQDN allow-lists to the DNS proxy.

use std::sync::Arc;

use anyhow::Context;
use indexmap::{IndexMap, IndexSet};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use cpsim_common::cluster::{DISCOVERY_V1, DISCOVERY_V1BETA1};
use cpsim_common::AgentConfig;
use cpsim_logging::{log_lifecycle_event, sim_debug, LifecycleOutcome, LogContext};
use cpsim_schema::variants::full::EndpointPort;
use cpsim_schema::variants::slim::{self, SlimObject};
use cpsim_schema::{ApiObject, ResourceCoordinate};
use cpsim_store::StoreClients;

use crate::collaborators::Collaborators;
use crate::datapath::{BackendSource, FakeDatapath, LocalNode, ServiceFrontend};
use crate::discovery::Discovery;
use crate::process::{ProcessHandle, ProcessKind};
use crate::readiness::Readiness;

/// Everything the agent is started with.
#[derive(Debug, Clone)]
pub struct AgentContext {
    pub node_name: String,
    pub config: AgentConfig,
    pub clients: StoreClients,
    pub discovery: Discovery,
    pub collaborators: Collaborators,
}

/// A started agent.
#[derive(Debug)]
pub struct AgentHandle {
    pub process: ProcessHandle,
    pub datapath: Arc<FakeDatapath>,
    pub initial_sync: Readiness,
}

/// Validate the configuration and spawn the agent's sync loop on `runtime`.
pub fn start_agent(runtime: &Handle, context: AgentContext) -> anyhow::Result<AgentHandle> {
    context
        .config
        .validate()
        .context("invalid agent configuration")?;
    let datapath = Arc::new(FakeDatapath::new());
    let initial_sync = Readiness::new("agent initial sync");

    let loop_datapath = Arc::clone(&datapath);
    let loop_ready = initial_sync.clone();
    let process = ProcessHandle::spawn(runtime, ProcessKind::Agent, move |shutdown| {
        run_agent(context, loop_datapath, loop_ready, shutdown)
    });
    Ok(AgentHandle {
        process,
        datapath,
        initial_sync,
    })
}

async fn run_agent(
    context: AgentContext,
    datapath: Arc<FakeDatapath>,
    initial_sync: Readiness,
    mut shutdown: broadcast::Receiver<()>,
) -> anyhow::Result<()> {
    let log_ctx = LogContext::new()
        .with_node(&context.node_name)
        .with_process("agent");
    log_lifecycle_event(
        Some(&log_ctx),
        "process.start",
        "agent sync loop running",
        LifecycleOutcome::Success,
    );

    let mut interval = tokio::time::interval(context.config.sync_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut agent = AgentState::default();

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                sim_debug!(context = log_ctx.clone(), "agent shutdown signal received");
                break;
            }
            _ = interval.tick() => {
                agent.sync(&context, &datapath);
                if initial_sync.mark_ready() {
                    log_lifecycle_event(
                        Some(&log_ctx),
                        "process.ready",
                        "agent completed initial sync",
                        LifecycleOutcome::Success,
                    );
                }
            }
        }
    }
    Ok(())
}

#[derive(Debug, Default)]
struct AgentState {
    /// Policies whose FQDN rules are currently pushed to the DNS proxy.
    dns_policies: IndexMap<ResourceCoordinate, Vec<String>>,
}

impl AgentState {
    fn sync(&mut self, context: &AgentContext, datapath: &FakeDatapath) {
        let source = backend_source(context);
        let backends = match source {
            BackendSource::Endpoints => endpoints_backends(&context.clients),
            BackendSource::EndpointSlicesV1 => slice_backends(&context.clients, DISCOVERY_V1),
            BackendSource::EndpointSlicesV1beta1 => {
                slice_backends(&context.clients, DISCOVERY_V1BETA1)
            }
        };

        let services = context
            .clients
            .slim
            .list("Service")
            .iter()
            .filter_map(SlimObject::as_service)
            .map(|service| frontend(service, &backends))
            .collect();
        datapath.program(services, self.local_node(context), source);
        self.sync_dns(context);
    }

    fn local_node(&self, context: &AgentContext) -> Option<LocalNode> {
        let coordinate = ResourceCoordinate::cluster("v1", "Node", context.node_name.as_str());
        let object = context.clients.slim.get(&coordinate).ok()?;
        let node = object.as_node()?;
        let mut pod_cidrs = node.spec.pod_cidrs.clone();
        if let Some(cidr) = &node.spec.pod_cidr {
            if !pod_cidrs.contains(cidr) {
                pod_cidrs.insert(0, cidr.clone());
            }
        }
        Some(LocalNode {
            name: node.metadata.name.clone(),
            addresses: node
                .status
                .addresses
                .iter()
                .map(|address| address.address.clone())
                .collect(),
            pod_cidrs,
        })
    }

    fn sync_dns(&mut self, context: &AgentContext) {
        let proxy = &context.collaborators.dns_proxy;
        let mut current: IndexMap<ResourceCoordinate, Vec<String>> = IndexMap::new();
        for object in context.clients.mesh.objects() {
            let Some(spec) = object.policy_spec() else {
                continue;
            };
            let patterns = spec.fqdn_patterns();
            if !patterns.is_empty() {
                current.insert(object.coordinate(), patterns);
            }
        }

        for (policy, patterns) in &current {
            if self.dns_policies.get(policy) != Some(patterns) {
                proxy.update_allowed(policy, patterns.clone());
            }
        }
        for policy in self.dns_policies.keys() {
            if !current.contains_key(policy) {
                proxy.remove_allowed(policy);
            }
        }
        self.dns_policies = current;
    }
}

fn backend_source(context: &AgentContext) -> BackendSource {
    if !context.config.enable_endpoint_slice {
        return BackendSource::Endpoints;
    }
    match context.discovery.endpoint_slice_api() {
        Some(DISCOVERY_V1) => BackendSource::EndpointSlicesV1,
        Some(DISCOVERY_V1BETA1) => BackendSource::EndpointSlicesV1beta1,
        _ => BackendSource::Endpoints,
    }
}

type BackendMap = IndexMap<(String, String), IndexSet<String>>;

fn endpoints_backends(clients: &StoreClients) -> BackendMap {
    let mut backends = BackendMap::new();
    for object in clients.slim.list("Endpoints") {
        let SlimObject::Endpoints(endpoints) = object else {
            continue;
        };
        let key = (endpoints.metadata.namespace.clone(), endpoints.metadata.name.clone());
        let entry = backends.entry(key).or_default();
        for subset in &endpoints.subsets {
            for address in &subset.addresses {
                entry.extend(backend_addresses(&address.ip, &subset.ports));
            }
        }
    }
    backends
}

fn slice_backends(clients: &StoreClients, api_version: &str) -> BackendMap {
    let mut backends = BackendMap::new();
    for object in clients.slim.list("EndpointSlice") {
        let SlimObject::EndpointSlice(slice) = object else {
            continue;
        };
        if slice.api_version != api_version {
            continue;
        }
        let Some(service) = slice.service_name() else {
            sim_debug!(
                context = LogContext::new().with_process("agent").with_kind("EndpointSlice"),
                "skipping slice {} without a service label",
                slice.metadata.name
            );
            continue;
        };
        let key = (slice.metadata.namespace.clone(), service.to_owned());
        let entry = backends.entry(key).or_default();
        // Endpoints with no ready condition are treated as ready.
        for endpoint in slice
            .endpoints
            .iter()
            .filter(|endpoint| endpoint.conditions.ready != Some(false))
        {
            for ip in &endpoint.addresses {
                entry.extend(backend_addresses(ip, &slice.ports));
            }
        }
    }
    backends
}

fn backend_addresses(ip: &str, ports: &[EndpointPort]) -> Vec<String> {
    if ports.is_empty() {
        return vec![ip.to_owned()];
    }
    ports.iter().map(|port| format!("{ip}:{}", port.port)).collect()
}

fn frontend(service: &slim::Service, backends: &BackendMap) -> ServiceFrontend {
    let key = (service.metadata.namespace.clone(), service.metadata.name.clone());
    ServiceFrontend {
        namespace: key.0.clone(),
        name: key.1.clone(),
        cluster_ip: service.spec.cluster_ip.clone(),
        ports: service.spec.ports.iter().map(|port| port.port).collect(),
        backends: backends
            .get(&key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default(),
    }
}
