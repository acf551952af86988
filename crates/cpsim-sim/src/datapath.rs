//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! In-memory stand-in for the agent's datapath. Tests observe what the
//! agent programmed here.

use std::sync::atomic::{AtomicU64, Ordering};

use indexmap::IndexMap;
use parking_lot::RwLock;
use serde::Serialize;

/// Where the agent took service backends from on its last sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
pub enum BackendSource {
    #[serde(rename = "endpoints")]
    #[strum(serialize = "endpoints")]
    Endpoints,
    #[serde(rename = "endpointslices/v1")]
    #[strum(serialize = "endpointslices/v1")]
    EndpointSlicesV1,
    #[serde(rename = "endpointslices/v1beta1")]
    #[strum(serialize = "endpointslices/v1beta1")]
    EndpointSlicesV1beta1,
}

/// A programmed service with its resolved backends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceFrontend {
    pub namespace: String,
    pub name: String,
    pub cluster_ip: Option<String>,
    pub ports: Vec<i32>,
    /// `ip:port` pairs, or bare IPs when the backend carries no port.
    pub backends: Vec<String>,
}

/// The agent's view of its own node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LocalNode {
    pub name: String,
    pub addresses: Vec<String>,
    pub pod_cidrs: Vec<String>,
}

#[derive(Debug, Default)]
struct DatapathState {
    services: IndexMap<(String, String), ServiceFrontend>,
    local_node: Option<LocalNode>,
    backend_source: Option<BackendSource>,
}

#[derive(Debug, Default)]
pub struct FakeDatapath {
    state: RwLock<DatapathState>,
    syncs: AtomicU64,
}

impl FakeDatapath {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole programmed state with the result of one sync.
    pub fn program(
        &self,
        services: Vec<ServiceFrontend>,
        local_node: Option<LocalNode>,
        backend_source: BackendSource,
    ) {
        let mut state = self.state.write();
        state.services = services
            .into_iter()
            .map(|service| ((service.namespace.clone(), service.name.clone()), service))
            .collect();
        state.local_node = local_node;
        state.backend_source = Some(backend_source);
        self.syncs.fetch_add(1, Ordering::SeqCst);
    }

    pub fn service(&self, namespace: &str, name: &str) -> Option<ServiceFrontend> {
        self.state
            .read()
            .services
            .get(&(namespace.to_owned(), name.to_owned()))
            .cloned()
    }

    pub fn services(&self) -> Vec<ServiceFrontend> {
        self.state.read().services.values().cloned().collect()
    }

    pub fn local_node(&self) -> Option<LocalNode> {
        self.state.read().local_node.clone()
    }

    pub fn backend_source(&self) -> Option<BackendSource> {
        self.state.read().backend_source
    }

    /// Completed syncs so far.
    pub fn sync_count(&self) -> u64 {
        self.syncs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frontend(name: &str) -> ServiceFrontend {
        ServiceFrontend {
            namespace: "shop".into(),
            name: name.into(),
            cluster_ip: Some("10.96.0.10".into()),
            ports: vec![80],
            backends: vec!["10.0.1.15:8080".into()],
        }
    }

    #[test]
    fn program_replaces_previous_state() {
        let datapath = FakeDatapath::new();
        datapath.program(vec![frontend("web"), frontend("api")], None, BackendSource::Endpoints);
        assert_eq!(datapath.services().len(), 2);

        datapath.program(vec![frontend("api")], None, BackendSource::EndpointSlicesV1);
        assert!(datapath.service("shop", "web").is_none());
        assert_eq!(datapath.service("shop", "api").unwrap().ports, vec![80]);
        assert_eq!(datapath.backend_source(), Some(BackendSource::EndpointSlicesV1));
        assert_eq!(datapath.sync_count(), 2);
    }

    #[test]
    fn backend_source_names_follow_the_api_resource() {
        assert_eq!(BackendSource::EndpointSlicesV1beta1.to_string(), "endpointslices/v1beta1");
    }
}
