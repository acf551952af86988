//! ---
//! cpsim_section: "06-test-harness"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Harness facade, lifecycle manager, and convergence checks."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::path::Path;
use std::sync::Arc;

use tokio::runtime::{Builder, Runtime};
use tracing::{debug, error};

use cpsim_common::{init_tracing, AgentConfig, ClusterVersion, ControllerConfig, HarnessConfig};
use cpsim_logging::{sim_info, LogContext};
use cpsim_schema::documents::load_documents;
use cpsim_schema::{IntoResource, Resource, ResourceCoordinate};
use cpsim_sim::{
    AgentContext, AgentHandle, Collaborators, ControllerContext, ControllerHandle, Discovery,
    FakeDatapath, MockDnsProxy, ProcessKind,
};
use cpsim_store::MultiVariantStore;

use crate::convergence::{self, ConvergenceReport};
use crate::lifecycle::{LifecycleManager, ProcessState};
use crate::{HarnessError, Result};

/// One simulated control plane: a multi-variant store, the processes that
/// watch it, and the per-instance configuration they start with.
///
/// Owns a multi-threaded tokio runtime the processes run on, so it must be
/// driven from a plain (non-async) test thread. Processes still running
/// when the harness is dropped are stopped.
pub struct ControlPlaneHarness {
    config: HarnessConfig,
    discovery: Discovery,
    store: MultiVariantStore,
    agent_config: AgentConfig,
    controller_config: ControllerConfig,
    dns_proxy: Arc<MockDnsProxy>,
    collaborators: Collaborators,
    lifecycle: LifecycleManager,
    runtime: Runtime,
}

impl ControlPlaneHarness {
    #[track_caller]
    pub fn new(config: HarnessConfig) -> Self {
        fatal(Self::try_new(config))
    }

    pub fn try_new(config: HarnessConfig) -> Result<Self> {
        init_tracing(&config.logging);
        config.validate()?;
        let discovery = Discovery::new(ClusterVersion::lookup(&config.cluster_version)?);
        let runtime = Builder::new_multi_thread()
            .worker_threads(config.runtime.worker_threads)
            .thread_name("cpsim-process")
            .enable_time()
            .build()?;
        let dns_proxy = Arc::new(MockDnsProxy::new());

        sim_info!(
            context = LogContext::new().with_node(&config.node_name),
            "harness created for cluster {}",
            discovery.server_version()
        );
        Ok(Self {
            discovery,
            store: MultiVariantStore::new(),
            agent_config: AgentConfig::default(),
            controller_config: ControllerConfig::default(),
            collaborators: Collaborators::new(dns_proxy.clone()),
            dns_proxy,
            lifecycle: LifecycleManager::new(),
            runtime,
            config,
        })
    }

    /// Reset both process configurations to the harness defaults, install
    /// a fresh mock DNS proxy, then let the test adjust options.
    pub fn setup_environment<F>(&mut self, overrides: F) -> &mut Self
    where
        F: FnOnce(&mut AgentConfig, &mut ControllerConfig),
    {
        let mut agent = AgentConfig::default();
        agent.apply_harness_defaults();
        let mut controller = ControllerConfig::default();
        overrides(&mut agent, &mut controller);

        self.dns_proxy = Arc::new(MockDnsProxy::new());
        self.collaborators = Collaborators::new(self.dns_proxy.clone());
        debug!(
            agent = ?agent.options(),
            controller = ?controller.options(),
            "environment configured"
        );
        self.agent_config = agent;
        self.controller_config = controller;
        self
    }

    #[track_caller]
    pub fn start_agent(&mut self) -> &mut Self {
        fatal(self.try_start_agent())
    }

    pub fn try_start_agent(&mut self) -> Result<&mut Self> {
        let context = AgentContext {
            node_name: self.config.node_name.clone(),
            config: self.agent_config.clone(),
            clients: self.store.clients(),
            discovery: self.discovery.clone(),
            collaborators: self.collaborators.clone(),
        };
        self.lifecycle.start_agent(&self.runtime, context)?;
        Ok(self)
    }

    #[track_caller]
    pub fn stop_agent(&mut self) -> &mut Self {
        fatal(self.try_stop_agent())
    }

    pub fn try_stop_agent(&mut self) -> Result<&mut Self> {
        self.lifecycle.stop_agent(&self.runtime)?;
        Ok(self)
    }

    #[track_caller]
    pub fn start_controller(&mut self) -> &mut Self {
        fatal(self.try_start_controller())
    }

    pub fn try_start_controller(&mut self) -> Result<&mut Self> {
        let context = ControllerContext {
            config: self.controller_config.clone(),
            clients: self.store.clients(),
            discovery: self.discovery.clone(),
        };
        self.lifecycle.start_controller(&self.runtime, context)?;
        Ok(self)
    }

    #[track_caller]
    pub fn stop_controller(&mut self) -> &mut Self {
        fatal(self.try_stop_controller())
    }

    pub fn try_stop_controller(&mut self) -> Result<&mut Self> {
        self.lifecycle.stop_controller(&self.runtime)?;
        Ok(self)
    }

    /// Add or update each object in every tracker whose variant accepts it.
    #[track_caller]
    pub fn update_objects<I>(&mut self, objects: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: IntoResource,
    {
        fatal(self.try_update_objects(objects))
    }

    pub fn try_update_objects<I>(&mut self, objects: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: IntoResource,
    {
        for object in objects {
            self.store.update(object)?;
        }
        Ok(self)
    }

    /// Remove each object from every tracker holding it.
    #[track_caller]
    pub fn delete_objects<I>(&mut self, objects: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: IntoResource,
    {
        fatal(self.try_delete_objects(objects))
    }

    pub fn try_delete_objects<I>(&mut self, objects: I) -> Result<&mut Self>
    where
        I: IntoIterator,
        I::Item: IntoResource,
    {
        for object in objects {
            self.store.delete(object)?;
        }
        Ok(self)
    }

    /// Decode every document in a YAML fixture and apply it as an update.
    #[track_caller]
    pub fn update_objects_from_file(&mut self, path: impl AsRef<Path>) -> &mut Self {
        fatal(self.try_update_objects_from_file(path))
    }

    pub fn try_update_objects_from_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let resources = load_documents(path)?;
        if resources.is_empty() {
            return Err(HarnessError::EmptyFixture(path.to_path_buf()));
        }
        for resource in &resources {
            self.store.update_resource(resource)?;
        }
        debug!(path = %path.display(), objects = resources.len(), "fixture applied");
        Ok(self)
    }

    /// First representation of `coordinate` in registry order.
    pub fn get(&self, coordinate: &ResourceCoordinate) -> Result<Resource> {
        Ok(self.store.get(coordinate)?)
    }

    /// Poll `check` with backoff until it passes; fatal at the deadline
    /// with the last failure.
    #[track_caller]
    pub fn eventually<F>(&mut self, check: F) -> &mut Self
    where
        F: FnMut(&ControlPlaneHarness) -> anyhow::Result<()>,
    {
        fatal(self.try_eventually(check));
        self
    }

    pub fn try_eventually<F>(&self, mut check: F) -> Result<ConvergenceReport>
    where
        F: FnMut(&ControlPlaneHarness) -> anyhow::Result<()>,
    {
        Ok(convergence::eventually(&self.config.convergence, || check(self))?)
    }

    /// Run `task` once; fatal if it fails.
    #[track_caller]
    pub fn execute<F>(&mut self, task: F) -> &mut Self
    where
        F: FnOnce(&ControlPlaneHarness) -> anyhow::Result<()>,
    {
        fatal(self.try_execute(task));
        self
    }

    pub fn try_execute<F>(&self, task: F) -> Result<()>
    where
        F: FnOnce(&ControlPlaneHarness) -> anyhow::Result<()>,
    {
        task(self).map_err(|err| HarnessError::Task(format!("{err:#}")))
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    pub fn node_name(&self) -> &str {
        &self.config.node_name
    }

    pub fn agent_config(&self) -> &AgentConfig {
        &self.agent_config
    }

    pub fn controller_config(&self) -> &ControllerConfig {
        &self.controller_config
    }

    pub fn store(&self) -> &MultiVariantStore {
        &self.store
    }

    pub fn discovery(&self) -> &Discovery {
        &self.discovery
    }

    /// The proxy installed by the latest [`setup_environment`](Self::setup_environment).
    pub fn dns_proxy(&self) -> &Arc<MockDnsProxy> {
        &self.dns_proxy
    }

    pub fn process_state(&self, kind: ProcessKind) -> ProcessState {
        self.lifecycle.state(kind)
    }

    /// The running agent, if any.
    pub fn agent(&self) -> Option<&AgentHandle> {
        self.lifecycle.agent()
    }

    /// The running controller, if any.
    pub fn controller(&self) -> Option<&ControllerHandle> {
        self.lifecycle.controller()
    }

    /// Datapath of the running agent.
    pub fn datapath(&self) -> anyhow::Result<Arc<FakeDatapath>> {
        self.agent()
            .map(|agent| Arc::clone(&agent.datapath))
            .ok_or_else(|| anyhow::anyhow!("agent is not running"))
    }
}

impl Drop for ControlPlaneHarness {
    fn drop(&mut self) {
        self.lifecycle.stop_all(&self.runtime);
    }
}

#[track_caller]
fn fatal<T>(result: Result<T>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => {
            error!(error = %err, "harness operation failed");
            panic!("{err}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn harness() -> ControlPlaneHarness {
        let mut harness = ControlPlaneHarness::new(HarnessConfig::default());
        harness.setup_environment(|_, _| {});
        harness
    }

    #[test]
    fn unknown_cluster_version_is_rejected() {
        let err = ControlPlaneHarness::try_new(HarnessConfig::new("k8s1", "0.9"))
            .err()
            .expect("unknown version");
        assert!(matches!(err, HarnessError::UnknownClusterVersion(_)));
    }

    #[test]
    fn setup_environment_applies_overrides_after_defaults() {
        let mut harness = ControlPlaneHarness::new(HarnessConfig::default());
        let first_proxy = Arc::clone(harness.dns_proxy());
        harness.setup_environment(|agent, controller| {
            agent.enable_ipv6 = true;
            controller.node_gc_enabled = false;
        });
        assert!(harness.agent_config().dry_mode);
        assert!(harness.agent_config().enable_ipv6);
        assert!(!harness.controller_config().node_gc_enabled);
        assert!(!Arc::ptr_eq(&first_proxy, harness.dns_proxy()));
    }

    #[test]
    fn execute_surfaces_task_failure() {
        let harness = harness();
        let err = harness.try_execute(|_| anyhow::bail!("boom")).unwrap_err();
        assert_eq!(err.to_string(), "task failed: boom");
    }

    #[test]
    fn get_reads_through_the_store() {
        let mut harness = harness();
        harness.update_objects([json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "shop"}
        })]);
        let resource = harness
            .get(&ResourceCoordinate::cluster("v1", "Namespace", "shop"))
            .unwrap();
        assert_eq!(resource.name(), "shop");
        assert!(harness
            .get(&ResourceCoordinate::cluster("v1", "Namespace", "other"))
            .is_err());
    }

    #[test]
    fn datapath_requires_a_running_agent() {
        let harness = harness();
        assert!(harness.datapath().is_err());
        assert_eq!(harness.process_state(ProcessKind::Agent), ProcessState::NotStarted);
    }
}
