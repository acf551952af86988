//! ---
//! cpsim_section: "01-core-functionality"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Shared primitives for the control-plane simulation harness."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Shared primitives for the cpsim workspace.
//! This crate exposes per-harness configuration, the named option sets handed
//! to the simulated agent and controller, the served-API catalog for each
//! supported cluster version, and tracing initialisation.

pub mod cluster;
pub mod config;
pub mod logging;

pub use cluster::{ApiResource, ApiResourceList, ClusterVersion, UnknownClusterVersion};
pub use config::{
    AgentConfig, ConfigError, ControllerConfig, ConvergenceConfig, HarnessConfig,
    IdentityAllocationMode, IpamMode, KubeProxyReplacement, LoggingConfig, MonitorOption,
    RuntimeConfig,
};
pub use logging::{init_tracing, LogFormat};
