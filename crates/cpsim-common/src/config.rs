//! ---
//! cpsim_section: "01-core-functionality"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Shared primitives for the control-plane simulation harness."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::time::Duration;

use anyhow::Context;
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

use crate::logging::LogFormat;

fn default_node_name() -> String {
    "k8s1".to_owned()
}

fn default_cluster_version() -> String {
    "1.25".to_owned()
}

fn default_initial_interval() -> Duration {
    Duration::from_millis(50)
}

fn default_convergence_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_sync_interval() -> Duration {
    Duration::from_millis(20)
}

fn default_worker_threads() -> usize {
    2
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_true() -> bool {
    true
}

/// Configuration for a single harness instance.
///
/// Every harness owns its own copy; nothing here is process-global, so
/// concurrently running tests never observe each other's settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default = "default_node_name")]
    pub node_name: String,
    #[serde(default = "default_cluster_version")]
    pub cluster_version: String,
    #[serde(default)]
    pub convergence: ConvergenceConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl HarnessConfig {
    /// Build a configuration for the given node and cluster version, defaulting
    /// everything else.
    pub fn new(node_name: impl Into<String>, cluster_version: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
            cluster_version: cluster_version.into(),
            ..Self::default()
        }
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node_name.trim().is_empty() {
            return Err(ConfigError::Invalid("node_name must not be empty".into()));
        }
        if self.convergence.initial_interval.is_zero() {
            return Err(ConfigError::Invalid(
                "convergence.initial_interval must be non-zero".into(),
            ));
        }
        if self.runtime.worker_threads == 0 {
            return Err(ConfigError::Invalid(
                "runtime.worker_threads must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            node_name: default_node_name(),
            cluster_version: default_cluster_version(),
            convergence: ConvergenceConfig::default(),
            logging: LoggingConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }
}

impl std::str::FromStr for HarnessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HarnessConfig =
            toml::from_str(content).with_context(|| "failed to parse harness configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Backoff parameters for the convergence checker.
#[serde_as]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvergenceConfig {
    #[serde(default = "default_initial_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub initial_interval: Duration,
    #[serde(default = "default_convergence_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
}

impl Default for ConvergenceConfig {
    fn default() -> Self {
        Self {
            initial_interval: default_initial_interval(),
            timeout: default_convergence_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    /// Filter directive used when neither `CPSIM_LOG` nor `RUST_LOG` is set.
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: default_log_format(),
            filter: None,
        }
    }
}

/// Sizing of the runtime that hosts the simulated processes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default = "default_worker_threads")]
    pub worker_threads: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: default_worker_threads(),
        }
    }
}

/// Raised when an option combination cannot be honoured.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum IdentityAllocationMode {
    #[default]
    Crd,
    KvStore,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum IpamMode {
    Kubernetes,
    #[default]
    ClusterPool,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum KubeProxyReplacement {
    #[default]
    Disabled,
    Partial,
    Strict,
}

/// Runtime-mutable agent flags.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum MonitorOption {
    DropNotify,
    TraceNotify,
    PolicyVerdictNotify,
    Debug,
}

/// Options consumed by the simulated agent.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default)]
    pub identity_allocation_mode: IdentityAllocationMode,
    #[serde(default)]
    pub dry_mode: bool,
    #[serde(default)]
    pub ipam: IpamMode,
    #[serde(default = "default_true")]
    pub enable_ipv4: bool,
    #[serde(default = "default_true")]
    pub enable_ipv6: bool,
    #[serde(default)]
    pub enable_ipsec: bool,
    #[serde(default)]
    pub kube_proxy_replacement: KubeProxyReplacement,
    #[serde(default = "default_true")]
    pub enable_host_ip_restore: bool,
    #[serde(default)]
    pub require_ipv6_pod_cidr: bool,
    #[serde(default = "default_true")]
    pub enable_endpoint_slice: bool,
    #[serde(default = "default_true")]
    pub enable_l7_proxy: bool,
    #[serde(default = "default_true")]
    pub enable_health_check_node_port: bool,
    #[serde(default)]
    pub debug: bool,
    #[serde(default = "default_sync_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub sync_interval: Duration,
    #[serde(default)]
    pub monitor_options: IndexSet<MonitorOption>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            identity_allocation_mode: IdentityAllocationMode::default(),
            dry_mode: false,
            ipam: IpamMode::default(),
            enable_ipv4: true,
            enable_ipv6: true,
            enable_ipsec: false,
            kube_proxy_replacement: KubeProxyReplacement::default(),
            enable_host_ip_restore: true,
            require_ipv6_pod_cidr: false,
            enable_endpoint_slice: true,
            enable_l7_proxy: true,
            enable_health_check_node_port: true,
            debug: false,
            sync_interval: default_sync_interval(),
            monitor_options: IndexSet::new(),
        }
    }
}

impl AgentConfig {
    /// Overlay the values every control-plane test starts from: CRD identity
    /// allocation, dry datapath, kubernetes IPAM, IPv4-only, strict kube-proxy
    /// replacement, and all notification flags switched on.
    pub fn apply_harness_defaults(&mut self) {
        self.identity_allocation_mode = IdentityAllocationMode::Crd;
        self.dry_mode = true;
        self.ipam = IpamMode::Kubernetes;
        for option in MonitorOption::iter() {
            self.set_option(option, true);
        }
        self.enable_ipsec = false;
        self.enable_ipv6 = false;
        self.kube_proxy_replacement = KubeProxyReplacement::Strict;
        self.enable_host_ip_restore = false;
        self.require_ipv6_pod_cidr = false;
        self.enable_endpoint_slice = true;
        self.enable_l7_proxy = false;
        self.enable_health_check_node_port = false;
        self.debug = true;
    }

    pub fn set_option(&mut self, option: MonitorOption, enabled: bool) {
        if enabled {
            self.monitor_options.insert(option);
        } else {
            self.monitor_options.shift_remove(&option);
        }
    }

    pub fn option_enabled(&self, option: MonitorOption) -> bool {
        self.monitor_options.contains(&option)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enable_ipv4 && !self.enable_ipv6 {
            return Err(ConfigError::Invalid(
                "at least one of enable_ipv4 and enable_ipv6 must be set".into(),
            ));
        }
        if self.require_ipv6_pod_cidr && !self.enable_ipv6 {
            return Err(ConfigError::Invalid(
                "require_ipv6_pod_cidr needs enable_ipv6".into(),
            ));
        }
        if self.sync_interval.is_zero() {
            return Err(ConfigError::Invalid("sync_interval must be non-zero".into()));
        }
        Ok(())
    }

    /// Enumerate every named option with its current value.
    pub fn options(&self) -> IndexMap<&'static str, String> {
        let mut options = IndexMap::new();
        options.insert(
            "identity-allocation-mode",
            self.identity_allocation_mode.to_string(),
        );
        options.insert("dry-mode", self.dry_mode.to_string());
        options.insert("ipam", self.ipam.to_string());
        options.insert("enable-ipv4", self.enable_ipv4.to_string());
        options.insert("enable-ipv6", self.enable_ipv6.to_string());
        options.insert("enable-ipsec", self.enable_ipsec.to_string());
        options.insert(
            "kube-proxy-replacement",
            self.kube_proxy_replacement.to_string(),
        );
        options.insert(
            "enable-host-ip-restore",
            self.enable_host_ip_restore.to_string(),
        );
        options.insert(
            "require-ipv6-pod-cidr",
            self.require_ipv6_pod_cidr.to_string(),
        );
        options.insert(
            "enable-endpoint-slice",
            self.enable_endpoint_slice.to_string(),
        );
        options.insert("enable-l7-proxy", self.enable_l7_proxy.to_string());
        options.insert(
            "enable-health-check-nodeport",
            self.enable_health_check_node_port.to_string(),
        );
        options.insert("debug", self.debug.to_string());
        options.insert(
            "sync-interval",
            format!("{}ms", self.sync_interval.as_millis()),
        );
        options.insert(
            "monitor-options",
            self.monitor_options
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(","),
        );
        options
    }
}

/// Options consumed by the simulated controller.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControllerConfig {
    #[serde(default = "default_sync_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub sync_interval: Duration,
    #[serde(default = "default_true")]
    pub enable_node_mirroring: bool,
    #[serde(default = "default_true")]
    pub node_gc_enabled: bool,
    #[serde(default)]
    pub debug: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            sync_interval: default_sync_interval(),
            enable_node_mirroring: true,
            node_gc_enabled: true,
            debug: false,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_interval.is_zero() {
            return Err(ConfigError::Invalid("sync_interval must be non-zero".into()));
        }
        Ok(())
    }

    pub fn options(&self) -> IndexMap<&'static str, String> {
        let mut options = IndexMap::new();
        options.insert(
            "sync-interval",
            format!("{}ms", self.sync_interval.as_millis()),
        );
        options.insert(
            "enable-node-mirroring",
            self.enable_node_mirroring.to_string(),
        );
        options.insert("node-gc-enabled", self.node_gc_enabled.to_string());
        options.insert("debug", self.debug.to_string());
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn harness_defaults_switch_on_every_monitor_option() {
        let mut config = AgentConfig::default();
        assert!(config.monitor_options.is_empty());
        config.apply_harness_defaults();
        for option in MonitorOption::iter() {
            assert!(config.option_enabled(option), "{option} should be enabled");
        }
        assert!(config.dry_mode);
        assert!(!config.enable_ipv6);
        assert_eq!(config.kube_proxy_replacement, KubeProxyReplacement::Strict);
        assert_eq!(config.ipam, IpamMode::Kubernetes);
        config.validate().expect("harness defaults are valid");
    }

    #[test]
    fn options_enumerate_every_named_field() {
        let config = AgentConfig::default();
        let options = config.options();
        assert_eq!(options.len(), 15);
        assert_eq!(options["kube-proxy-replacement"], "disabled");
        assert_eq!(options["ipam"], "cluster-pool");
        assert_eq!(options["sync-interval"], "20ms");

        let controller = ControllerConfig::default();
        assert_eq!(controller.options()["node-gc-enabled"], "true");
    }

    #[test]
    fn ipv6_pod_cidr_requires_ipv6() {
        let config = AgentConfig {
            enable_ipv6: false,
            require_ipv6_pod_cidr: true,
            ..AgentConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn disabling_a_monitor_option_removes_it() {
        let mut config = AgentConfig::default();
        config.set_option(MonitorOption::Debug, true);
        config.set_option(MonitorOption::Debug, false);
        assert!(!config.option_enabled(MonitorOption::Debug));
    }

    #[test]
    fn harness_config_parses_from_toml() {
        let config: HarnessConfig = r#"
            node_name = "worker-1"
            cluster_version = "1.24"

            [convergence]
            initial_interval = 5
            timeout = 250
        "#
        .parse()
        .expect("valid config");
        assert_eq!(config.node_name, "worker-1");
        assert_eq!(config.convergence.initial_interval, Duration::from_millis(5));
        assert_eq!(config.convergence.timeout, Duration::from_millis(250));
        assert_eq!(config.runtime.worker_threads, 2);
    }

    #[test]
    fn empty_node_name_is_rejected() {
        let result = "node_name = \"  \"".parse::<HarnessConfig>();
        assert!(result.is_err());
    }

    #[test]
    fn monitor_options_parse_from_names() {
        let option: MonitorOption = "PolicyVerdictNotify".parse().unwrap();
        assert_eq!(option, MonitorOption::PolicyVerdictNotify);
        let mode: KubeProxyReplacement = "strict".parse().unwrap();
        assert_eq!(mode, KubeProxyReplacement::Strict);
    }

    #[test]
    fn agent_config_round_trips_through_json() {
        let mut config = AgentConfig::default();
        config.apply_harness_defaults();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["kube_proxy_replacement"], "strict");
        assert_eq!(json["sync_interval"], 20);
        let back: AgentConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
