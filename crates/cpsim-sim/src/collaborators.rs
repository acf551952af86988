//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! External collaborators the agent talks to, replaced by in-memory mocks.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use parking_lot::Mutex;
use tracing::debug;

use cpsim_schema::ResourceCoordinate;

/// FQDN-aware proxy that enforces the `toFQDNs` rules of network policies.
pub trait DnsProxy: Send + Sync + fmt::Debug {
    /// Replace the allowed patterns contributed by one policy.
    fn update_allowed(&self, policy: &ResourceCoordinate, patterns: Vec<String>);

    /// Drop every pattern contributed by one policy.
    fn remove_allowed(&self, policy: &ResourceCoordinate);

    /// Current patterns per policy.
    fn allowed(&self) -> IndexMap<ResourceCoordinate, Vec<String>>;
}

/// Records allow-list updates instead of proxying DNS.
#[derive(Debug, Default)]
pub struct MockDnsProxy {
    rules: Mutex<IndexMap<ResourceCoordinate, Vec<String>>>,
    updates: AtomicU64,
}

impl MockDnsProxy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any policy allows `pattern` verbatim.
    pub fn allows(&self, pattern: &str) -> bool {
        self.rules
            .lock()
            .values()
            .any(|patterns| patterns.iter().any(|allowed| allowed == pattern))
    }

    /// Number of update and remove calls received.
    pub fn updates(&self) -> u64 {
        self.updates.load(Ordering::SeqCst)
    }
}

impl DnsProxy for MockDnsProxy {
    fn update_allowed(&self, policy: &ResourceCoordinate, patterns: Vec<String>) {
        debug!(policy = %policy, patterns = patterns.len(), "dns proxy allow-list updated");
        self.rules.lock().insert(policy.clone(), patterns);
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn remove_allowed(&self, policy: &ResourceCoordinate) {
        debug!(policy = %policy, "dns proxy allow-list removed");
        self.rules.lock().shift_remove(policy);
        self.updates.fetch_add(1, Ordering::SeqCst);
    }

    fn allowed(&self) -> IndexMap<ResourceCoordinate, Vec<String>> {
        self.rules.lock().clone()
    }
}

/// Per-harness set of collaborators handed to the agent at start.
#[derive(Debug, Clone)]
pub struct Collaborators {
    pub dns_proxy: Arc<dyn DnsProxy>,
}

impl Collaborators {
    pub fn new(dns_proxy: Arc<dyn DnsProxy>) -> Self {
        Self { dns_proxy }
    }
}

impl Default for Collaborators {
    fn default() -> Self {
        Self::new(Arc::new(MockDnsProxy::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_tracks_patterns_per_policy() {
        let proxy = MockDnsProxy::new();
        let policy =
            ResourceCoordinate::namespaced("mesh.cpsim.io/v2", "MeshNetworkPolicy", "shop", "dns");
        proxy.update_allowed(&policy, vec!["api.example.com".into()]);
        assert!(proxy.allows("api.example.com"));

        proxy.update_allowed(&policy, vec!["*.example.org".into()]);
        assert!(!proxy.allows("api.example.com"));
        assert_eq!(proxy.allowed()[&policy], vec!["*.example.org"]);

        proxy.remove_allowed(&policy);
        assert!(proxy.allowed().is_empty());
        assert_eq!(proxy.updates(), 3);
    }
}
