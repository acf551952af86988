//! ---
//! cpsim_section: "05-simulated-processes"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Simulated agent and controller processes."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::sync::Arc;

use cpsim_common::cluster::{ClusterVersion, DISCOVERY_V1, DISCOVERY_V1BETA1};

/// Read-only view of the simulated API server's version and served APIs.
#[derive(Debug, Clone)]
pub struct Discovery {
    version: Arc<ClusterVersion>,
}

impl Discovery {
    pub fn new(version: ClusterVersion) -> Self {
        Self {
            version: Arc::new(version),
        }
    }

    pub fn server_version(&self) -> &ClusterVersion {
        &self.version
    }

    pub fn serves(&self, group_version: &str, kind: &str) -> bool {
        self.version.serves(group_version, kind)
    }

    /// Newest served EndpointSlice API version, if any.
    pub fn endpoint_slice_api(&self) -> Option<&'static str> {
        [DISCOVERY_V1, DISCOVERY_V1BETA1]
            .into_iter()
            .find(|group_version| self.serves(group_version, "EndpointSlice"))
    }
}
