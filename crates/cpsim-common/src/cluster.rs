//! ---
//! cpsim_section: "01-core-functionality"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Served API catalog for the simulated cluster versions."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Static description of which API resources a simulated cluster serves.
//!
//! The lists are intentionally not exhaustive; they cover what capability
//! detection in the simulated processes looks at and grow as tests need them.

use std::fmt;

use serde::Serialize;

pub const CORE_V1: &str = "v1";
pub const DISCOVERY_V1: &str = "discovery.k8s.io/v1";
pub const DISCOVERY_V1BETA1: &str = "discovery.k8s.io/v1beta1";
pub const MESH_V2: &str = "mesh.cpsim.io/v2";

/// One served resource within an API group version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResource {
    pub name: &'static str,
    pub kind: &'static str,
    pub namespaced: bool,
}

const fn resource(name: &'static str, kind: &'static str, namespaced: bool) -> ApiResource {
    ApiResource {
        name,
        kind,
        namespaced,
    }
}

/// Resources served under a single `group/version`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiResourceList {
    pub group_version: &'static str,
    pub resources: Vec<ApiResource>,
}

impl ApiResourceList {
    pub fn serves(&self, kind: &str) -> bool {
        self.resources.iter().any(|r| r.kind == kind)
    }
}

fn core_v1() -> ApiResourceList {
    ApiResourceList {
        group_version: CORE_V1,
        resources: vec![
            resource("nodes", "Node", false),
            resource("namespaces", "Namespace", false),
            resource("pods", "Pod", true),
            resource("services", "Service", true),
            resource("endpoints", "Endpoints", true),
        ],
    }
}

fn discovery_v1() -> ApiResourceList {
    ApiResourceList {
        group_version: DISCOVERY_V1,
        resources: vec![resource("endpointslices", "EndpointSlice", true)],
    }
}

fn discovery_v1beta1() -> ApiResourceList {
    ApiResourceList {
        group_version: DISCOVERY_V1BETA1,
        resources: vec![resource("endpointslices", "EndpointSlice", true)],
    }
}

fn mesh_v2() -> ApiResourceList {
    ApiResourceList {
        group_version: MESH_V2,
        resources: vec![
            resource("meshnodes", "MeshNode", false),
            resource("meshendpoints", "MeshEndpoint", true),
            resource("meshidentities", "MeshIdentity", false),
            resource("meshegressgatewaypolicies", "MeshEgressGatewayPolicy", false),
            resource("meshnetworkpolicies", "MeshNetworkPolicy", true),
            resource(
                "meshclusterwidenetworkpolicies",
                "MeshClusterwideNetworkPolicy",
                false,
            ),
            resource("meshlocalredirectpolicies", "MeshLocalRedirectPolicy", true),
            resource("meshexternalworkloads", "MeshExternalWorkload", false),
            resource(
                "meshclusterwideenvoyconfigs",
                "MeshClusterwideEnvoyConfig",
                false,
            ),
            resource("meshenvoyconfigs", "MeshEnvoyConfig", true),
        ],
    }
}

/// A supported simulated cluster version together with the APIs it serves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterVersion {
    pub major: String,
    pub minor: String,
    pub resources: Vec<ApiResourceList>,
}

/// Raised for a version with no entry in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cluster version {0} not found in the API catalog")]
pub struct UnknownClusterVersion(pub String);

impl ClusterVersion {
    /// Versions the catalog knows about.
    pub const SUPPORTED: [&'static str; 3] = ["1.23", "1.24", "1.25"];

    /// Resolve `"<major>.<minor>"` against the catalog.
    pub fn lookup(raw: &str) -> Result<Self, UnknownClusterVersion> {
        let resources = match raw {
            "1.23" | "1.24" => vec![core_v1(), discovery_v1(), discovery_v1beta1(), mesh_v2()],
            "1.25" => vec![core_v1(), discovery_v1(), mesh_v2()],
            other => return Err(UnknownClusterVersion(other.to_owned())),
        };
        let (major, minor) = raw
            .split_once('.')
            .ok_or_else(|| UnknownClusterVersion(raw.to_owned()))?;
        Ok(Self {
            major: major.to_owned(),
            minor: minor.to_owned(),
            resources,
        })
    }

    /// Whether `kind` is served under `group_version`.
    pub fn serves(&self, group_version: &str, kind: &str) -> bool {
        self.resources
            .iter()
            .any(|list| list.group_version == group_version && list.serves(kind))
    }

    pub fn group_versions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.iter().map(|list| list.group_version)
    }
}

impl fmt::Display for ClusterVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn v1beta1_endpoint_slices_dropped_in_1_25() {
        let old = ClusterVersion::lookup("1.24").unwrap();
        assert!(old.serves(DISCOVERY_V1BETA1, "EndpointSlice"));
        let new = ClusterVersion::lookup("1.25").unwrap();
        assert!(!new.serves(DISCOVERY_V1BETA1, "EndpointSlice"));
        assert!(new.serves(DISCOVERY_V1, "EndpointSlice"));
        assert_eq!(new.to_string(), "1.25");
    }

    #[test]
    fn every_supported_version_resolves() {
        for raw in ClusterVersion::SUPPORTED {
            let version = ClusterVersion::lookup(raw).unwrap();
            assert!(version.serves(CORE_V1, "Node"));
            assert!(version.serves(MESH_V2, "MeshNode"));
        }
    }

    #[test]
    fn unknown_version_is_rejected() {
        let err = ClusterVersion::lookup("1.99").unwrap_err();
        assert_eq!(err.to_string(), "cluster version 1.99 not found in the API catalog");
    }
}
