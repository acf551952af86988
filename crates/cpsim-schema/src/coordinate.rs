//! ---
//! cpsim_section: "02-schema-data-model"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Shared schema definitions and decoding logic."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::fmt;

use serde::{Deserialize, Serialize};

/// Group, version, and kind of a resource type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupVersionKind {
    /// Empty for the core group.
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    pub fn new(
        group: impl Into<String>,
        version: impl Into<String>,
        kind: impl Into<String>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` (`v1`, `discovery.k8s.io/v1`) into group and
    /// version.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        let (group, version) = match api_version.rsplit_once('/') {
            Some((group, version)) => (group, version),
            None => ("", api_version),
        };
        Self::new(group, version, kind)
    }

    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }

    /// Best-effort plural resource name (`Node` -> `nodes`, `Policy` ->
    /// `policies`, `Endpoints` -> `endpoints`).
    pub fn guess_resource(&self) -> String {
        let lower = self.kind.to_lowercase();
        if lower.is_empty() {
            return lower;
        }
        if lower.ends_with('s') {
            return if lower.ends_with("ss") {
                format!("{lower}es")
            } else {
                lower
            };
        }
        if let Some(stem) = lower.strip_suffix('y') {
            if !stem.ends_with(['a', 'e', 'i', 'o', 'u']) {
                return format!("{stem}ies");
            }
        }
        format!("{lower}s")
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}.{}", self.kind, self.version)
        } else {
            write!(f, "{}.{}.{}", self.kind, self.version, self.group)
        }
    }
}

/// Unique key of one logical resource within a tracker.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResourceCoordinate {
    pub gvk: GroupVersionKind,
    /// Empty for cluster-scoped resources.
    pub namespace: String,
    pub name: String,
}

impl ResourceCoordinate {
    pub fn new(
        gvk: GroupVersionKind,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            gvk,
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Coordinate of a cluster-scoped resource.
    pub fn cluster(api_version: &str, kind: &str, name: impl Into<String>) -> Self {
        Self::new(GroupVersionKind::from_api_version(api_version, kind), "", name)
    }

    /// Coordinate of a namespaced resource.
    pub fn namespaced(
        api_version: &str,
        kind: &str,
        namespace: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::new(
            GroupVersionKind::from_api_version(api_version, kind),
            namespace,
            name,
        )
    }

    pub fn is_namespaced(&self) -> bool {
        !self.namespace.is_empty()
    }
}

impl fmt::Display for ResourceCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.namespace.is_empty() {
            write!(f, "{} {}", self.gvk, self.name)
        } else {
            write!(f, "{} {}/{}", self.gvk, self.namespace, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_version_splits_group() {
        let gvk = GroupVersionKind::from_api_version("discovery.k8s.io/v1", "EndpointSlice");
        assert_eq!(gvk.group, "discovery.k8s.io");
        assert_eq!(gvk.version, "v1");
        assert_eq!(gvk.api_version(), "discovery.k8s.io/v1");

        let core = GroupVersionKind::from_api_version("v1", "Node");
        assert!(core.group.is_empty());
        assert_eq!(core.api_version(), "v1");
        assert_eq!(core.to_string(), "Node.v1");
    }

    #[test]
    fn resource_names_are_guessed_like_the_api_server() {
        let guess = |kind: &str| GroupVersionKind::new("", "v1", kind).guess_resource();
        assert_eq!(guess("Node"), "nodes");
        assert_eq!(guess("Endpoints"), "endpoints");
        assert_eq!(guess("MeshIdentity"), "meshidentities");
        assert_eq!(guess("Gateway"), "gateways");
        assert_eq!(guess("Ingress"), "ingresses");
    }

    #[test]
    fn display_includes_namespace_only_when_scoped() {
        let pod = ResourceCoordinate::namespaced("v1", "Pod", "default", "web-0");
        assert_eq!(pod.to_string(), "Pod.v1 default/web-0");
        assert!(pod.is_namespaced());
        let node = ResourceCoordinate::cluster("v1", "Node", "k8s1");
        assert_eq!(node.to_string(), "Node.v1 k8s1");
    }
}
