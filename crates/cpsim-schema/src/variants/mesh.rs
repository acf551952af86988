//! ---
//! cpsim_section: "02-schema-data-model"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Typed representations for each schema variant."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Mesh domain objects served under `mesh.cpsim.io/v2`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::resource::ApiObject;
use crate::variants::full::ObjectMeta;

pub const API_VERSION: &str = "mesh.cpsim.io/v2";

/// Per-node state published by the controller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshNode {
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: MeshNodeSpec,
}

impl MeshNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            api_version: API_VERSION.into(),
            metadata: ObjectMeta::named(name),
            spec: MeshNodeSpec::default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshNodeSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<MeshNodeAddress>,
    #[serde(default)]
    pub ipam: MeshIpamSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshNodeAddress {
    #[serde(rename = "type")]
    pub address_type: String,
    pub ip: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshIpamSpec {
    #[serde(default, rename = "podCIDRs", skip_serializing_if = "Vec::is_empty")]
    pub pod_cidrs: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshEndpoint {
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub status: MeshEndpointStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshEndpointStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity: Option<i64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub addresses: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshIdentity {
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default, rename = "security-labels")]
    pub security_labels: indexmap::IndexMap<String, String>,
}

/// Policy body shared by the namespaced and clusterwide network policies.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicySpec {
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub endpoint_selector: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ingress: Vec<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub egress: Vec<EgressRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EgressRule {
    #[serde(default, rename = "toFQDNs", skip_serializing_if = "Vec::is_empty")]
    pub to_fqdns: Vec<FqdnSelector>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub to_ports: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FqdnSelector {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pattern: Option<String>,
}

impl FqdnSelector {
    /// Exact name first, then the wildcard pattern, for whichever are set.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.match_name
            .as_deref()
            .into_iter()
            .chain(self.match_pattern.as_deref())
    }
}

impl PolicySpec {
    /// Every FQDN pattern referenced by the egress rules, in rule order.
    pub fn fqdn_patterns(&self) -> Vec<String> {
        self.egress
            .iter()
            .flat_map(|rule| rule.to_fqdns.iter())
            .flat_map(|selector| selector.patterns())
            .map(str::to_owned)
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshNetworkPolicy {
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PolicySpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshClusterwideNetworkPolicy {
    pub api_version: String,
    #[serde(default)]
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: PolicySpec,
}

/// Domain kinds the harness stores but never interprets; their `spec` stays
/// untyped JSON.
macro_rules! opaque_mesh_kind {
    ($($ty:ident),+ $(,)?) => {
        $(
            #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
            #[serde(rename_all = "camelCase")]
            pub struct $ty {
                pub api_version: String,
                #[serde(default)]
                pub metadata: ObjectMeta,
                #[serde(default, skip_serializing_if = "Value::is_null")]
                pub spec: Value,
            }
        )+
    };
}

opaque_mesh_kind!(
    MeshEgressGatewayPolicy,
    MeshLocalRedirectPolicy,
    MeshExternalWorkload,
    MeshEnvoyConfig,
    MeshClusterwideEnvoyConfig,
);

api_object! {
    MeshNode => "MeshNode",
    MeshEndpoint => "MeshEndpoint",
    MeshIdentity => "MeshIdentity",
    MeshNetworkPolicy => "MeshNetworkPolicy",
    MeshClusterwideNetworkPolicy => "MeshClusterwideNetworkPolicy",
    MeshEgressGatewayPolicy => "MeshEgressGatewayPolicy",
    MeshLocalRedirectPolicy => "MeshLocalRedirectPolicy",
    MeshExternalWorkload => "MeshExternalWorkload",
    MeshEnvoyConfig => "MeshEnvoyConfig",
    MeshClusterwideEnvoyConfig => "MeshClusterwideEnvoyConfig",
}

/// Any object of the mesh variant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum MeshObject {
    MeshNode(MeshNode),
    MeshEndpoint(MeshEndpoint),
    MeshIdentity(MeshIdentity),
    MeshNetworkPolicy(MeshNetworkPolicy),
    MeshClusterwideNetworkPolicy(MeshClusterwideNetworkPolicy),
    MeshEgressGatewayPolicy(MeshEgressGatewayPolicy),
    MeshLocalRedirectPolicy(MeshLocalRedirectPolicy),
    MeshExternalWorkload(MeshExternalWorkload),
    MeshEnvoyConfig(MeshEnvoyConfig),
    MeshClusterwideEnvoyConfig(MeshClusterwideEnvoyConfig),
}

object_enum!(MeshObject {
    MeshNode,
    MeshEndpoint,
    MeshIdentity,
    MeshNetworkPolicy,
    MeshClusterwideNetworkPolicy,
    MeshEgressGatewayPolicy,
    MeshLocalRedirectPolicy,
    MeshExternalWorkload,
    MeshEnvoyConfig,
    MeshClusterwideEnvoyConfig,
});

impl MeshObject {
    pub fn as_node(&self) -> Option<&MeshNode> {
        match self {
            Self::MeshNode(node) => Some(node),
            _ => None,
        }
    }

    /// Policy body of either network policy kind.
    pub fn policy_spec(&self) -> Option<&PolicySpec> {
        match self {
            Self::MeshNetworkPolicy(policy) => Some(&policy.spec),
            Self::MeshClusterwideNetworkPolicy(policy) => Some(&policy.spec),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn policy_collects_fqdn_patterns() {
        let object: MeshObject = serde_json::from_value(json!({
            "apiVersion": API_VERSION,
            "kind": "MeshNetworkPolicy",
            "metadata": {"name": "allow-dns", "namespace": "shop"},
            "spec": {
                "endpointSelector": {"matchLabels": {"app": "web"}},
                "egress": [
                    {"toFQDNs": [{"matchName": "api.example.com"}]},
                    {"toFQDNs": [{"matchPattern": "*.cdn.example.com"}]}
                ]
            }
        }))
        .unwrap();
        let spec = object.policy_spec().expect("policy kind");
        assert_eq!(
            spec.fqdn_patterns(),
            vec!["api.example.com", "*.cdn.example.com"]
        );
    }

    #[test]
    fn selector_with_name_and_pattern_yields_both() {
        let spec: PolicySpec = serde_json::from_value(json!({
            "egress": [{
                "toFQDNs": [{
                    "matchName": "api.example.com",
                    "matchPattern": "*.api.example.com"
                }]
            }]
        }))
        .unwrap();
        assert_eq!(spec.fqdn_patterns(), vec!["api.example.com", "*.api.example.com"]);
    }

    #[test]
    fn opaque_kinds_keep_their_spec() {
        let object: MeshObject = serde_json::from_value(json!({
            "apiVersion": API_VERSION,
            "kind": "MeshEnvoyConfig",
            "metadata": {"name": "listener", "namespace": "shop"},
            "spec": {"resources": [{"name": "l1"}]}
        }))
        .unwrap();
        let value = serde_json::to_value(&object).unwrap();
        assert_eq!(value["spec"]["resources"][0]["name"], "l1");
        assert_eq!(object.kind(), "MeshEnvoyConfig");
    }

    #[test]
    fn clusterwide_objects_have_no_namespace() {
        let node = MeshObject::from(MeshNode::new("k8s1"));
        assert!(!node.coordinate().is_namespaced());
        assert_eq!(node.api_version(), API_VERSION);
    }
}
