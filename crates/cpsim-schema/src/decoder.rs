//! ---
//! cpsim_section: "02-schema-data-model"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Shared schema definitions and decoding logic."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use crate::resource::ApiObject;
use crate::variants::{full::FullObject, mesh::MeshObject, slim::SlimObject};
use crate::{Result, SchemaError, SchemaVariant};

/// The `apiVersion`/`kind` envelope of an encoded resource.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TypeMeta {
    #[serde(rename = "apiVersion", default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
}

impl TypeMeta {
    /// Read only the envelope of an encoded payload.
    pub fn peek(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(SchemaError::Envelope)
    }
}

/// A decoding profile with a static registry of the kinds it recognises.
///
/// Decoders are stateless: `decode` is a pure function of its input and
/// [`SchemaDecoder::KINDS`].
pub trait SchemaDecoder: Send + Sync + 'static {
    type Object: ApiObject + DeserializeOwned;

    const VARIANT: SchemaVariant;

    /// Recognised `(apiVersion, kind)` pairs.
    const KINDS: &'static [(&'static str, &'static str)];

    fn recognizes(meta: &TypeMeta) -> bool {
        Self::KINDS
            .iter()
            .any(|(api_version, kind)| *api_version == meta.api_version && *kind == meta.kind)
    }

    /// Attempt to decode `bytes` into this variant's representation.
    ///
    /// Returns `Ok(None)` when the kind is not in this variant's registry and
    /// `Err(SchemaError::Malformed)` when it is but the payload does not fit.
    fn decode(bytes: &[u8]) -> Result<Option<Self::Object>> {
        let meta = TypeMeta::peek(bytes)?;
        if !Self::recognizes(&meta) {
            trace!(
                variant = %Self::VARIANT,
                api_version = %meta.api_version,
                kind = %meta.kind,
                "kind not recognised by variant"
            );
            return Ok(None);
        }
        serde_json::from_slice(bytes)
            .map(Some)
            .map_err(|source| SchemaError::Malformed {
                variant: Self::VARIANT,
                gvk: format!("{}/{}", meta.api_version, meta.kind),
                source,
            })
    }
}

const CORE_KINDS: &[(&str, &str)] = &[
    ("v1", "Node"),
    ("v1", "Namespace"),
    ("v1", "Pod"),
    ("v1", "Service"),
    ("v1", "Endpoints"),
    ("discovery.k8s.io/v1", "EndpointSlice"),
    ("discovery.k8s.io/v1beta1", "EndpointSlice"),
];

/// Decoder for complete core objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct FullSchema;

impl SchemaDecoder for FullSchema {
    type Object = FullObject;
    const VARIANT: SchemaVariant = SchemaVariant::Full;
    const KINDS: &'static [(&'static str, &'static str)] = CORE_KINDS;
}

/// Decoder for the slim projection of core objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlimSchema;

impl SchemaDecoder for SlimSchema {
    type Object = SlimObject;
    const VARIANT: SchemaVariant = SchemaVariant::Slim;
    // Namespaces carry nothing the agent reads, so the projection skips them.
    const KINDS: &'static [(&'static str, &'static str)] = &[
        ("v1", "Node"),
        ("v1", "Pod"),
        ("v1", "Service"),
        ("v1", "Endpoints"),
        ("discovery.k8s.io/v1", "EndpointSlice"),
        ("discovery.k8s.io/v1beta1", "EndpointSlice"),
    ];
}

/// Decoder for mesh domain objects.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeshSchema;

impl SchemaDecoder for MeshSchema {
    type Object = MeshObject;
    const VARIANT: SchemaVariant = SchemaVariant::Mesh;
    const KINDS: &'static [(&'static str, &'static str)] = &[
        ("mesh.cpsim.io/v2", "MeshNode"),
        ("mesh.cpsim.io/v2", "MeshEndpoint"),
        ("mesh.cpsim.io/v2", "MeshIdentity"),
        ("mesh.cpsim.io/v2", "MeshEgressGatewayPolicy"),
        ("mesh.cpsim.io/v2", "MeshNetworkPolicy"),
        ("mesh.cpsim.io/v2", "MeshClusterwideNetworkPolicy"),
        ("mesh.cpsim.io/v2", "MeshLocalRedirectPolicy"),
        ("mesh.cpsim.io/v2", "MeshExternalWorkload"),
        ("mesh.cpsim.io/v2", "MeshEnvoyConfig"),
        ("mesh.cpsim.io/v2", "MeshClusterwideEnvoyConfig"),
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode(value: serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    fn node() -> Vec<u8> {
        encode(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": "k8s1", "labels": {"role": "worker"}},
            "spec": {"podCIDRs": ["10.0.1.0/24"], "providerID": "kind://k8s1"},
            "status": {"addresses": [{"type": "InternalIP", "address": "172.18.0.2"}]},
        }))
    }

    #[test]
    fn core_kind_decodes_in_full_and_slim_only() {
        let bytes = node();
        let full = FullSchema::decode(&bytes).unwrap().expect("full accepts Node");
        let slim = SlimSchema::decode(&bytes).unwrap().expect("slim accepts Node");
        assert!(MeshSchema::decode(&bytes).unwrap().is_none());

        match full {
            FullObject::Node(node) => {
                assert_eq!(node.spec.provider_id.as_deref(), Some("kind://k8s1"));
                assert_eq!(node.metadata.labels["role"], "worker");
            }
            other => panic!("unexpected object {other:?}"),
        }
        match slim {
            SlimObject::Node(node) => assert_eq!(node.spec.pod_cidrs, vec!["10.0.1.0/24"]),
            other => panic!("unexpected object {other:?}"),
        }
    }

    #[test]
    fn unknown_group_is_rejected_not_failed() {
        let bytes = encode(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web"},
        }));
        assert!(FullSchema::decode(&bytes).unwrap().is_none());
        assert!(SlimSchema::decode(&bytes).unwrap().is_none());
        assert!(MeshSchema::decode(&bytes).unwrap().is_none());
    }

    #[test]
    fn wrong_field_shape_is_malformed() {
        let bytes = encode(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": "k8s1"},
            "spec": {"podCIDRs": "10.0.1.0/24"},
        }));
        let err = FullSchema::decode(&bytes).unwrap_err();
        match err {
            SchemaError::Malformed { variant, gvk, .. } => {
                assert_eq!(variant, SchemaVariant::Full);
                assert_eq!(gvk, "v1/Node");
            }
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn non_json_payload_is_an_envelope_error() {
        let err = FullSchema::decode(b"not json").unwrap_err();
        assert!(matches!(err, SchemaError::Envelope(_)));
    }

    #[test]
    fn namespace_is_full_only() {
        let bytes = encode(json!({
            "apiVersion": "v1",
            "kind": "Namespace",
            "metadata": {"name": "shop"},
        }));
        assert!(FullSchema::decode(&bytes).unwrap().is_some());
        assert!(SlimSchema::decode(&bytes).unwrap().is_none());
    }

    #[test]
    fn decoding_is_pure() {
        let bytes = node();
        let first = FullSchema::decode(&bytes).unwrap();
        let second = FullSchema::decode(&bytes).unwrap();
        assert_eq!(first, second);
    }
}
