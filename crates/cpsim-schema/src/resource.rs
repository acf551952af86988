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
use serde_json::{Map, Value};

use crate::coordinate::{GroupVersionKind, ResourceCoordinate};
use crate::{Result, SchemaError};

/// Behaviour shared by every typed object of every schema variant.
pub trait ApiObject: Serialize + Clone + fmt::Debug + Send + Sync + 'static {
    fn api_version(&self) -> &str;
    fn kind(&self) -> &str;
    fn name(&self) -> &str;
    /// Empty for cluster-scoped objects.
    fn namespace(&self) -> &str;

    fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::from_api_version(self.api_version(), self.kind())
    }

    fn coordinate(&self) -> ResourceCoordinate {
        ResourceCoordinate::new(self.gvk(), self.namespace(), self.name())
    }
}

/// Canonical, variant-agnostic form of a resource.
///
/// Field order is preserved so the encoded bytes handed to every decoder are
/// identical for identical input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Resource {
    fields: Map<String, Value>,
}

impl Resource {
    /// Validate and wrap an untyped object. Requires `apiVersion`, `kind`, and
    /// a non-empty `metadata.name`.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(fields) = value else {
            return Err(SchemaError::InvalidObject(format!(
                "expected a JSON object, found {}",
                type_name(&value)
            )));
        };
        let resource = Self { fields };
        for (field, present) in [
            ("apiVersion", !resource.api_version().is_empty()),
            ("kind", !resource.kind().is_empty()),
            ("metadata.name", !resource.name().is_empty()),
        ] {
            if !present {
                return Err(SchemaError::InvalidObject(format!(
                    "missing required field {field}"
                )));
            }
        }
        Ok(resource)
    }

    /// Convert a typed object of any variant into canonical form.
    pub fn from_object<T: ApiObject>(object: &T) -> Result<Self> {
        let mut value = serde_json::to_value(object)?;
        if let Value::Object(fields) = &mut value {
            if !fields.contains_key("kind") {
                fields.insert("kind".into(), Value::String(object.kind().to_owned()));
            }
        }
        Self::from_value(value)
    }

    /// Encode into the intermediate byte form every decoder accepts.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(&self.fields)?)
    }

    pub fn api_version(&self) -> &str {
        self.fields
            .get("apiVersion")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.fields
            .get("kind")
            .and_then(Value::as_str)
            .unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.metadata_str("name")
    }

    pub fn namespace(&self) -> &str {
        self.metadata_str("namespace")
    }

    pub fn gvk(&self) -> GroupVersionKind {
        GroupVersionKind::from_api_version(self.api_version(), self.kind())
    }

    pub fn coordinate(&self) -> ResourceCoordinate {
        ResourceCoordinate::new(self.gvk(), self.namespace(), self.name())
    }

    /// Look up a nested field by path, e.g. `["spec", "podCIDRs"]`.
    pub fn field(&self, path: &[&str]) -> Option<&Value> {
        let (first, rest) = path.split_first()?;
        rest.iter()
            .try_fold(self.fields.get(*first)?, |value, key| value.get(key))
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    fn metadata_str(&self, key: &str) -> &str {
        self.fields
            .get("metadata")
            .and_then(|meta| meta.get(key))
            .and_then(Value::as_str)
            .unwrap_or_default()
    }
}

impl TryFrom<Value> for Resource {
    type Error = SchemaError;

    fn try_from(value: Value) -> Result<Self> {
        Self::from_value(value)
    }
}

impl From<Resource> for Value {
    fn from(resource: Resource) -> Self {
        resource.into_value()
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Anything that can be handed to the store as a mutation: canonical
/// resources, raw JSON, or typed objects of any variant.
pub trait IntoResource {
    fn into_resource(self) -> Result<Resource>;
}

impl IntoResource for Resource {
    fn into_resource(self) -> Result<Resource> {
        Ok(self)
    }
}

impl IntoResource for Value {
    fn into_resource(self) -> Result<Resource> {
        Resource::from_value(self)
    }
}

impl<T: ApiObject> IntoResource for T {
    fn into_resource(self) -> Result<Resource> {
        Resource::from_object(&self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_form_exposes_identity() {
        let resource = Resource::from_value(json!({
            "apiVersion": "discovery.k8s.io/v1",
            "kind": "EndpointSlice",
            "metadata": {"name": "web-abc", "namespace": "shop"},
            "addressType": "IPv4",
        }))
        .unwrap();
        let coordinate = resource.coordinate();
        assert_eq!(coordinate.gvk.group, "discovery.k8s.io");
        assert_eq!(coordinate.namespace, "shop");
        assert_eq!(coordinate.name, "web-abc");
        assert_eq!(resource.field(&["addressType"]), Some(&json!("IPv4")));
    }

    #[test]
    fn missing_name_is_invalid() {
        let err = Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("metadata.name"), "{err}");
    }

    #[test]
    fn non_object_is_invalid() {
        let err = Resource::from_value(json!([1, 2])).unwrap_err();
        assert!(matches!(err, SchemaError::InvalidObject(_)));
    }

    #[test]
    fn encoding_preserves_field_order() {
        let resource = Resource::from_value(json!({
            "kind": "Node",
            "apiVersion": "v1",
            "metadata": {"name": "k8s1"},
        }))
        .unwrap();
        let bytes = resource.to_bytes().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        assert!(text.starts_with("{\"kind\":\"Node\",\"apiVersion\":\"v1\""), "{text}");
    }

    #[test]
    fn nested_field_lookup() {
        let resource = Resource::from_value(json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": "k8s1", "labels": {"zone": "a"}},
        }))
        .unwrap();
        assert_eq!(
            resource.field(&["metadata", "labels", "zone"]),
            Some(&json!("a"))
        );
        assert_eq!(resource.field(&["spec", "podCIDRs"]), None);
    }
}
