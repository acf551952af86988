//! ---
//! cpsim_section: "02-schema-data-model"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Multi-document YAML fixture loading."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::resource::Resource;
use crate::{Result, SchemaError};

/// Parse a YAML stream (documents separated by `---`) into canonical
/// resources, in document order.
///
/// Empty documents are skipped. `*List` objects and top-level sequences are
/// flattened into their items.
pub fn decode_documents(text: &str) -> Result<Vec<Resource>> {
    let mut resources = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let yaml = serde_yaml::Value::deserialize(document)?;
        if yaml.is_null() {
            continue;
        }
        let value: Value = serde_json::to_value(yaml)?;
        flatten_into(value, &mut resources)?;
    }
    Ok(resources)
}

/// Read and decode a fixture file.
pub fn load_documents(path: impl AsRef<Path>) -> Result<Vec<Resource>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| SchemaError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let resources = decode_documents(&text)?;
    debug!(path = %path.display(), count = resources.len(), "loaded fixture documents");
    Ok(resources)
}

fn flatten_into(value: Value, out: &mut Vec<Resource>) -> Result<()> {
    match value {
        Value::Array(items) => {
            for item in items {
                flatten_into(item, out)?;
            }
        }
        Value::Object(mut fields) if is_list(&fields) => {
            if let Some(Value::Array(items)) = fields.remove("items") {
                for item in items {
                    flatten_into(item, out)?;
                }
            }
        }
        other => out.push(Resource::from_value(other)?),
    }
    Ok(())
}

fn is_list(fields: &serde_json::Map<String, Value>) -> bool {
    fields
        .get("kind")
        .and_then(Value::as_str)
        .is_some_and(|kind| kind.ends_with("List"))
        && fields.contains_key("items")
}
