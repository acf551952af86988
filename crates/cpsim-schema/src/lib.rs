//! ---
//! cpsim_section: "02-schema-data-model"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Shared schema definitions and decoding logic."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! Schema definitions for the simulated control-plane API.
//!
//! The same logical resource can be represented by several independent
//! schema variants: the full core objects, a slim projection carrying only
//! the fields a node agent reads, and the mesh domain objects. Every variant
//! decodes from one canonical JSON encoding of a [`Resource`], and reports an
//! unrecognised kind as `Ok(None)` rather than an error.

use std::path::PathBuf;

pub mod coordinate;
pub mod decoder;
pub mod documents;
pub mod resource;
pub mod variants;

/// Shared result type for schema operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Errors raised while converting or decoding resources.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The payload names a kind the variant recognises but does not fit its
    /// typed representation.
    #[error("{variant} schema failed to decode {gvk}: {source}")]
    Malformed {
        variant: SchemaVariant,
        gvk: String,
        #[source]
        source: serde_json::Error,
    },
    /// The payload is not a JSON object at all.
    #[error("payload is not a valid object envelope: {0}")]
    Envelope(#[source] serde_json::Error),
    /// The canonical form is missing required identity fields.
    #[error("invalid object: {0}")]
    InvalidObject(String),
    /// Wrapper for YAML parsing problems in fixture documents.
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    /// Wrapper for JSON serialization problems.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    /// Raised when a fixture file cannot be read.
    #[error("unable to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Named decoding profiles.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SchemaVariant {
    /// Complete core API objects.
    Full,
    /// Reduced projection of the core objects.
    Slim,
    /// Mesh domain objects.
    Mesh,
}

pub use coordinate::{GroupVersionKind, ResourceCoordinate};
pub use decoder::{FullSchema, MeshSchema, SchemaDecoder, SlimSchema, TypeMeta};
pub use documents::{decode_documents, load_documents};
pub use resource::{ApiObject, IntoResource, Resource};
pub use variants::full::FullObject;
pub use variants::mesh::MeshObject;
pub use variants::slim::SlimObject;
