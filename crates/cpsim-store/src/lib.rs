//! ---
//! cpsim_section: "04-object-store"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Resource trackers and multi-variant dispatch."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
//! In-memory object store shared by the test and the simulated processes.
//!
//! Each schema variant owns an [`ObjectTracker`]. The [`MultiVariantStore`]
//! routes one logical mutation to every tracker whose decoder accepts it.

use cpsim_schema::{ResourceCoordinate, SchemaError, SchemaVariant};

pub mod clients;
pub mod store;
pub mod tracker;

/// Result alias used throughout the store crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Error type for tracker and store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// `add` on a coordinate the tracker already holds.
    #[error("{variant} tracker already holds {coordinate}")]
    AlreadyExists {
        /// Tracker that refused the add.
        variant: SchemaVariant,
        /// Offending coordinate.
        coordinate: ResourceCoordinate,
    },
    /// `get`, `update`, or `delete` on a coordinate the tracker does not hold.
    #[error("{variant} tracker has no {coordinate}")]
    NotFound {
        /// Tracker that was queried.
        variant: SchemaVariant,
        /// Missing coordinate.
        coordinate: ResourceCoordinate,
    },
    /// No registered variant recognises the object's kind.
    #[error("no registered schema variant accepts {coordinate}")]
    NoAcceptor {
        /// Coordinate of the rejected object.
        coordinate: ResourceCoordinate,
    },
    /// A delete or lookup found the coordinate in no tracker.
    #[error("{coordinate} not found in any tracker")]
    NotFoundAnywhere {
        /// Coordinate that was looked up.
        coordinate: ResourceCoordinate,
    },
    /// A variant recognised the kind but could not decode the payload.
    #[error(transparent)]
    Decode(SchemaError),
    /// The object could not be brought into canonical form.
    #[error("unable to encode object: {0}")]
    Encode(#[source] SchemaError),
}

/// Outcome of applying one object to one tracker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum Mutation {
    /// The coordinate was new to the tracker.
    Added,
    /// The coordinate existed and its object was replaced.
    Updated,
}

pub use clients::StoreClients;
pub use store::{MultiVariantStore, StoreSnapshot, TrackerEntry};
pub use tracker::ObjectTracker;
