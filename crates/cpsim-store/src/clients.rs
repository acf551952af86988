//! ---
//! cpsim_section: "04-object-store"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Resource trackers and multi-variant dispatch."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::sync::Arc;

use cpsim_schema::{FullSchema, MeshSchema, SchemaVariant, SlimSchema};

use crate::store::TrackerEntry;
use crate::tracker::ObjectTracker;

/// Shared handles to each variant's tracker, handed to the simulated
/// processes when they start. Cloning shares the underlying trackers.
#[derive(Debug, Clone, Default)]
pub struct StoreClients {
    pub full: Arc<ObjectTracker<FullSchema>>,
    pub slim: Arc<ObjectTracker<SlimSchema>>,
    pub mesh: Arc<ObjectTracker<MeshSchema>>,
}

impl StoreClients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(&self, variant: SchemaVariant) -> TrackerEntry {
        match variant {
            SchemaVariant::Full => TrackerEntry::Full(Arc::clone(&self.full)),
            SchemaVariant::Slim => TrackerEntry::Slim(Arc::clone(&self.slim)),
            SchemaVariant::Mesh => TrackerEntry::Mesh(Arc::clone(&self.mesh)),
        }
    }
}
