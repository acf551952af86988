//! ---
//! cpsim_section: "04-object-store"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Resource trackers and multi-variant dispatch."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use cpsim_logging::{sim_debug, LogContext};
use cpsim_schema::{
    FullSchema, IntoResource, MeshSchema, Resource, ResourceCoordinate, SchemaDecoder,
    SchemaVariant, SlimSchema, TypeMeta,
};

use crate::clients::StoreClients;
use crate::tracker::ObjectTracker;
use crate::{Mutation, Result, StoreError};

/// One registry slot: a tracker tagged with the variant whose decoder feeds it.
#[derive(Debug, Clone)]
pub enum TrackerEntry {
    Full(Arc<ObjectTracker<FullSchema>>),
    Slim(Arc<ObjectTracker<SlimSchema>>),
    Mesh(Arc<ObjectTracker<MeshSchema>>),
}

macro_rules! with_tracker {
    ($entry:expr, $tracker:ident => $body:expr) => {
        match $entry {
            TrackerEntry::Full($tracker) => $body,
            TrackerEntry::Slim($tracker) => $body,
            TrackerEntry::Mesh($tracker) => $body,
        }
    };
}

/// An object decoded by one variant, paired with the tracker it goes to.
enum Decoded {
    Full(Arc<ObjectTracker<FullSchema>>, <FullSchema as SchemaDecoder>::Object),
    Slim(Arc<ObjectTracker<SlimSchema>>, <SlimSchema as SchemaDecoder>::Object),
    Mesh(Arc<ObjectTracker<MeshSchema>>, <MeshSchema as SchemaDecoder>::Object),
}

impl Decoded {
    fn variant(&self) -> SchemaVariant {
        match self {
            Self::Full(..) => SchemaVariant::Full,
            Self::Slim(..) => SchemaVariant::Slim,
            Self::Mesh(..) => SchemaVariant::Mesh,
        }
    }

    fn write(self) -> Mutation {
        match self {
            Self::Full(tracker, object) => tracker.upsert(object),
            Self::Slim(tracker, object) => tracker.upsert(object),
            Self::Mesh(tracker, object) => tracker.upsert(object),
        }
    }
}

impl TrackerEntry {
    pub fn variant(&self) -> SchemaVariant {
        with_tracker!(self, tracker => tracker.variant())
    }

    /// Whether this entry's decoder has the kind in its registry.
    pub fn recognizes(&self, meta: &TypeMeta) -> bool {
        match self {
            Self::Full(_) => FullSchema::recognizes(meta),
            Self::Slim(_) => SlimSchema::recognizes(meta),
            Self::Mesh(_) => MeshSchema::recognizes(meta),
        }
    }

    pub fn contains(&self, coordinate: &ResourceCoordinate) -> bool {
        with_tracker!(self, tracker => tracker.contains(coordinate))
    }

    /// Stored object at `coordinate`, in canonical form.
    pub fn get(&self, coordinate: &ResourceCoordinate) -> Result<Resource> {
        with_tracker!(self, tracker => {
            let object = tracker.get(coordinate)?;
            Resource::from_object(&object).map_err(StoreError::Encode)
        })
    }

    pub fn coordinates(&self) -> Vec<ResourceCoordinate> {
        with_tracker!(self, tracker => tracker.coordinates())
    }

    pub fn len(&self) -> usize {
        with_tracker!(self, tracker => tracker.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn revision(&self) -> u64 {
        with_tracker!(self, tracker => tracker.revision())
    }

    pub fn as_full(&self) -> Option<&Arc<ObjectTracker<FullSchema>>> {
        match self {
            Self::Full(tracker) => Some(tracker),
            _ => None,
        }
    }

    pub fn as_slim(&self) -> Option<&Arc<ObjectTracker<SlimSchema>>> {
        match self {
            Self::Slim(tracker) => Some(tracker),
            _ => None,
        }
    }

    pub fn as_mesh(&self) -> Option<&Arc<ObjectTracker<MeshSchema>>> {
        match self {
            Self::Mesh(tracker) => Some(tracker),
            _ => None,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Option<Decoded>> {
        let decoded = match self {
            Self::Full(tracker) => FullSchema::decode(bytes)
                .map(|object| object.map(|object| Decoded::Full(Arc::clone(tracker), object))),
            Self::Slim(tracker) => SlimSchema::decode(bytes)
                .map(|object| object.map(|object| Decoded::Slim(Arc::clone(tracker), object))),
            Self::Mesh(tracker) => MeshSchema::decode(bytes)
                .map(|object| object.map(|object| Decoded::Mesh(Arc::clone(tracker), object))),
        };
        decoded.map_err(StoreError::Decode)
    }

    fn remove(&self, coordinate: &ResourceCoordinate) -> bool {
        with_tracker!(self, tracker => tracker.delete(coordinate).is_ok())
    }
}

/// Per-variant coordinate lists, for comparing store state before and after
/// an operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    pub trackers: BTreeMap<SchemaVariant, Vec<ResourceCoordinate>>,
}

impl StoreSnapshot {
    pub fn contains(&self, variant: SchemaVariant, coordinate: &ResourceCoordinate) -> bool {
        self.trackers
            .get(&variant)
            .is_some_and(|coordinates| coordinates.contains(coordinate))
    }
}

/// Ordered registry of trackers plus the dispatch that keeps them in step.
///
/// Registry order decides lookup priority only; every accepting tracker
/// receives each mutation.
#[derive(Debug, Clone)]
pub struct MultiVariantStore {
    clients: StoreClients,
    registry: Vec<TrackerEntry>,
}

impl MultiVariantStore {
    /// Store with the default registry order: full, slim, mesh.
    pub fn new() -> Self {
        Self::with_order(
            StoreClients::default(),
            &[SchemaVariant::Full, SchemaVariant::Slim, SchemaVariant::Mesh],
        )
    }

    /// Register the given variants of `clients`, in order. Repeated variants
    /// are registered once.
    pub fn with_order(clients: StoreClients, order: &[SchemaVariant]) -> Self {
        let mut registry: Vec<TrackerEntry> = Vec::with_capacity(order.len());
        for variant in order {
            if registry.iter().any(|entry| entry.variant() == *variant) {
                continue;
            }
            registry.push(clients.entry(*variant));
        }
        Self { clients, registry }
    }

    /// Apply one logical object to every tracker whose variant accepts it.
    ///
    /// Every decoder runs before any tracker is written, so a malformed
    /// payload or a kind no variant knows leaves all trackers untouched.
    pub fn update(&self, object: impl IntoResource) -> Result<Vec<(SchemaVariant, Mutation)>> {
        let resource = object.into_resource().map_err(StoreError::Encode)?;
        self.update_resource(&resource)
    }

    pub fn update_resource(&self, resource: &Resource) -> Result<Vec<(SchemaVariant, Mutation)>> {
        let bytes = resource.to_bytes().map_err(StoreError::Encode)?;
        let mut accepted = Vec::new();
        for entry in &self.registry {
            if let Some(decoded) = entry.decode(&bytes)? {
                accepted.push(decoded);
            }
        }
        if accepted.is_empty() {
            return Err(StoreError::NoAcceptor {
                coordinate: resource.coordinate(),
            });
        }

        let coordinate = resource.coordinate();
        let mut applied = Vec::with_capacity(accepted.len());
        for decoded in accepted {
            let variant = decoded.variant();
            let mutation = decoded.write();
            let variant_name = variant.to_string();
            sim_debug!(
                context = LogContext::new()
                    .with_variant(&variant_name)
                    .with_kind(resource.kind()),
                "{mutation} {coordinate}"
            );
            applied.push((variant, mutation));
        }
        Ok(applied)
    }

    /// Remove one logical object from every tracker that holds it.
    pub fn delete(&self, object: impl IntoResource) -> Result<Vec<SchemaVariant>> {
        let resource = object.into_resource().map_err(StoreError::Encode)?;
        self.delete_coordinate(&resource.coordinate())
    }

    /// Succeeds if at least one tracker held and removed `coordinate`.
    pub fn delete_coordinate(&self, coordinate: &ResourceCoordinate) -> Result<Vec<SchemaVariant>> {
        let meta = TypeMeta {
            api_version: coordinate.gvk.api_version(),
            kind: coordinate.gvk.kind.clone(),
        };
        let removed: Vec<SchemaVariant> = self
            .registry
            .iter()
            .filter(|entry| entry.recognizes(&meta))
            .filter(|entry| entry.remove(coordinate))
            .map(TrackerEntry::variant)
            .collect();
        if removed.is_empty() {
            return Err(StoreError::NotFoundAnywhere {
                coordinate: coordinate.clone(),
            });
        }
        sim_debug!(
            context = LogContext::new().with_kind(&coordinate.gvk.kind),
            "deleted {coordinate} from {} tracker(s)",
            removed.len()
        );
        Ok(removed)
    }

    /// First hit in registry order. A tracker that loses the object while
    /// it is being read counts as a miss.
    pub fn get(&self, coordinate: &ResourceCoordinate) -> Result<Resource> {
        for entry in &self.registry {
            match entry.get(coordinate) {
                Ok(resource) => return Ok(resource),
                Err(StoreError::NotFound { .. }) => continue,
                Err(err) => return Err(err),
            }
        }
        Err(StoreError::NotFoundAnywhere {
            coordinate: coordinate.clone(),
        })
    }

    pub fn tracker(&self, variant: SchemaVariant) -> Option<&TrackerEntry> {
        self.registry.iter().find(|entry| entry.variant() == variant)
    }

    pub fn registry(&self) -> &[TrackerEntry] {
        &self.registry
    }

    /// Handles to every tracker, for the simulated processes.
    pub fn clients(&self) -> StoreClients {
        self.clients.clone()
    }

    pub fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            trackers: self
                .registry
                .iter()
                .map(|entry| {
                    let mut coordinates = entry.coordinates();
                    coordinates.sort();
                    (entry.variant(), coordinates)
                })
                .collect(),
        }
    }
}

impl Default for MultiVariantStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(name: &str) -> serde_json::Value {
        json!({
            "apiVersion": "v1",
            "kind": "Node",
            "metadata": {"name": name},
            "spec": {"podCIDRs": ["10.0.1.0/24"]},
        })
    }

    #[test]
    fn update_reaches_every_accepting_tracker() {
        let store = MultiVariantStore::new();
        let applied = store.update(node("k8s1")).unwrap();
        assert_eq!(
            applied,
            vec![
                (SchemaVariant::Full, Mutation::Added),
                (SchemaVariant::Slim, Mutation::Added),
            ]
        );
        let again = store.update(node("k8s1")).unwrap();
        assert!(again.iter().all(|(_, mutation)| *mutation == Mutation::Updated));
        assert_eq!(store.tracker(SchemaVariant::Full).unwrap().len(), 1);
        assert_eq!(store.tracker(SchemaVariant::Slim).unwrap().len(), 1);
        assert!(store.tracker(SchemaVariant::Mesh).unwrap().is_empty());
    }

    #[test]
    fn malformed_payload_writes_nothing() {
        let store = MultiVariantStore::new();
        let before = store.snapshot();
        let err = store
            .update(json!({
                "apiVersion": "v1",
                "kind": "Node",
                "metadata": {"name": "k8s1"},
                "spec": {"podCIDRs": 7},
            }))
            .unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)), "{err}");
        assert_eq!(store.snapshot(), before);
    }

    #[test]
    fn get_falls_through_while_a_tracker_churns() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let clients = StoreClients::default();
        let store = MultiVariantStore::with_order(
            clients.clone(),
            &[SchemaVariant::Slim, SchemaVariant::Full],
        );
        store.update(node("k8s1")).unwrap();
        let coordinate = ResourceCoordinate::cluster("v1", "Node", "k8s1");
        let slim_node = clients.slim.get(&coordinate).unwrap();

        let stop = Arc::new(AtomicBool::new(false));
        let churn = {
            let stop = Arc::clone(&stop);
            let slim = Arc::clone(&clients.slim);
            let coordinate = coordinate.clone();
            std::thread::spawn(move || {
                while !stop.load(Ordering::Relaxed) {
                    slim.upsert(slim_node.clone());
                    let _ = slim.delete(&coordinate);
                }
            })
        };

        for _ in 0..5_000 {
            store.get(&coordinate).unwrap();
        }
        stop.store(true, Ordering::Relaxed);
        churn.join().unwrap();
    }

    #[test]
    fn registry_order_sets_lookup_priority() {
        let store = MultiVariantStore::with_order(
            StoreClients::default(),
            &[SchemaVariant::Slim, SchemaVariant::Full, SchemaVariant::Slim],
        );
        assert_eq!(store.registry().len(), 2);
        store
            .update(json!({
                "apiVersion": "v1",
                "kind": "Node",
                "metadata": {"name": "k8s1", "annotations": {"full": "only"}},
            }))
            .unwrap();
        let coordinate = ResourceCoordinate::cluster("v1", "Node", "k8s1");
        let found = store.get(&coordinate).unwrap();
        // The slim projection drops annotations, so the hit came from slim.
        assert_eq!(found.field(&["metadata", "annotations"]), None);
        let full = store.tracker(SchemaVariant::Full).unwrap().get(&coordinate).unwrap();
        assert_eq!(
            full.field(&["metadata", "annotations", "full"]),
            Some(&json!("only"))
        );
    }

    #[test]
    fn unregistered_variant_is_never_written() {
        let clients = StoreClients::default();
        let store = MultiVariantStore::with_order(clients.clone(), &[SchemaVariant::Full]);
        store.update(node("k8s1")).unwrap();
        assert!(clients.slim.is_empty());
        assert!(store.tracker(SchemaVariant::Slim).is_none());
    }
}
