//! ---
//! cpsim_section: "04-object-store"
//! cpsim_subsection: "module"
//! cpsim_type: "source"
//! cpsim_scope: "code"
//! cpsim_description: "Resource trackers and multi-variant dispatch."
//! cpsim_version: "v0.1.0"
//! cpsim_owner: "tbd"
//! ---
use std::fmt;
use std::marker::PhantomData;

use indexmap::IndexMap;
use parking_lot::RwLock;

use cpsim_schema::{ApiObject, ResourceCoordinate, SchemaDecoder, SchemaVariant};

use crate::{Mutation, Result, StoreError};

struct TrackerInner<O> {
    objects: IndexMap<ResourceCoordinate, O>,
    revision: u64,
}

/// One variant's collection of typed objects keyed by coordinate.
///
/// Shared between the test thread and the simulated processes, so every
/// operation takes the internal lock for its whole duration.
pub struct ObjectTracker<S: SchemaDecoder> {
    inner: RwLock<TrackerInner<S::Object>>,
    _decoder: PhantomData<fn() -> S>,
}

impl<S: SchemaDecoder> ObjectTracker<S> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(TrackerInner {
                objects: IndexMap::new(),
                revision: 0,
            }),
            _decoder: PhantomData,
        }
    }

    pub fn variant(&self) -> SchemaVariant {
        S::VARIANT
    }

    pub fn get(&self, coordinate: &ResourceCoordinate) -> Result<S::Object> {
        self.inner
            .read()
            .objects
            .get(coordinate)
            .cloned()
            .ok_or_else(|| self.not_found(coordinate))
    }

    pub fn contains(&self, coordinate: &ResourceCoordinate) -> bool {
        self.inner.read().objects.contains_key(coordinate)
    }

    /// Insert a new object; fails if its coordinate is already held.
    pub fn add(&self, object: S::Object) -> Result<()> {
        let coordinate = object.coordinate();
        let mut inner = self.inner.write();
        if inner.objects.contains_key(&coordinate) {
            return Err(StoreError::AlreadyExists {
                variant: S::VARIANT,
                coordinate,
            });
        }
        inner.objects.insert(coordinate, object);
        inner.revision += 1;
        Ok(())
    }

    /// Replace an existing object; fails if its coordinate is not held.
    pub fn update(&self, object: S::Object) -> Result<()> {
        let coordinate = object.coordinate();
        let mut inner = self.inner.write();
        let Some(slot) = inner.objects.get_mut(&coordinate) else {
            return Err(self.not_found(&coordinate));
        };
        *slot = object;
        inner.revision += 1;
        Ok(())
    }

    /// Add or update under a single lock acquisition, so a concurrent writer
    /// cannot slip in between the existence check and the write.
    pub fn upsert(&self, object: S::Object) -> Mutation {
        let coordinate = object.coordinate();
        let mut inner = self.inner.write();
        let mutation = match inner.objects.get_mut(&coordinate) {
            Some(slot) => {
                *slot = object;
                Mutation::Updated
            }
            None => {
                inner.objects.insert(coordinate, object);
                Mutation::Added
            }
        };
        inner.revision += 1;
        mutation
    }

    /// Remove and return the object at `coordinate`.
    pub fn delete(&self, coordinate: &ResourceCoordinate) -> Result<S::Object> {
        let mut inner = self.inner.write();
        // shift_remove keeps the remaining objects in insertion order.
        let object = inner
            .objects
            .shift_remove(coordinate)
            .ok_or_else(|| self.not_found(coordinate))?;
        inner.revision += 1;
        Ok(object)
    }

    /// Objects of one kind, in insertion order.
    pub fn list(&self, kind: &str) -> Vec<S::Object> {
        self.inner
            .read()
            .objects
            .values()
            .filter(|object| object.kind() == kind)
            .cloned()
            .collect()
    }

    pub fn objects(&self) -> Vec<S::Object> {
        self.inner.read().objects.values().cloned().collect()
    }

    pub fn coordinates(&self) -> Vec<ResourceCoordinate> {
        self.inner.read().objects.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.read().objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Incremented on every successful mutation; never decreases.
    pub fn revision(&self) -> u64 {
        self.inner.read().revision
    }

    fn not_found(&self, coordinate: &ResourceCoordinate) -> StoreError {
        StoreError::NotFound {
            variant: S::VARIANT,
            coordinate: coordinate.clone(),
        }
    }
}

impl<S: SchemaDecoder> Default for ObjectTracker<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: SchemaDecoder> fmt::Debug for ObjectTracker<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.read();
        f.debug_struct("ObjectTracker")
            .field("variant", &S::VARIANT)
            .field("objects", &inner.objects.len())
            .field("revision", &inner.revision)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cpsim_schema::variants::full::{FullObject, Node};
    use cpsim_schema::variants::mesh::{MeshNode, MeshObject};
    use cpsim_schema::{FullSchema, MeshSchema};

    fn node(name: &str) -> FullObject {
        FullObject::Node(Node::new(name))
    }

    #[test]
    fn add_rejects_duplicates() {
        let tracker = ObjectTracker::<FullSchema>::new();
        tracker.add(node("k8s1")).unwrap();
        let err = tracker.add(node("k8s1")).unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists { .. }), "{err}");
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.revision(), 1);
    }

    #[test]
    fn update_and_delete_require_existing_coordinate() {
        let tracker = ObjectTracker::<FullSchema>::new();
        let missing = node("k8s9");
        let coordinate = missing.coordinate();
        assert!(matches!(
            tracker.update(missing).unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(matches!(
            tracker.delete(&coordinate).unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert!(tracker.get(&coordinate).is_err());
        assert_eq!(tracker.revision(), 0);
    }

    #[test]
    fn update_replaces_in_place() {
        let tracker = ObjectTracker::<FullSchema>::new();
        tracker.add(node("k8s1")).unwrap();
        tracker.add(node("k8s2")).unwrap();

        let mut changed = Node::new("k8s1");
        changed.spec.unschedulable = true;
        tracker.update(FullObject::Node(changed)).unwrap();

        let names: Vec<_> = tracker
            .objects()
            .iter()
            .map(|object| object.name().to_owned())
            .collect();
        assert_eq!(names, vec!["k8s1", "k8s2"]);
        let stored = tracker.get(&node("k8s1").coordinate()).unwrap();
        assert!(stored.as_node().unwrap().spec.unschedulable);
    }

    #[test]
    fn upsert_reports_mutation_kind() {
        let tracker = ObjectTracker::<MeshSchema>::new();
        let object = MeshObject::from(MeshNode::new("k8s1"));
        assert_eq!(tracker.upsert(object.clone()), Mutation::Added);
        assert_eq!(tracker.upsert(object), Mutation::Updated);
        assert_eq!(tracker.len(), 1);
        assert_eq!(tracker.revision(), 2);
    }

    #[test]
    fn list_filters_by_kind() {
        let tracker = ObjectTracker::<FullSchema>::new();
        tracker.add(node("k8s1")).unwrap();
        assert_eq!(tracker.list("Node").len(), 1);
        assert!(tracker.list("Pod").is_empty());
    }
}
