//! Simulated transactional object store.
//!
//! Tracks managed-object identity, name bindings and removal, and validates
//! serializability with an explicit round-trip pass that stands in for a
//! transaction commit.
//!
//! # Identity
//!
//! Instances are keyed by allocation address, never by value. The store keeps
//! a strong handle to every tracked and every removed instance, so an address
//! it knows about cannot be recycled for a different object.
//!
//! # Transaction boundary
//!
//! [`ObjectStore::validate_transaction_boundary`] deactivates every reference
//! issued since the previous pass, then replaces each tracked instance with a
//! fresh copy read back from its serialized form. Test code holding an old
//! [`Managed`] handle keeps a stale, untracked instance afterwards, so stale
//! aliasing shows up at the next lookup.

mod object;
mod reference;
mod slot;

use std::{
    any::type_name,
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fmt,
    ops::Bound,
    rc::Rc,
};

pub use object::{AnyManaged, Managed, ManagedObject, ObjectId};
pub use reference::Reference;
use reference::Liveness;
use serde::Serialize;
use slot::{ObjectKey, Slot};

use crate::error::StoreError;

/// Record of a removed instance.
struct Removed {
    id: ObjectId,
    /// Held so the address stays reserved for the removed instance.
    _instance: Rc<dyn Slot>,
}

#[derive(Default)]
struct StoreInner {
    /// Next identity to assign
    next_id: ObjectId,
    /// Identity → instance
    objects: BTreeMap<ObjectId, Rc<dyn Slot>>,
    /// Instance → identity, the inverse of `objects`
    ids: HashMap<ObjectKey, ObjectId>,
    /// Instances that have been removed and may never return
    removed: HashMap<ObjectKey, Removed>,
    /// Name → identity, ordered for `next_bound_name`
    bindings: BTreeMap<String, ObjectId>,
    /// Liveness of references issued since the last validation pass
    issued: Vec<Liveness>,
}

impl StoreInner {
    fn check_removed(&self, key: ObjectKey, type_name: &str) -> Result<(), StoreError> {
        match self.removed.get(&key) {
            Some(removed) => Err(StoreError::NotFound(format!(
                "{type_name} (id {}) has been previously removed from the data store",
                removed.id
            ))),
            None => Ok(()),
        }
    }

    /// Admit `object` if absent and return its identity.
    fn admit<T: ManagedObject>(&mut self, object: &Managed<T>) -> Result<ObjectId, StoreError> {
        let key = object.key();
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }
        self.check_removed(key, type_name::<T>())?;

        let id = self.next_id;
        self.next_id = id.successor();
        self.objects.insert(id, object.slot());
        self.ids.insert(key, id);

        debug_assert_eq!(self.objects.len(), self.ids.len());
        tracing::debug!(id = %id, type_name = type_name::<T>(), "Admitted object");

        Ok(id)
    }

    fn lookup(&self, id: ObjectId) -> Result<Rc<dyn Slot>, StoreError> {
        self.objects.get(&id).cloned().ok_or_else(|| {
            StoreError::NotFound(format!("no object found in the data store with id {id}"))
        })
    }
}

/// Point-in-time view of the store's bookkeeping, for invariant checks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreSnapshot {
    /// Identities of tracked objects, ascending
    pub tracked: Vec<ObjectId>,
    /// Identities reachable through the instance → identity index, ascending
    pub indexed: Vec<ObjectId>,
    /// Identities of removed objects, ascending
    pub removed: Vec<ObjectId>,
    /// Name bindings
    pub bindings: BTreeMap<String, ObjectId>,
    /// Identity the next admitted object will receive
    pub next_id: ObjectId,
    /// References issued since the last validation pass
    pub outstanding_references: usize,
}

/// Simulated transactional object store.
///
/// Cheap to clone; clones share the same underlying store. Single-threaded
/// (`!Send`). No internal borrow is held while user code runs, so
/// removal hooks may call back into the store.
#[derive(Clone, Default)]
pub struct ObjectStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl ObjectStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit `object` if needed and return a reference to it.
    ///
    /// The reference is tracked so the next validation pass deactivates it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `object` was previously removed.
    pub fn create_reference<T: ManagedObject>(
        &self,
        object: &Managed<T>,
    ) -> Result<Reference<T>, StoreError> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.admit(object)?;

        let reference = Reference::new(id);
        inner.issued.push(reference.liveness().clone());
        Ok(reference)
    }

    /// Object bound to `name`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotBound`] if no binding exists
    /// - [`StoreError::NotFound`] if the bound object was removed
    /// - [`StoreError::InvalidArgument`] if the bound object is not a `T`
    pub fn get_binding<T: ManagedObject>(&self, name: &str) -> Result<Managed<T>, StoreError> {
        expect_type(self.get_binding_any(name)?)
    }

    /// Same as [`ObjectStore::get_binding`]; no locking is simulated.
    pub fn get_binding_for_update<T: ManagedObject>(
        &self,
        name: &str,
    ) -> Result<Managed<T>, StoreError> {
        self.get_binding(name)
    }

    /// Type-erased [`ObjectStore::get_binding`].
    pub fn get_binding_any(&self, name: &str) -> Result<AnyManaged, StoreError> {
        let inner = self.inner.borrow();
        let id = inner
            .bindings
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NotBound(name.to_string()))?;
        inner.lookup(id).map(AnyManaged::new)
    }

    /// Flag intent to modify `object`. Has no observable effect on success.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `object` is untracked and was previously
    /// removed.
    pub fn mark_for_update<T: ManagedObject>(&self, object: &Managed<T>) -> Result<(), StoreError> {
        let inner = self.inner.borrow();
        let key = object.key();
        if !inner.ids.contains_key(&key) {
            inner.check_removed(key, type_name::<T>())?;
        }
        Ok(())
    }

    /// Identity of `object`, admitting it first if it is not tracked.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `object` was previously removed.
    pub fn object_id<T: ManagedObject>(&self, object: &Managed<T>) -> Result<ObjectId, StoreError> {
        self.inner.borrow_mut().admit(object)
    }

    /// Smallest bound name strictly greater than `name`, or the smallest bound
    /// name overall when `name` is `None`.
    pub fn next_bound_name(&self, name: Option<&str>) -> Option<String> {
        let inner = self.inner.borrow();
        let mut names = match name {
            Some(name) => {
                inner.bindings.range::<str, _>((Bound::Excluded(name), Bound::Unbounded))
            },
            None => inner.bindings.range::<str, _>(..),
        };
        names.next().map(|(name, _)| name.clone())
    }

    /// Delete the binding for `name`. The object itself is untouched.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotBound`] if no binding exists.
    pub fn remove_binding(&self, name: &str) -> Result<(), StoreError> {
        let removed = self.inner.borrow_mut().bindings.remove(name);
        match removed {
            Some(id) => {
                tracing::debug!(name, id = %id, "Removed binding");
                Ok(())
            },
            None => Err(StoreError::NotBound(name.to_string())),
        }
    }

    /// Remove `object` from the store for good.
    ///
    /// Runs [`ManagedObject::removing_object`] before eviction. Removing an
    /// object that was never tracked is a no-op. Bindings to the object are
    /// left in place and fail with [`StoreError::NotFound`] on lookup.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if `object` was already removed
    /// - [`StoreError::InvalidArgument`] if `object` is borrowed, so its
    ///   removal hook cannot run
    pub fn remove_object<T: ManagedObject>(&self, object: &Managed<T>) -> Result<(), StoreError> {
        let key = object.key();
        let id = {
            let inner = self.inner.borrow();
            match inner.ids.get(&key) {
                Some(id) => *id,
                None => return inner.check_removed(key, type_name::<T>()),
            }
        };

        object
            .try_borrow_mut()
            .map_err(|_| {
                StoreError::InvalidArgument(format!(
                    "object {id} is borrowed; its removal hook cannot run"
                ))
            })?
            .removing_object();

        let mut inner = self.inner.borrow_mut();
        // The hook may already have removed this object.
        let Some(id) = inner.ids.remove(&key) else {
            return Ok(());
        };
        if let Some(instance) = inner.objects.remove(&id) {
            inner.removed.insert(key, Removed { id, _instance: instance });
        }

        debug_assert_eq!(inner.objects.len(), inner.ids.len());
        tracing::debug!(id = %id, type_name = type_name::<T>(), "Removed object");

        Ok(())
    }

    /// Bind `name` to `object`, admitting it if needed. Rebinding a name
    /// re-points it.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if `object` was previously removed.
    pub fn set_binding<T: ManagedObject>(
        &self,
        name: &str,
        object: &Managed<T>,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.borrow_mut();
        let id = inner.admit(object)?;
        inner.bindings.insert(name.to_string(), id);

        tracing::debug!(name, id = %id, "Bound name");
        Ok(())
    }

    /// Every tracked object, in identity order.
    pub fn all_objects(&self) -> Vec<AnyManaged> {
        self.inner.borrow().objects.values().cloned().map(AnyManaged::new).collect()
    }

    /// Copy of every name binding. Bindings whose object was removed map to
    /// `None`. Later store mutations do not affect the returned map.
    pub fn bound_objects(&self) -> BTreeMap<String, Option<AnyManaged>> {
        let inner = self.inner.borrow();
        inner
            .bindings
            .iter()
            .map(|(name, id)| (name.clone(), inner.objects.get(id).cloned().map(AnyManaged::new)))
            .collect()
    }

    /// Tracked object with identity `id`.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if no such object is tracked
    /// - [`StoreError::InvalidArgument`] if the object is not a `T`
    pub fn object_with_id<T: ManagedObject>(&self, id: ObjectId) -> Result<Managed<T>, StoreError> {
        expect_type(self.object_with_id_any(id)?)
    }

    /// Type-erased [`ObjectStore::object_with_id`].
    pub fn object_with_id_any(&self, id: ObjectId) -> Result<AnyManaged, StoreError> {
        self.inner.borrow().lookup(id).map(AnyManaged::new)
    }

    /// True if `object` is currently tracked.
    pub fn contains<T: ManagedObject>(&self, object: &Managed<T>) -> bool {
        self.inner.borrow().ids.contains_key(&object.key())
    }

    /// True if `object` has been removed.
    pub fn is_removed<T: ManagedObject>(&self, object: &Managed<T>) -> bool {
        self.inner.borrow().removed.contains_key(&object.key())
    }

    /// Number of tracked objects.
    pub fn len(&self) -> usize {
        self.inner.borrow().objects.len()
    }

    /// True if no objects are tracked.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().objects.is_empty()
    }

    /// Number of objects removed over the store's lifetime.
    pub fn removed_count(&self) -> usize {
        self.inner.borrow().removed.len()
    }

    /// Bookkeeping snapshot for invariant checks.
    pub fn snapshot(&self) -> StoreSnapshot {
        let inner = self.inner.borrow();

        let mut indexed: Vec<_> = inner.ids.values().copied().collect();
        indexed.sort_unstable();
        let mut removed: Vec<_> = inner.removed.values().map(|r| r.id).collect();
        removed.sort_unstable();

        StoreSnapshot {
            tracked: inner.objects.keys().copied().collect(),
            indexed,
            removed,
            bindings: inner.bindings.clone(),
            next_id: inner.next_id,
            outstanding_references: inner.issued.len(),
        }
    }

    /// Simulate a transaction boundary.
    ///
    /// Deactivates every reference issued since the previous pass, then
    /// serializes each tracked object and replaces it with the deserialized
    /// copy, rebuilding the identity index around the copies. Identities and
    /// bindings are preserved.
    ///
    /// # Errors
    ///
    /// [`StoreError::Serialization`] if any object fails to round-trip. The
    /// references are still deactivated, but no object is replaced.
    pub fn validate_transaction_boundary(&self) -> Result<(), StoreError> {
        let (objects, deactivated) = {
            let mut inner = self.inner.borrow_mut();
            let deactivated = inner.issued.len();
            for liveness in inner.issued.drain(..) {
                liveness.deactivate();
            }
            let objects: Vec<_> =
                inner.objects.iter().map(|(id, slot)| (*id, Rc::clone(slot))).collect();
            (objects, deactivated)
        };

        let mut fresh = BTreeMap::new();
        for (id, slot) in objects {
            let copy = slot.round_trip().map_err(|err| {
                tracing::error!(id = %id, type_name = slot.type_name(), error = %err, "Object failed to round-trip");
                StoreError::Serialization {
                    id,
                    type_name: slot.type_name(),
                    reason: err.to_string(),
                }
            })?;
            fresh.insert(id, copy);
        }

        let mut inner = self.inner.borrow_mut();
        inner.ids = fresh.iter().map(|(id, slot)| (ObjectKey::of(slot), *id)).collect();
        inner.objects = fresh;

        debug_assert_eq!(inner.objects.len(), inner.ids.len());
        tracing::info!(
            objects = inner.objects.len(),
            deactivated_references = deactivated,
            "Validated transaction boundary"
        );

        Ok(())
    }
}

impl fmt::Debug for ObjectStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ObjectStore")
            .field("objects", &inner.objects.len())
            .field("bindings", &inner.bindings.len())
            .field("removed", &inner.removed.len())
            .field("next_id", &inner.next_id)
            .finish_non_exhaustive()
    }
}

fn expect_type<T: ManagedObject>(object: AnyManaged) -> Result<Managed<T>, StoreError> {
    object.downcast().ok_or_else(|| {
        StoreError::InvalidArgument(format!(
            "object is a {}, not a {}",
            object.type_name(),
            type_name::<T>()
        ))
    })
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Player {
        name: String,
        score: u32,
    }

    impl ManagedObject for Player {}

    impl Player {
        fn named(name: &str) -> Managed<Self> {
            Managed::new(Self { name: name.to_string(), score: 0 })
        }
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Sword;

    impl ManagedObject for Sword {}

    thread_local! {
        static REMOVALS: Cell<u32> = const { Cell::new(0) };
    }

    #[derive(Debug, Serialize, Deserialize)]
    struct Tracked;

    impl ManagedObject for Tracked {
        fn removing_object(&mut self) {
            REMOVALS.with(|count| count.set(count.get() + 1));
        }
    }

    #[test]
    fn test_new_store_is_empty() {
        let store = ObjectStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
        assert_eq!(store.removed_count(), 0);
        assert_eq!(store.next_bound_name(None), None);
    }

    #[test]
    fn test_create_reference_resolves_to_same_instance() {
        let store = ObjectStore::new();
        let player = Player::named("ada");

        let reference = store.create_reference(&player).unwrap();
        let resolved = reference.resolve(&store).unwrap();

        assert!(resolved.ptr_eq(&player));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identity_assignment_is_idempotent() {
        let store = ObjectStore::new();
        let player = Player::named("ada");

        let reference = store.create_reference(&player).unwrap();
        assert_eq!(store.object_id(&player).unwrap(), reference.id());
        assert_eq!(store.create_reference(&player).unwrap().id(), reference.id());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_identical_values_get_distinct_ids() {
        let store = ObjectStore::new();
        let a = Player::named("twin");
        let b = Player::named("twin");

        let id_a = store.object_id(&a).unwrap();
        let id_b = store.object_id(&b).unwrap();

        assert_ne!(id_a, id_b);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_ids_are_never_reused() {
        let store = ObjectStore::new();
        let first = Player::named("first");
        let first_id = store.object_id(&first).unwrap();
        store.remove_object(&first).unwrap();

        let second_id = store.object_id(&Player::named("second")).unwrap();
        assert!(second_id > first_id);
    }

    #[test]
    fn test_get_binding_unbound_name() {
        let store = ObjectStore::new();
        let err = store.get_binding::<Player>("unbound").unwrap_err();
        assert_eq!(err, StoreError::NotBound("unbound".to_string()));
    }

    #[test]
    fn test_get_binding_bound_name() {
        let store = ObjectStore::new();
        let player = Player::named("ada");
        store.set_binding("bound", &player).unwrap();

        assert!(store.get_binding::<Player>("bound").unwrap().ptr_eq(&player));
        assert!(store.get_binding_for_update::<Player>("bound").unwrap().ptr_eq(&player));
    }

    #[test]
    fn test_get_binding_wrong_type() {
        let store = ObjectStore::new();
        store.set_binding("weapon", &Managed::new(Sword)).unwrap();

        let err = store.get_binding::<Player>("weapon").unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument(_)));
        assert!(store.get_binding_any("weapon").unwrap().is::<Sword>());
    }

    #[test]
    fn test_get_binding_missing_object() {
        let store = ObjectStore::new();
        let player = Player::named("ada");
        store.set_binding("bound", &player).unwrap();
        store.remove_object(&player).unwrap();

        let err = store.get_binding::<Player>("bound").unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn test_set_binding_repoints_name() {
        let store = ObjectStore::new();
        let a = Player::named("a");
        let b = Player::named("b");

        store.set_binding("slot", &a).unwrap();
        store.set_binding("slot", &b).unwrap();

        assert!(store.get_binding::<Player>("slot").unwrap().ptr_eq(&b));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_mark_for_update() {
        let store = ObjectStore::new();
        let tracked = Player::named("tracked");
        store.create_reference(&tracked).unwrap();

        store.mark_for_update(&tracked).unwrap();
        store.mark_for_update(&Player::named("never added")).unwrap();
        assert_eq!(store.len(), 1);

        store.remove_object(&tracked).unwrap();
        assert!(matches!(store.mark_for_update(&tracked), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_removal_is_terminal() {
        let store = ObjectStore::new();
        let player = Player::named("gone");
        store.create_reference(&player).unwrap();
        store.remove_object(&player).unwrap();

        assert!(store.is_removed(&player));
        assert!(!store.contains(&player));
        assert!(matches!(store.create_reference(&player), Err(StoreError::NotFound(_))));
        assert!(matches!(store.set_binding("name", &player), Err(StoreError::NotFound(_))));
        assert!(matches!(store.object_id(&player), Err(StoreError::NotFound(_))));
        assert!(matches!(store.remove_object(&player), Err(StoreError::NotFound(_))));
    }

    #[test]
    fn test_remove_object_never_added_is_noop() {
        let store = ObjectStore::new();
        let stranger = Managed::new(Tracked);
        let before = REMOVALS.with(Cell::get);

        store.remove_object(&stranger).unwrap();

        assert_eq!(REMOVALS.with(Cell::get), before);
        assert!(!store.is_removed(&stranger));
        assert_eq!(store.removed_count(), 0);
        store.create_reference(&stranger).unwrap();
    }

    #[test]
    fn test_remove_object_runs_removal_hook() {
        let store = ObjectStore::new();
        let object = Managed::new(Tracked);
        store.create_reference(&object).unwrap();
        let before = REMOVALS.with(Cell::get);

        store.remove_object(&object).unwrap();

        assert_eq!(REMOVALS.with(Cell::get), before + 1);
        assert_eq!(store.removed_count(), 1);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_borrowed_object_fails() {
        let store = ObjectStore::new();
        let player = Player::named("busy");
        store.create_reference(&player).unwrap();

        let guard = player.borrow();
        assert!(matches!(store.remove_object(&player), Err(StoreError::InvalidArgument(_))));
        drop(guard);

        assert!(store.contains(&player));
        store.remove_object(&player).unwrap();
    }

    #[test]
    fn test_remove_binding() {
        let store = ObjectStore::new();
        let player = Player::named("ada");
        store.set_binding("name", &player).unwrap();

        store.remove_binding("name").unwrap();

        assert_eq!(
            store.get_binding::<Player>("name").unwrap_err(),
            StoreError::NotBound("name".to_string())
        );
        assert!(store.contains(&player));
        assert_eq!(
            store.remove_binding("name").unwrap_err(),
            StoreError::NotBound("name".to_string())
        );
    }

    #[test]
    fn test_next_bound_name_walk() {
        let store = ObjectStore::new();
        for name in ["name3", "name1", "name2"] {
            store.set_binding(name, &Player::named(name)).unwrap();
        }

        let n1 = store.next_bound_name(None);
        let n2 = store.next_bound_name(n1.as_deref());
        let n3 = store.next_bound_name(n2.as_deref());
        let n4 = store.next_bound_name(n3.as_deref());

        assert_eq!(n1.as_deref(), Some("name1"));
        assert_eq!(n2.as_deref(), Some("name2"));
        assert_eq!(n3.as_deref(), Some("name3"));
        assert_eq!(n4, None);
    }

    #[test]
    fn test_next_bound_name_middle() {
        let store = ObjectStore::new();
        for name in ["name1", "name5", "name9"] {
            store.set_binding(name, &Player::named(name)).unwrap();
        }

        assert_eq!(store.next_bound_name(Some("name3")).as_deref(), Some("name5"));
        assert_eq!(store.next_bound_name(Some("name9")), None);
    }

    #[test]
    fn test_bound_objects_is_a_snapshot() {
        let store = ObjectStore::new();
        let a = Player::named("a");
        let b = Player::named("b");
        store.set_binding("a", &a).unwrap();
        store.set_binding("b", &b).unwrap();
        store.remove_object(&b).unwrap();

        let snapshot = store.bound_objects();
        store.remove_binding("a").unwrap();

        assert_eq!(snapshot.len(), 2);
        assert!(snapshot["a"].as_ref().is_some_and(|o| o.ptr_eq(&a.to_any())));
        assert!(snapshot["b"].is_none());
    }

    #[test]
    fn test_object_with_id() {
        let store = ObjectStore::new();
        let player = Player::named("ada");
        let id = store.object_id(&player).unwrap();

        assert!(store.object_with_id::<Player>(id).unwrap().ptr_eq(&player));
        assert!(matches!(
            store.object_with_id::<Player>(ObjectId::new(99)),
            Err(StoreError::NotFound(_))
        ));
        assert!(matches!(store.object_with_id::<Sword>(id), Err(StoreError::InvalidArgument(_))));
    }

    #[test]
    fn test_all_objects_in_id_order() {
        let store = ObjectStore::new();
        let a = Player::named("a");
        let sword = Managed::new(Sword);
        store.object_id(&a).unwrap();
        store.object_id(&sword).unwrap();

        let all = store.all_objects();
        assert_eq!(all.len(), 2);
        assert!(all[0].is::<Player>());
        assert!(all[1].is::<Sword>());
    }

    #[test]
    fn test_validation_replaces_instances_and_deactivates_references() {
        let store = ObjectStore::new();
        let player = Player::named("ada");
        player.borrow_mut().score = 40;
        let reference = store.create_reference(&player).unwrap();
        store.set_binding("ada", &player).unwrap();

        store.validate_transaction_boundary().unwrap();

        assert_eq!(reference.resolve(&store).unwrap_err(), StoreError::InactiveContext);
        assert!(!store.contains(&player));

        let fresh = store.get_binding::<Player>("ada").unwrap();
        assert!(!fresh.ptr_eq(&player));
        assert_eq!(*fresh.borrow(), *player.borrow());
        assert_eq!(store.object_id(&fresh).unwrap(), reference.id());

        let again = store.create_reference(&fresh).unwrap();
        assert_eq!(again, reference);
        assert!(again.resolve(&store).unwrap().ptr_eq(&fresh));
    }

    #[test]
    fn test_validation_clears_issued_references() {
        let store = ObjectStore::new();
        let player = Player::named("ada");
        store.create_reference(&player).unwrap();
        store.create_reference(&player).unwrap();
        assert_eq!(store.snapshot().outstanding_references, 2);

        store.validate_transaction_boundary().unwrap();
        assert_eq!(store.snapshot().outstanding_references, 0);
    }

    #[test]
    fn test_object_id_admits_without_issuing_references() {
        let store = ObjectStore::new();
        let player = Player::named("grace");

        let id = store.object_id(&player).unwrap();
        assert_eq!(store.object_id(&player).unwrap(), id);
        assert!(store.contains(&player));
        assert_eq!(store.snapshot().outstanding_references, 0);

        store.create_reference(&player).unwrap();
        assert_eq!(store.snapshot().outstanding_references, 1);
    }

    #[test]
    fn test_snapshot_reports_bookkeeping() {
        let store = ObjectStore::new();
        let a = Player::named("a");
        let b = Player::named("b");
        store.set_binding("a", &a).unwrap();
        store.object_id(&b).unwrap();
        store.remove_object(&a).unwrap();

        let snapshot = store.snapshot();
        assert_eq!(snapshot.tracked, vec![ObjectId::new(1)]);
        assert_eq!(snapshot.indexed, snapshot.tracked);
        assert_eq!(snapshot.removed, vec![ObjectId::new(0)]);
        assert_eq!(snapshot.bindings.get("a"), Some(&ObjectId::new(0)));
        assert_eq!(snapshot.next_id, ObjectId::new(2));
    }
}
