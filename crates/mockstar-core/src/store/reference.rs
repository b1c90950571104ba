//! Identity-only references to managed objects.
//!
//! A [`Reference`] never owns or caches its target. It is a lookup key plus a
//! liveness flag, resolved through whichever [`ObjectStore`] the caller passes
//! in.

use std::{
    cell::Cell,
    fmt,
    hash::{Hash, Hasher},
    marker::PhantomData,
    rc::Rc,
};

use serde::{Deserialize, Serialize};

use super::{Managed, ManagedObject, ObjectId, ObjectStore};
use crate::error::StoreError;

/// Liveness flag shared between a reference, its clones, and the store that
/// issued it.
#[derive(Debug, Clone)]
pub(crate) struct Liveness(Rc<Cell<bool>>);

impl Liveness {
    pub(crate) fn active() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub(crate) fn deactivate(&self) {
        self.0.set(false);
    }

    pub(crate) fn is_active(&self) -> bool {
        self.0.get()
    }
}

impl Default for Liveness {
    fn default() -> Self {
        Self::active()
    }
}

/// Reference to a managed object by identity.
///
/// # Invariants
///
/// - A deactivated reference fails resolution with
///   [`StoreError::InactiveContext`] whether or not its target still exists.
/// - A reference read back from its serialized form is always active; only
///   the identity is serialized.
/// - Equality and hashing use the identity alone.
#[derive(Serialize, Deserialize)]
#[serde(bound = "")]
pub struct Reference<T> {
    id: ObjectId,
    #[serde(skip)]
    liveness: Liveness,
    #[serde(skip)]
    marker: PhantomData<fn() -> T>,
}

impl<T> Reference<T> {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self { id, liveness: Liveness::active(), marker: PhantomData }
    }

    pub(crate) fn liveness(&self) -> &Liveness {
        &self.liveness
    }

    /// Identity of the target object.
    pub fn id(&self) -> ObjectId {
        self.id
    }

    /// False once a validation pass has deactivated this reference.
    pub fn is_active(&self) -> bool {
        self.liveness.is_active()
    }
}

impl<T: ManagedObject> Reference<T> {
    /// Resolve to the current instance in `store`.
    pub fn resolve(&self, store: &ObjectStore) -> Result<Managed<T>, StoreError> {
        if !self.is_active() {
            return Err(StoreError::InactiveContext);
        }
        store.object_with_id(self.id)
    }

    /// Same as [`Reference::resolve`]; update intent is not tracked.
    pub fn get_for_update(&self, store: &ObjectStore) -> Result<Managed<T>, StoreError> {
        self.resolve(store)
    }
}

impl<T> Clone for Reference<T> {
    fn clone(&self) -> Self {
        Self { id: self.id, liveness: self.liveness.clone(), marker: PhantomData }
    }
}

impl<T> PartialEq for Reference<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Reference<T> {}

impl<T> Hash for Reference<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for Reference<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reference")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::codec;

    #[derive(Debug, Serialize, Deserialize)]
    struct Lamp;

    impl ManagedObject for Lamp {}

    #[test]
    fn equality_ignores_liveness() {
        let a: Reference<Lamp> = Reference::new(ObjectId::new(3));
        let b: Reference<Lamp> = Reference::new(ObjectId::new(3));
        a.liveness().deactivate();

        assert_eq!(a, b);
        assert_ne!(a, Reference::new(ObjectId::new(4)));

        let set: HashSet<_> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn clones_share_liveness() {
        let a: Reference<Lamp> = Reference::new(ObjectId::new(0));
        let b = a.clone();

        a.liveness().deactivate();
        assert!(!b.is_active());
    }

    #[test]
    fn deserialized_reference_is_active() {
        let original: Reference<Lamp> = Reference::new(ObjectId::new(9));
        original.liveness().deactivate();

        let bytes = codec::encode(&original).expect("encode failed");
        let restored: Reference<Lamp> = codec::decode(&bytes).expect("decode failed");

        assert!(restored.is_active());
        assert_eq!(restored.id(), ObjectId::new(9));
        assert!(!original.is_active());
    }

    #[test]
    fn deactivated_reference_fails_even_if_target_exists() {
        let store = ObjectStore::new();
        let lamp = Managed::new(Lamp);
        let reference = store.create_reference(&lamp).expect("create failed");

        reference.liveness().deactivate();

        assert_eq!(reference.resolve(&store).unwrap_err(), StoreError::InactiveContext);
        assert_eq!(reference.get_for_update(&store).unwrap_err(), StoreError::InactiveContext);
        assert_eq!(store.len(), 1);
    }
}
