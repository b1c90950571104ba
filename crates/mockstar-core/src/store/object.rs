//! Managed objects, their identities, and the handles that carry instance
//! identity.
//!
//! The store distinguishes instances by allocation, not by value: two
//! [`Managed`] handles created from equal values are two different objects.
//! Clones of one handle are the same object.

use std::{
    cell::{BorrowError, BorrowMutError, Ref, RefCell, RefMut},
    fmt,
    rc::Rc,
};

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use super::slot::{ObjectKey, Slot};

/// Identity assigned to a managed object on first admission to a store.
///
/// Identities increase strictly and are never reused by the same store, even
/// after the object is removed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Wrap a raw identity value.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identity value.
    pub const fn get(self) -> u64 {
        self.0
    }

    /// The identity assigned after this one.
    pub(crate) fn successor(self) -> Self {
        debug_assert!(self.0 < u64::MAX);
        Self(self.0 + 1)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Application state that can live in an [`crate::ObjectStore`].
///
/// Implementors must round-trip through serde: the validation pass replaces
/// every tracked instance with `deserialize(serialize(instance))`. Fields that
/// cannot be serialized surface as [`crate::StoreError::Serialization`] at the
/// next validation pass.
pub trait ManagedObject: Serialize + DeserializeOwned + 'static {
    /// Called by [`crate::ObjectStore::remove_object`] before the object is
    /// evicted. No store borrow is held, so the hook may remove dependents.
    fn removing_object(&mut self) {}
}

/// Shared handle to one managed object instance.
///
/// Identity is the allocation: [`Managed::ptr_eq`] is the only equality the
/// store uses.
pub struct Managed<T> {
    cell: Rc<RefCell<T>>,
}

impl<T: ManagedObject> Managed<T> {
    /// Wrap a value in a new, not yet admitted instance.
    pub fn new(value: T) -> Self {
        Self { cell: Rc::new(RefCell::new(value)) }
    }

    pub(crate) fn from_cell(cell: Rc<RefCell<T>>) -> Self {
        Self { cell }
    }

    /// Immutably borrow the instance.
    ///
    /// # Panics
    ///
    /// Panics if the instance is currently mutably borrowed.
    pub fn borrow(&self) -> Ref<'_, T> {
        self.cell.borrow()
    }

    /// Mutably borrow the instance.
    ///
    /// # Panics
    ///
    /// Panics if the instance is currently borrowed.
    pub fn borrow_mut(&self) -> RefMut<'_, T> {
        self.cell.borrow_mut()
    }

    /// Immutably borrow the instance, failing if it is mutably borrowed.
    pub fn try_borrow(&self) -> Result<Ref<'_, T>, BorrowError> {
        self.cell.try_borrow()
    }

    /// Mutably borrow the instance, failing if it is borrowed.
    pub fn try_borrow_mut(&self) -> Result<RefMut<'_, T>, BorrowMutError> {
        self.cell.try_borrow_mut()
    }

    /// True if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.cell, &other.cell)
    }

    /// Type-erased handle to the same instance.
    pub fn to_any(&self) -> AnyManaged {
        AnyManaged::new(self.slot())
    }

    pub(crate) fn key(&self) -> ObjectKey {
        ObjectKey::of(&self.cell)
    }

    pub(crate) fn slot(&self) -> Rc<dyn Slot> {
        Rc::clone(&self.cell) as Rc<dyn Slot>
    }
}

impl<T> Clone for Managed<T> {
    fn clone(&self) -> Self {
        Self { cell: Rc::clone(&self.cell) }
    }
}

impl<T: fmt::Debug> fmt::Debug for Managed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cell.try_borrow() {
            Ok(value) => f.debug_tuple("Managed").field(&*value).finish(),
            Err(_) => f.debug_tuple("Managed").field(&"<borrowed>").finish(),
        }
    }
}

/// Type-erased handle to a managed object instance.
///
/// Returned by diagnostic accessors that span objects of different types.
#[derive(Clone)]
pub struct AnyManaged {
    slot: Rc<dyn Slot>,
}

impl AnyManaged {
    pub(crate) fn new(slot: Rc<dyn Slot>) -> Self {
        Self { slot }
    }

    /// Rust type name of the instance.
    pub fn type_name(&self) -> &'static str {
        self.slot.type_name()
    }

    /// True if the instance is a `T`.
    pub fn is<T: ManagedObject>(&self) -> bool {
        self.downcast::<T>().is_some()
    }

    /// Typed handle to the same instance, or `None` if it is not a `T`.
    pub fn downcast<T: ManagedObject>(&self) -> Option<Managed<T>> {
        Rc::clone(&self.slot).into_any().downcast::<RefCell<T>>().ok().map(Managed::from_cell)
    }

    /// True if both handles point at the same instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        ObjectKey::of(&self.slot) == ObjectKey::of(&other.slot)
    }
}

impl fmt::Debug for AnyManaged {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnyManaged").field("type_name", &self.type_name()).finish_non_exhaustive()
    }
}
