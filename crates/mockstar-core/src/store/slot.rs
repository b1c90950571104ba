//! Type-erased storage slots.
//!
//! The store holds objects of many types side by side. Each instance lives in
//! an `Rc<RefCell<T>>`; the store sees it as `Rc<dyn Slot>` and keys it by the
//! allocation address.

use std::{any::Any, cell::RefCell, rc::Rc};

use super::object::ManagedObject;
use crate::codec::{self, CodecError};

/// Allocation address of a managed instance.
///
/// Only meaningful while the store holds a strong reference to the instance,
/// which it does for every tracked and every removed instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ObjectKey(usize);

impl ObjectKey {
    pub(crate) fn of<S: ?Sized>(rc: &Rc<S>) -> Self {
        Self(Rc::as_ptr(rc).cast::<()>().addr())
    }
}

/// Object-safe view of a managed instance.
pub(crate) trait Slot {
    /// Rust type name of the stored value.
    fn type_name(&self) -> &'static str;

    /// Serialize the value and read it back into a fresh, unshared instance.
    fn round_trip(&self) -> Result<Rc<dyn Slot>, CodecError>;

    /// Upcast for typed downcasting.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

impl<T: ManagedObject> Slot for RefCell<T> {
    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn round_trip(&self) -> Result<Rc<dyn Slot>, CodecError> {
        let bytes = {
            let value = self.try_borrow().map_err(|_| CodecError::Borrowed)?;
            codec::encode(&*value)?
        };
        let copy: T = codec::decode(&bytes)?;
        Ok(Rc::new(RefCell::new(copy)))
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
