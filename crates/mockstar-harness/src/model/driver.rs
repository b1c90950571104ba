//! Real-store side of model-based testing.
//!
//! Mirrors [`super::ModelStore`]'s interface on top of a real
//! [`ObjectStore`], holding real `Managed` handles and `Reference`s.

use mockstar_core::{Managed, ManagedObject, ObjectId, ObjectStore, Reference, StoreError};
use serde::{Deserialize, Serialize};

use super::{
    operation::{HandleIndex, Operation, OperationError, OperationResult},
    store::ObservableState,
};

/// Managed object used by model-based tests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Current value.
    pub value: u32,
}

impl ManagedObject for Counter {}

/// Drives a real [`ObjectStore`] with [`Operation`]s.
#[derive(Debug, Default)]
pub struct StoreDriver {
    store: ObjectStore,
    handles: Vec<Managed<Counter>>,
    references: Vec<Reference<Counter>>,
}

impl StoreDriver {
    /// Driver over a fresh store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Driver over an existing store, e.g. one owned by a `Context`.
    pub fn with_store(store: ObjectStore) -> Self {
        Self { store, handles: Vec::new(), references: Vec::new() }
    }

    /// The underlying store.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// Apply an operation to the real store.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Create { value } => {
                self.handles.push(Managed::new(Counter { value: u32::from(*value) }));
                OperationResult::Ok
            },
            Operation::Increment { handle } => match self.handle(*handle) {
                Some(object) => {
                    let mut counter = object.borrow_mut();
                    counter.value = counter.value.wrapping_add(1);
                    OperationResult::Ok
                },
                None => OperationResult::Error(OperationError::NoHandle),
            },
            Operation::ObjectId { handle } => self.with_handle(*handle, |store, object| {
                store.object_id(object).map_or_else(Into::into, |id| OperationResult::Id(id.get()))
            }),
            Operation::CreateReference { handle } => {
                let Some(object) = self.handle(*handle) else {
                    return OperationResult::Error(OperationError::NoHandle);
                };
                match self.store.create_reference(&object) {
                    Ok(reference) => {
                        let id = reference.id().get();
                        self.references.push(reference);
                        OperationResult::Id(id)
                    },
                    Err(err) => err.into(),
                }
            },
            Operation::ResolveReference { reference } => {
                if self.references.is_empty() {
                    return OperationResult::Error(OperationError::NoReference);
                }
                let reference = &self.references[usize::from(*reference) % self.references.len()];
                let id = reference.id();
                let resolved = reference.resolve(&self.store).map(|object| (id, object));
                self.push_resolved(resolved)
            },
            Operation::SetBinding { name, handle } => self.with_handle(*handle, |store, object| {
                store.set_binding(&name.name(), object).map_or_else(Into::into, |()| OperationResult::Ok)
            }),
            Operation::GetBinding { name } => {
                let resolved = self.store.get_binding::<Counter>(&name.name()).and_then(|object| {
                    let id = self.store.object_id(&object)?;
                    Ok((id, object))
                });
                self.push_resolved(resolved)
            },
            Operation::RemoveBinding { name } => {
                self.store.remove_binding(&name.name()).map_or_else(Into::into, |()| OperationResult::Ok)
            },
            Operation::MarkForUpdate { handle } => self.with_handle(*handle, |store, object| {
                store.mark_for_update(object).map_or_else(Into::into, |()| OperationResult::Ok)
            }),
            Operation::RemoveObject { handle } => self.with_handle(*handle, |store, object| {
                store.remove_object(object).map_or_else(Into::into, |()| OperationResult::Ok)
            }),
            Operation::Validate => self
                .store
                .validate_transaction_boundary()
                .map_or_else(Into::into, |()| OperationResult::Ok),
        }
    }

    /// Extract observable state for comparison with the model.
    pub fn observable_state(&self) -> ObservableState {
        let snapshot = self.store.snapshot();
        let tracked = snapshot
            .tracked
            .iter()
            .filter_map(|id| {
                let object = self.store.object_with_id::<Counter>(*id).ok()?;
                let value = object.borrow().value;
                Some((id.get(), value))
            })
            .collect();

        ObservableState {
            tracked,
            bindings: snapshot.bindings.iter().map(|(name, id)| (name.clone(), id.get())).collect(),
            removed_count: self.store.removed_count(),
            active_references: self.references.iter().filter(|r| r.is_active()).count(),
            handles: self.handles.len(),
        }
    }

    fn handle(&self, index: HandleIndex) -> Option<Managed<Counter>> {
        if self.handles.is_empty() {
            return None;
        }
        Some(self.handles[usize::from(index) % self.handles.len()].clone())
    }

    fn with_handle(
        &self,
        index: HandleIndex,
        f: impl FnOnce(&ObjectStore, &Managed<Counter>) -> OperationResult,
    ) -> OperationResult {
        match self.handle(index) {
            Some(object) => f(&self.store, &object),
            None => OperationResult::Error(OperationError::NoHandle),
        }
    }

    fn push_resolved(
        &mut self,
        resolved: Result<(ObjectId, Managed<Counter>), StoreError>,
    ) -> OperationResult {
        match resolved {
            Ok((id, object)) => {
                self.handles.push(object);
                OperationResult::Id(id.get())
            },
            Err(err) => err.into(),
        }
    }
}
