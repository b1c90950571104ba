//! Reference model of the object store.
//!
//! Plain vectors and maps with no sharing, no serialization and no interior
//! mutability. It is the oracle the real store is checked against.

use std::collections::BTreeMap;

use super::operation::{HandleIndex, NameKey, Operation, OperationError, OperationResult};

/// Observable state for oracle comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Tracked objects as (id, counter value), ascending by id.
    pub tracked: Vec<(u64, u32)>,
    /// Name bindings, ascending by name.
    pub bindings: Vec<(String, u64)>,
    /// Objects removed so far.
    pub removed_count: usize,
    /// References issued and still active.
    pub active_references: usize,
    /// Size of the handle pool.
    pub handles: usize,
}

/// One model instance. Several handles may share one.
#[derive(Debug, Clone)]
struct ModelInstance {
    /// Identity while tracked
    id: Option<u64>,
    removed: bool,
    value: u32,
}

/// Model store - the reference implementation.
#[derive(Debug, Clone, Default)]
pub struct ModelStore {
    instances: Vec<ModelInstance>,
    /// Handle pool; each entry indexes `instances`
    handles: Vec<usize>,
    /// Tracked id → instance
    tracked: BTreeMap<u64, usize>,
    bindings: BTreeMap<String, u64>,
    /// Issued references as (id, active)
    references: Vec<(u64, bool)>,
    next_id: u64,
    removed_count: usize,
}

impl ModelStore {
    /// Create an empty model.
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply an operation and return the result.
    ///
    /// The result should match the real store's result.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Create { value } => {
                self.instances.push(ModelInstance {
                    id: None,
                    removed: false,
                    value: u32::from(*value),
                });
                self.handles.push(self.instances.len() - 1);
                OperationResult::Ok
            },
            Operation::Increment { handle } => match self.instance_of(*handle) {
                Some(index) => {
                    let value = &mut self.instances[index].value;
                    *value = value.wrapping_add(1);
                    OperationResult::Ok
                },
                None => OperationResult::Error(OperationError::NoHandle),
            },
            Operation::ObjectId { handle } => self.with_admitted(*handle, |_, id| OperationResult::Id(id)),
            Operation::CreateReference { handle } => self.with_admitted(*handle, |model, id| {
                model.references.push((id, true));
                OperationResult::Id(id)
            }),
            Operation::ResolveReference { reference } => self.apply_resolve(*reference),
            Operation::SetBinding { name, handle } => self.with_admitted(*handle, |model, id| {
                model.bindings.insert(name.name(), id);
                OperationResult::Ok
            }),
            Operation::GetBinding { name } => self.apply_get_binding(*name),
            Operation::RemoveBinding { name } => match self.bindings.remove(&name.name()) {
                Some(_) => OperationResult::Ok,
                None => OperationResult::Error(OperationError::NotBound),
            },
            Operation::MarkForUpdate { handle } => match self.instance_of(*handle) {
                Some(index) if self.instances[index].removed => {
                    OperationResult::Error(OperationError::NotFound)
                },
                Some(_) => OperationResult::Ok,
                None => OperationResult::Error(OperationError::NoHandle),
            },
            Operation::RemoveObject { handle } => self.apply_remove_object(*handle),
            Operation::Validate => {
                self.apply_validate();
                OperationResult::Ok
            },
        }
    }

    /// Extract observable state for comparison.
    pub fn observable_state(&self) -> ObservableState {
        ObservableState {
            tracked: self
                .tracked
                .iter()
                .map(|(id, index)| (*id, self.instances[*index].value))
                .collect(),
            bindings: self.bindings.iter().map(|(name, id)| (name.clone(), *id)).collect(),
            removed_count: self.removed_count,
            active_references: self.references.iter().filter(|(_, active)| *active).count(),
            handles: self.handles.len(),
        }
    }

    fn instance_of(&self, handle: HandleIndex) -> Option<usize> {
        if self.handles.is_empty() {
            return None;
        }
        Some(self.handles[usize::from(handle) % self.handles.len()])
    }

    /// Admit the handle's instance if needed, then continue with its id.
    fn with_admitted(
        &mut self,
        handle: HandleIndex,
        then: impl FnOnce(&mut Self, u64) -> OperationResult,
    ) -> OperationResult {
        let Some(index) = self.instance_of(handle) else {
            return OperationResult::Error(OperationError::NoHandle);
        };
        let instance = &mut self.instances[index];
        if instance.removed {
            return OperationResult::Error(OperationError::NotFound);
        }

        let id = match instance.id {
            Some(id) => id,
            None => {
                let id = self.next_id;
                self.next_id += 1;
                instance.id = Some(id);
                self.tracked.insert(id, index);
                id
            },
        };
        then(self, id)
    }

    fn apply_resolve(&mut self, reference: u8) -> OperationResult {
        if self.references.is_empty() {
            return OperationResult::Error(OperationError::NoReference);
        }
        let (id, active) = self.references[usize::from(reference) % self.references.len()];
        if !active {
            return OperationResult::Error(OperationError::InactiveContext);
        }
        self.push_tracked(id)
    }

    fn apply_get_binding(&mut self, name: NameKey) -> OperationResult {
        match self.bindings.get(&name.name()) {
            Some(id) => self.push_tracked(*id),
            None => OperationResult::Error(OperationError::NotBound),
        }
    }

    /// Add the tracked instance with `id` to the pool.
    fn push_tracked(&mut self, id: u64) -> OperationResult {
        match self.tracked.get(&id) {
            Some(index) => {
                self.handles.push(*index);
                OperationResult::Id(id)
            },
            None => OperationResult::Error(OperationError::NotFound),
        }
    }

    fn apply_remove_object(&mut self, handle: HandleIndex) -> OperationResult {
        let Some(index) = self.instance_of(handle) else {
            return OperationResult::Error(OperationError::NoHandle);
        };
        let instance = &mut self.instances[index];
        if instance.removed {
            return OperationResult::Error(OperationError::NotFound);
        }
        if let Some(id) = instance.id.take() {
            instance.removed = true;
            self.tracked.remove(&id);
            self.removed_count += 1;
        }
        OperationResult::Ok
    }

    /// Deactivate every reference and give each tracked object a fresh
    /// instance; old handles keep the old, now untracked, instances.
    fn apply_validate(&mut self) {
        for reference in &mut self.references {
            reference.1 = false;
        }

        let tracked = std::mem::take(&mut self.tracked);
        for (id, old) in tracked {
            let value = self.instances[old].value;
            self.instances[old].id = None;
            self.instances.push(ModelInstance { id: Some(id), removed: false, value });
            self.tracked.insert(id, self.instances.len() - 1);
        }
    }
}
