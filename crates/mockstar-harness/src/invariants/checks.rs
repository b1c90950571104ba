//! Standard invariant checks.

use std::collections::BTreeSet;

use super::{Invariant, InvariantKind, InvariantResult, SystemSnapshot, Violation};

/// The id → instance and instance → id maps are mutual inverses.
///
/// Every tracked id appears exactly once in the identity index and nothing
/// else does.
pub struct IdentityIndexConsistent;

impl Invariant for IdentityIndexConsistent {
    fn kind(&self) -> InvariantKind {
        InvariantKind::IdentityIndexConsistent
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let store = &state.store;
        if store.tracked != store.indexed {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "tracked ids {:?} differ from indexed ids {:?}",
                    store.tracked, store.indexed
                ),
            });
        }
        Ok(())
    }
}

/// A removed object is never tracked again.
pub struct RemovedObjectsEvicted;

impl Invariant for RemovedObjectsEvicted {
    fn kind(&self) -> InvariantKind {
        InvariantKind::RemovedObjectsEvicted
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let tracked: BTreeSet<_> = state.store.tracked.iter().collect();
        match state.store.removed.iter().find(|id| tracked.contains(id)) {
            Some(id) => Err(Violation {
                invariant: self.kind(),
                message: format!("removed object {id} is still tracked"),
            }),
            None => Ok(()),
        }
    }
}

/// Every tracked or removed id is below the next id to be assigned, and no id
/// is both.
pub struct IdentitiesBelowWatermark;

impl Invariant for IdentitiesBelowWatermark {
    fn kind(&self) -> InvariantKind {
        InvariantKind::IdentitiesBelowWatermark
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let store = &state.store;
        let mut seen = BTreeSet::new();
        for id in store.tracked.iter().chain(&store.removed) {
            if *id >= store.next_id {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("id {id} not below watermark {}", store.next_id),
                });
            }
            if !seen.insert(*id) {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("id {id} assigned twice"),
                });
            }
        }
        Ok(())
    }
}

/// Every binding points at an id that was assigned, live or removed.
pub struct BindingsReferenceAssignedIds;

impl Invariant for BindingsReferenceAssignedIds {
    fn kind(&self) -> InvariantKind {
        InvariantKind::BindingsReferenceAssignedIds
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let store = &state.store;
        for (name, id) in &store.bindings {
            if !store.tracked.contains(id) && !store.removed.contains(id) {
                return Err(Violation {
                    invariant: self.kind(),
                    message: format!("binding {name:?} points at unassigned id {id}"),
                });
            }
        }
        Ok(())
    }
}

/// Queued entries have distinct sequences and the queue head is the earliest
/// entry.
pub struct PendingTasksOrdered;

impl Invariant for PendingTasksOrdered {
    fn kind(&self) -> InvariantKind {
        InvariantKind::PendingTasksOrdered
    }

    fn check(&self, state: &SystemSnapshot) -> InvariantResult {
        let head = state.pending.iter().min().map(mockstar_core::TaskHandle::schedule_time);
        if head != state.next_due_tick {
            return Err(Violation {
                invariant: self.kind(),
                message: format!(
                    "queue head {:?} but earliest pending entry {head:?}",
                    state.next_due_tick
                ),
            });
        }

        let sequences: BTreeSet<_> = state.pending.iter().map(|h| h.sequence()).collect();
        if sequences.len() != state.pending.len() {
            return Err(Violation {
                invariant: self.kind(),
                message: "duplicate insertion sequence in queue".to_string(),
            });
        }
        Ok(())
    }
}
