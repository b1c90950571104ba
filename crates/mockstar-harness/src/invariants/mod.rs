//! Invariant checking for the simulated store and scheduler.
//!
//! Invariants are properties that must hold after every operation, whatever
//! sequence of operations led there. Checks run against a [`SystemSnapshot`]
//! so each one sees a consistent view.
//!
//! # Usage
//!
//! ```
//! use mockstar_core::Context;
//! use mockstar_harness::{InvariantRegistry, SystemSnapshot};
//!
//! let ctx = Context::new();
//! let registry = InvariantRegistry::standard();
//! registry.check_all(&SystemSnapshot::capture(&ctx)).unwrap();
//! ```

mod checks;
mod snapshot;

use std::fmt;

pub use checks::{
    BindingsReferenceAssignedIds, IdentitiesBelowWatermark, IdentityIndexConsistent,
    PendingTasksOrdered, RemovedObjectsEvicted,
};
pub use snapshot::SystemSnapshot;

/// Invariant check result.
pub type InvariantResult = Result<(), Violation>;

/// Which invariant was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InvariantKind {
    /// See [`IdentityIndexConsistent`]
    IdentityIndexConsistent,
    /// See [`RemovedObjectsEvicted`]
    RemovedObjectsEvicted,
    /// See [`IdentitiesBelowWatermark`]
    IdentitiesBelowWatermark,
    /// See [`BindingsReferenceAssignedIds`]
    BindingsReferenceAssignedIds,
    /// See [`PendingTasksOrdered`]
    PendingTasksOrdered,
    /// A check registered outside this crate
    Custom(&'static str),
}

impl fmt::Display for InvariantKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Custom(name) => f.write_str(name),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Invariant violation with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// The violated invariant.
    pub invariant: InvariantKind,
    /// What went wrong.
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.invariant, self.message)
    }
}

impl std::error::Error for Violation {}

/// An invariant that can be checked against a snapshot.
pub trait Invariant {
    /// Which invariant this is, for reporting.
    fn kind(&self) -> InvariantKind;

    /// Check the invariant, returning a [`Violation`] if it does not hold.
    fn check(&self, state: &SystemSnapshot) -> InvariantResult;
}

/// Registry of invariants to check.
#[derive(Default)]
pub struct InvariantRegistry {
    invariants: Vec<Box<dyn Invariant>>,
}

impl InvariantRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every standard invariant:
    ///
    /// - [`IdentityIndexConsistent`]: id and instance maps are inverses
    /// - [`RemovedObjectsEvicted`]: removed objects are never tracked
    /// - [`IdentitiesBelowWatermark`]: every id was handed out already
    /// - [`BindingsReferenceAssignedIds`]: bindings point at assigned ids
    /// - [`PendingTasksOrdered`]: the queue head is the earliest entry
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.add(IdentityIndexConsistent);
        registry.add(RemovedObjectsEvicted);
        registry.add(IdentitiesBelowWatermark);
        registry.add(BindingsReferenceAssignedIds);
        registry.add(PendingTasksOrdered);
        registry
    }

    /// Add an invariant.
    pub fn add<I: Invariant + 'static>(&mut self, invariant: I) {
        self.invariants.push(Box::new(invariant));
    }

    /// Check every invariant, collecting all violations.
    pub fn check_all(&self, state: &SystemSnapshot) -> Result<(), Vec<Violation>> {
        let violations: Vec<_> =
            self.invariants.iter().filter_map(|inv| inv.check(state).err()).collect();

        if violations.is_empty() { Ok(()) } else { Err(violations) }
    }

    /// Number of registered invariants.
    pub fn len(&self) -> usize {
        self.invariants.len()
    }

    /// True if no invariants are registered.
    pub fn is_empty(&self) -> bool {
        self.invariants.is_empty()
    }
}
