//! Deterministic test harness for mockstar.
//!
//! [`Harness`] drives a [`mockstar_core::Context`] the way a server would:
//! every task run and every scheduled execution is a transaction followed by
//! the store's validation pass.
//!
//! # Model-Based Testing
//!
//! The `model` module provides a reference implementation of the object store.
//! Operations are applied to both the model and the real store, and their
//! observable states are compared.
//!
//! # Invariant Testing
//!
//! The `invariants` module checks properties that must hold after every step.
//! Use [`InvariantRegistry::standard()`] for the store and scheduler
//! invariants.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod harness;
pub mod invariants;
pub mod logging;
pub mod model;

pub use harness::{Harness, HarnessConfig, HarnessError};
pub use invariants::{
    BindingsReferenceAssignedIds, IdentitiesBelowWatermark, IdentityIndexConsistent, Invariant,
    InvariantKind, InvariantRegistry, InvariantResult, PendingTasksOrdered, RemovedObjectsEvicted,
    SystemSnapshot, Violation,
};
pub use model::{
    Counter, Divergence, HandleIndex, ModelStore, NameKey, ObservableState, Operation,
    OperationError, OperationResult, ReferenceIndex, StoreDriver, generate_operations, replay,
};
