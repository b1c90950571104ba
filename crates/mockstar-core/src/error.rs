//! Error types for the simulated store, scheduler and channel registry.
//!
//! Every argument or state violation is surfaced synchronously to the caller
//! of the violating operation. Task failures are a separate concern: see
//! [`crate::TaskFailure`].

use std::io;

use thiserror::Error;

use crate::{scheduler::TaskFailure, store::ObjectId};

/// Errors raised by [`crate::ObjectStore`] and [`crate::Reference`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Input violated a precondition (ill-typed lookup, borrowed instance).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No binding exists for the given name.
    #[error("no binding for {0:?} in the data store")]
    NotBound(String),

    /// The identity or instance has no live backing object, including objects
    /// that were previously removed.
    #[error("object not found: {0}")]
    NotFound(String),

    /// Resolution through a reference deactivated by a validation pass.
    #[error("transaction not active")]
    InactiveContext,

    /// The validation pass could not serialize or reconstruct an object.
    #[error("object {id} ({type_name}) failed to round-trip: {reason}")]
    Serialization {
        /// Identity of the offending object
        id: ObjectId,
        /// Rust type name of the offending object
        type_name: &'static str,
        /// Codec failure description
        reason: String,
    },
}

/// Convert `StoreError` to `io::Error` at I/O-flavoured boundaries.
///
/// A failed round trip is a structural defect in the object graph, so it maps
/// to `InvalidData`.
impl From<StoreError> for io::Error {
    fn from(err: StoreError) -> Self {
        let kind = match &err {
            StoreError::Serialization { .. } => io::ErrorKind::InvalidData,
            StoreError::InvalidArgument(_) => io::ErrorKind::InvalidInput,
            StoreError::NotBound(_) | StoreError::NotFound(_) => io::ErrorKind::NotFound,
            StoreError::InactiveContext => io::ErrorKind::Other,
        };
        Self::new(kind, err.to_string())
    }
}

/// Errors raised when scheduling tasks.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchedulerError {
    /// Negative delay or period, or a task that is not serializable.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A managed task could not be admitted to the store.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors raised by [`crate::ChannelRegistry`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// A channel with this name already exists.
    #[error("channel already exists: {0}")]
    NameExists(String),

    /// No channel with this name exists.
    #[error("no channel named {0:?}")]
    NotBound(String),
}

/// Errors from [`crate::Context::run`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RunError {
    /// The task itself failed; the store was not validated.
    #[error("task failed: {0}")]
    Task(TaskFailure),

    /// The task completed but the store failed validation.
    #[error("validation failed: {0}")]
    Store(#[from] StoreError),
}
