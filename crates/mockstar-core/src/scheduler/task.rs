//! Units of scheduled work and their failure classification.

use std::{any::type_name, marker::PhantomData};

use serde::Serialize;
use thiserror::Error;

use crate::{
    context::Context,
    error::{ChannelError, SchedulerError, StoreError},
    store::{ManagedObject, ObjectId},
};

/// A unit of work executed by the [`crate::Scheduler`].
///
/// Tasks must be serializable; the scheduler probes this when the task is
/// scheduled. A task receives the [`Context`] it runs in and reaches the store
/// through it, usually via [`crate::Reference`]s it holds.
pub trait Task: Serialize + 'static {
    /// Run the task once.
    ///
    /// A [`TaskFailure::Retry`] re-enqueues the task at the same tick; any
    /// other failure drops it.
    fn run(&mut self, ctx: &Context) -> Result<(), TaskFailure>;
}

/// Why a task run failed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TaskFailure {
    /// Transient failure; the scheduler runs the task again.
    #[error("retryable: {0}")]
    Retry(String),

    /// The task gave up; it is not run again.
    #[error("aborted: {0}")]
    Abort(String),

    /// The task hit an error it did not classify; it is not run again.
    #[error("failed: {0}")]
    Failed(String),
}

impl TaskFailure {
    /// Retryable failure.
    pub fn retry(reason: impl Into<String>) -> Self {
        Self::Retry(reason.into())
    }

    /// Non-retryable failure.
    pub fn abort(reason: impl Into<String>) -> Self {
        Self::Abort(reason.into())
    }

    /// Whether the scheduler should run the task again.
    pub fn should_retry(&self) -> bool {
        matches!(self, Self::Retry(_))
    }

    /// Human-readable reason.
    pub fn reason(&self) -> &str {
        match self {
            Self::Retry(reason) | Self::Abort(reason) | Self::Failed(reason) => reason,
        }
    }
}

impl From<StoreError> for TaskFailure {
    fn from(err: StoreError) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<SchedulerError> for TaskFailure {
    fn from(err: SchedulerError) -> Self {
        Self::Failed(err.to_string())
    }
}

impl From<ChannelError> for TaskFailure {
    fn from(err: ChannelError) -> Self {
        Self::Failed(err.to_string())
    }
}

/// Object-safe view of a queued task.
pub(crate) trait Runnable {
    fn run(&mut self, ctx: &Context) -> Result<(), TaskFailure>;

    fn task_type(&self) -> &'static str;
}

/// Task owned by the queue entry.
pub(crate) struct OwnedTask<T>(pub(crate) T);

impl<T: Task> Runnable for OwnedTask<T> {
    fn run(&mut self, ctx: &Context) -> Result<(), TaskFailure> {
        self.0.run(ctx)
    }

    fn task_type(&self) -> &'static str {
        type_name::<T>()
    }
}

/// Task that is itself a managed object.
///
/// Held by identity and resolved from the store on every run, so each run sees
/// the instance the latest validation pass produced.
pub(crate) struct ManagedTask<T> {
    id: ObjectId,
    marker: PhantomData<fn() -> T>,
}

impl<T> ManagedTask<T> {
    pub(crate) fn new(id: ObjectId) -> Self {
        Self { id, marker: PhantomData }
    }
}

impl<T: Task + ManagedObject> Runnable for ManagedTask<T> {
    fn run(&mut self, ctx: &Context) -> Result<(), TaskFailure> {
        let task = ctx.store().object_with_id::<T>(self.id)?;
        let mut task = task.try_borrow_mut().map_err(|_| {
            TaskFailure::abort(format!("managed task {} is already borrowed", self.id))
        })?;
        task.run(ctx)
    }

    fn task_type(&self) -> &'static str {
        type_name::<T>()
    }
}
