//! In-process simulation of a transactional object-graph server.
//!
//! Application logic written against a managed-object store and a task
//! scheduler can be unit-tested here without a live backend. Everything is
//! single-threaded and synchronous: side effects are observable and
//! repeatable, and nothing happens unless the test drives it.
//!
//! # Components
//!
//! - [`ObjectStore`]: identity-tracked managed objects, name bindings, removal
//!   and the round-trip validation pass that stands in for a commit.
//! - [`Reference`]: identity-only handle resolved through the live store and
//!   invalidated by each validation pass.
//! - [`Scheduler`]: priority queue of one-shot and periodic tasks driven by an
//!   explicit virtual clock, with retry/drop handling on failure.
//! - [`ChannelRegistry`]: minimal named channels with session membership.
//! - [`Context`]: the explicit bundle of all of the above that tasks receive.
//!
//! # Example
//!
//! ```
//! use mockstar_core::{Context, Managed, ManagedObject};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, PartialEq, Serialize, Deserialize)]
//! struct Counter {
//!     hits: u32,
//! }
//!
//! impl ManagedObject for Counter {}
//!
//! let ctx = Context::new();
//! let counter = Managed::new(Counter { hits: 0 });
//! let reference = ctx.store().create_reference(&counter).unwrap();
//!
//! ctx.run_with(|ctx| {
//!     reference.resolve(ctx.store())?.borrow_mut().hits += 1;
//!     Ok(())
//! })
//! .unwrap();
//!
//! // The validation pass replaced the instance with a fresh copy.
//! let fresh = ctx.store().object_with_id::<Counter>(reference.id()).unwrap();
//! assert_eq!(fresh.borrow().hits, 1);
//! assert!(!fresh.ptr_eq(&counter));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod channel;
mod codec;
pub mod context;
pub mod error;
pub mod scheduler;
pub mod store;

pub use channel::{Channel, ChannelRegistry, Delivery, SentMessage, SessionId};
pub use context::Context;
pub use error::{ChannelError, RunError, SchedulerError, StoreError};
pub use scheduler::{
    Execution, FailureRecord, Outcome, PeriodicTaskHandle, Scheduler, SchedulerConfig, Task,
    TaskFailure, TaskHandle,
};
pub use store::{AnyManaged, Managed, ManagedObject, ObjectId, ObjectStore, Reference, StoreSnapshot};
