//! Observable state snapshots for invariant checking.

use mockstar_core::{Context, StoreSnapshot, TaskHandle};

/// Snapshot of a simulated server.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// Store bookkeeping.
    pub store: StoreSnapshot,
    /// Scheduler clock.
    pub virtual_time: i64,
    /// Queued task handles, in execution order.
    pub pending: Vec<TaskHandle>,
    /// Tick of the head of the queue.
    pub next_due_tick: Option<i64>,
}

impl SystemSnapshot {
    /// Capture the current state of `ctx`.
    pub fn capture(ctx: &Context) -> Self {
        let scheduler = ctx.scheduler();
        Self {
            store: ctx.store().snapshot(),
            virtual_time: scheduler.virtual_time(),
            pending: scheduler.pending_handles(),
            next_due_tick: scheduler.next_due_tick(),
        }
    }
}
