//! Virtual-time task scheduler.
//!
//! Tasks sit in a priority queue ordered by scheduled tick and insertion
//! sequence. Nothing runs on its own: tests advance the virtual clock and ask
//! the scheduler to execute whatever is due.
//!
//! # Failure policy
//!
//! - [`TaskFailure::Retry`] re-enqueues the entry at its original tick with a
//!   fresh insertion sequence, behind anything already due at that tick.
//! - Any other failure drops the entry. A panicking task counts as
//!   [`TaskFailure::Failed`] carrying the panic message.
//!
//! Failures are logged, recorded as [`FailureRecord`]s and never re-raised to
//! the caller driving the scheduler.

mod handle;
mod task;

use std::{
    any::{Any, type_name},
    cell::RefCell,
    cmp::Ordering,
    collections::BinaryHeap,
    fmt,
    panic::{self, AssertUnwindSafe},
    rc::Rc,
};

pub use handle::{PeriodicTaskHandle, TaskHandle};
pub(crate) use task::{ManagedTask, OwnedTask, Runnable};
pub use task::{Task, TaskFailure};

use crate::{
    codec,
    context::Context,
    error::SchedulerError,
    store::{Managed, ManagedObject, ObjectStore},
};

/// Scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Virtual time the clock starts at
    pub start_time: i64,
    /// Upper bound on tasks executed by one [`Scheduler::run_until`] call, so
    /// a zero-period task cannot spin forever
    pub max_steps_per_run: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { start_time: 0, max_steps_per_run: 10_000 }
    }
}

/// What happened to an executed entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Ran successfully and will not run again.
    Completed,
    /// Periodic task ran successfully and was re-enqueued.
    Rescheduled {
        /// Tick of the next run
        next_tick: i64,
    },
    /// Failed with a retryable failure and was re-enqueued at the same tick.
    Retrying,
    /// Failed with a non-retryable failure and was dropped.
    Dropped,
    /// Periodic task was cancelled; discarded without running.
    Cancelled,
}

/// Result of one [`Scheduler::execute_due_task`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// The entry that was taken off the queue
    pub handle: TaskHandle,
    /// What happened to it
    pub outcome: Outcome,
}

/// A task failure observed during scheduled execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    /// Virtual time at which the task failed
    pub tick: i64,
    /// Rust type name of the task
    pub task_type: &'static str,
    /// The failure
    pub failure: TaskFailure,
    /// Whether the task was re-enqueued
    pub retried: bool,
}

/// Queue entry.
///
/// Reversed ordering so `BinaryHeap` (a max-heap) pops the earliest entry.
struct Entry {
    handle: TaskHandle,
    task: Box<dyn Runnable>,
}

impl PartialEq for Entry {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for Entry {}

impl PartialOrd for Entry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Entry {
    fn cmp(&self, other: &Self) -> Ordering {
        other.handle.cmp(&self.handle)
    }
}

struct SchedulerInner {
    queue: BinaryHeap<Entry>,
    now: i64,
    next_sequence: u64,
    failures: Vec<FailureRecord>,
    config: SchedulerConfig,
}

impl SchedulerInner {
    fn new(config: SchedulerConfig) -> Self {
        Self {
            queue: BinaryHeap::new(),
            now: config.start_time,
            next_sequence: 0,
            failures: Vec::new(),
            config,
        }
    }

    fn take_sequence(&mut self) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        sequence
    }

    fn is_due(&self) -> bool {
        self.queue.peek().is_some_and(|entry| entry.handle.schedule_time() <= self.now)
    }
}

/// Virtual-time task scheduler.
///
/// Cheap to clone; clones share the same queue and clock. No internal borrow
/// is held while a task runs, so tasks may schedule further tasks.
#[derive(Clone)]
pub struct Scheduler {
    inner: Rc<RefCell<SchedulerInner>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl Scheduler {
    /// Create an empty scheduler with its clock at `config.start_time`.
    pub fn new(config: SchedulerConfig) -> Self {
        Self { inner: Rc::new(RefCell::new(SchedulerInner::new(config))) }
    }

    /// Configuration the scheduler was created with.
    pub fn config(&self) -> SchedulerConfig {
        self.inner.borrow().config
    }

    /// Schedule `task` to run once, `delay` ticks from now.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidArgument`] if `delay` is negative or `task`
    /// fails to serialize.
    pub fn schedule_task<T: Task>(&self, task: T, delay: i64) -> Result<TaskHandle, SchedulerError> {
        check_non_negative("delay", delay)?;
        probe(&task)?;

        let mut inner = self.inner.borrow_mut();
        let tick = inner.now.saturating_add(delay);
        let sequence = inner.take_sequence();
        let handle = TaskHandle::one_shot(tick, delay, sequence, type_name::<T>());
        Ok(enqueue(&mut inner, handle, Box::new(OwnedTask(task))))
    }

    /// Schedule `task` to run once at the current tick.
    pub fn schedule_task_now<T: Task>(&self, task: T) -> Result<TaskHandle, SchedulerError> {
        self.schedule_task(task, 0)
    }

    /// Schedule `task` to run `delay` ticks from now and every `period` ticks
    /// after each run.
    ///
    /// # Errors
    ///
    /// [`SchedulerError::InvalidArgument`] if `delay` or `period` is negative,
    /// or `task` fails to serialize.
    pub fn schedule_periodic_task<T: Task>(
        &self,
        task: T,
        delay: i64,
        period: i64,
    ) -> Result<PeriodicTaskHandle, SchedulerError> {
        check_non_negative("delay", delay)?;
        check_non_negative("period", period)?;
        probe(&task)?;

        let periodic = PeriodicTaskHandle::new(delay, period);
        self.enqueue_periodic(Box::new(OwnedTask(task)), periodic.clone());
        Ok(periodic)
    }

    /// Schedule a task that is itself a managed object in `store`.
    ///
    /// The task is admitted to the store if needed and resolved by identity on
    /// every run, so each run sees the instance the latest validation pass
    /// produced.
    ///
    /// # Errors
    ///
    /// - [`SchedulerError::InvalidArgument`] if `delay` is negative or `task`
    ///   fails to serialize
    /// - [`SchedulerError::Store`] if `task` was removed from `store`
    pub fn schedule_managed_task<T: Task + ManagedObject>(
        &self,
        store: &ObjectStore,
        task: &Managed<T>,
        delay: i64,
    ) -> Result<TaskHandle, SchedulerError> {
        check_non_negative("delay", delay)?;
        probe_managed(task)?;
        let id = store.object_id(task)?;

        let mut inner = self.inner.borrow_mut();
        let tick = inner.now.saturating_add(delay);
        let sequence = inner.take_sequence();
        let handle = TaskHandle::one_shot(tick, delay, sequence, type_name::<T>());
        Ok(enqueue(&mut inner, handle, Box::new(ManagedTask::<T>::new(id))))
    }

    /// Periodic counterpart of [`Scheduler::schedule_managed_task`].
    pub fn schedule_managed_periodic_task<T: Task + ManagedObject>(
        &self,
        store: &ObjectStore,
        task: &Managed<T>,
        delay: i64,
        period: i64,
    ) -> Result<PeriodicTaskHandle, SchedulerError> {
        check_non_negative("delay", delay)?;
        check_non_negative("period", period)?;
        probe_managed(task)?;
        let id = store.object_id(task)?;

        let periodic = PeriodicTaskHandle::new(delay, period);
        self.enqueue_periodic(Box::new(ManagedTask::<T>::new(id)), periodic.clone());
        Ok(periodic)
    }

    fn enqueue_periodic(&self, task: Box<dyn Runnable>, periodic: PeriodicTaskHandle) {
        let mut inner = self.inner.borrow_mut();
        let tick = inner.now.saturating_add(periodic.start());
        let sequence = inner.take_sequence();
        let handle = TaskHandle::periodic(tick, sequence, task.task_type(), periodic);
        enqueue(&mut inner, handle, task);
    }

    /// Execute the head of the queue if it is due at the current tick.
    ///
    /// Returns `None` if nothing is due. A cancelled periodic entry at the
    /// head is discarded without running and reported as
    /// [`Outcome::Cancelled`].
    pub fn execute_due_task(&self, ctx: &Context) -> Option<Execution> {
        let mut entry = {
            let mut inner = self.inner.borrow_mut();
            if !inner.is_due() {
                return None;
            }
            inner.queue.pop()?
        };
        let handle = entry.handle.clone();

        if handle.is_cancelled() {
            tracing::debug!(tick = handle.schedule_time(), task_type = handle.task_type(), "Discarded cancelled task");
            return Some(Execution { handle, outcome: Outcome::Cancelled });
        }

        tracing::debug!(tick = handle.schedule_time(), task_type = handle.task_type(), "Executing task");
        let result = panic::catch_unwind(AssertUnwindSafe(|| entry.task.run(ctx)))
            .unwrap_or_else(|payload| Err(TaskFailure::Failed(panic_message(payload.as_ref()))));

        let mut guard = self.inner.borrow_mut();
        let inner = &mut *guard;
        let outcome = match result {
            Ok(()) => match handle.period() {
                Some(period) if !handle.is_cancelled() => {
                    let next_tick = inner.now.saturating_add(period);
                    let sequence = inner.take_sequence();
                    entry.handle = entry.handle.rescheduled(next_tick, sequence);
                    inner.queue.push(entry);
                    Outcome::Rescheduled { next_tick }
                },
                _ => Outcome::Completed,
            },
            Err(failure) => {
                let retried = failure.should_retry();
                tracing::error!(
                    tick = inner.now,
                    task_type = handle.task_type(),
                    error = %failure,
                    retried,
                    "Task failed"
                );
                inner.failures.push(FailureRecord {
                    tick: inner.now,
                    task_type: handle.task_type(),
                    failure,
                    retried,
                });

                if retried {
                    let sequence = inner.take_sequence();
                    entry.handle = entry.handle.with_sequence(sequence);
                    inner.queue.push(entry);
                    Outcome::Retrying
                } else {
                    Outcome::Dropped
                }
            },
        };

        Some(Execution { handle, outcome })
    }

    /// Move the clock forward to the head entry's tick (never backwards),
    /// then execute it.
    ///
    /// Returns `None` if the queue is empty.
    pub fn advance_to_next_due_tick(&self, ctx: &Context) -> Option<Execution> {
        {
            let mut inner = self.inner.borrow_mut();
            let head = inner.queue.peek()?.handle.schedule_time();
            let now = inner.now.max(head);
            inner.now = now;
        }
        self.execute_due_task(ctx)
    }

    /// Execute every task due at or before `tick`, advancing the clock as it
    /// goes, then leave the clock at `max(now, tick)`.
    ///
    /// Stops early after [`SchedulerConfig::max_steps_per_run`] executions.
    /// Returns the number of entries taken off the queue.
    pub fn run_until(&self, ctx: &Context, tick: i64) -> usize {
        let budget = self.config().max_steps_per_run;
        let mut steps = 0;

        while steps < budget {
            match self.next_due_tick() {
                Some(next) if next <= tick => {
                    if self.advance_to_next_due_tick(ctx).is_some() {
                        steps += 1;
                    }
                },
                _ => break,
            }
        }

        if steps == budget && self.next_due_tick().is_some_and(|next| next <= tick) {
            tracing::warn!(steps, target_tick = tick, "Step budget exhausted before reaching target tick");
            return steps;
        }

        let mut inner = self.inner.borrow_mut();
        let now = inner.now.max(tick);
        inner.now = now;
        steps
    }

    /// Set the virtual clock. Moving it backwards is allowed.
    pub fn set_virtual_time(&self, tick: i64) {
        self.inner.borrow_mut().now = tick;
    }

    /// Current virtual time.
    pub fn virtual_time(&self) -> i64 {
        self.inner.borrow().now
    }

    /// Tick of the head entry, or `None` if the queue is empty.
    pub fn next_due_tick(&self) -> Option<i64> {
        self.inner.borrow().queue.peek().map(|entry| entry.handle.schedule_time())
    }

    /// Number of queued entries, cancelled ones included.
    pub fn total_task_count(&self) -> usize {
        self.inner.borrow().queue.len()
    }

    /// True if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.inner.borrow().queue.is_empty()
    }

    /// Handles of queued periodic entries, in no particular order.
    pub fn periodic_task_handles(&self) -> Vec<PeriodicTaskHandle> {
        self.inner
            .borrow()
            .queue
            .iter()
            .filter_map(|entry| entry.handle.periodic_handle().cloned())
            .collect()
    }

    /// Handles of queued one-shot entries, in no particular order.
    pub fn scheduled_task_handles(&self) -> Vec<TaskHandle> {
        self.inner
            .borrow()
            .queue
            .iter()
            .filter(|entry| !entry.handle.is_periodic())
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Handles of all queued entries, in execution order.
    pub fn pending_handles(&self) -> Vec<TaskHandle> {
        let mut handles: Vec<_> =
            self.inner.borrow().queue.iter().map(|entry| entry.handle.clone()).collect();
        handles.sort();
        handles
    }

    /// Failures observed since creation or the last
    /// [`Scheduler::clear_failures`].
    pub fn failures(&self) -> Vec<FailureRecord> {
        self.inner.borrow().failures.clone()
    }

    /// Forget recorded failures.
    pub fn clear_failures(&self) {
        self.inner.borrow_mut().failures.clear();
    }

    /// Drop every queued entry. The clock and failure log are untouched.
    pub fn reset(&self) {
        let dropped = {
            let mut inner = self.inner.borrow_mut();
            let dropped = inner.queue.len();
            inner.queue.clear();
            dropped
        };
        tracing::debug!(dropped, "Reset scheduler");
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Scheduler")
            .field("now", &inner.now)
            .field("pending", &inner.queue.len())
            .field("failures", &inner.failures.len())
            .finish_non_exhaustive()
    }
}

/// Text of a caught panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("task panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("task panicked: {message}")
    } else {
        "task panicked".to_string()
    }
}

fn enqueue(inner: &mut SchedulerInner, handle: TaskHandle, task: Box<dyn Runnable>) -> TaskHandle {
    tracing::debug!(
        tick = handle.schedule_time(),
        sequence = handle.sequence(),
        task_type = handle.task_type(),
        periodic = handle.is_periodic(),
        "Scheduled task"
    );
    inner.queue.push(Entry { handle: handle.clone(), task });
    handle
}

fn check_non_negative(what: &str, value: i64) -> Result<(), SchedulerError> {
    if value < 0 {
        return Err(SchedulerError::InvalidArgument(format!("{what} must not be negative: {value}")));
    }
    Ok(())
}

fn probe<T: Task>(task: &T) -> Result<(), SchedulerError> {
    codec::encode(task).map(drop).map_err(|err| {
        SchedulerError::InvalidArgument(format!(
            "task {} is not serializable: {err}",
            type_name::<T>()
        ))
    })
}

fn probe_managed<T: Task + ManagedObject>(task: &Managed<T>) -> Result<(), SchedulerError> {
    let value = task.try_borrow().map_err(|_| {
        SchedulerError::InvalidArgument(format!("task {} is mutably borrowed", type_name::<T>()))
    })?;
    probe(&*value)
}
