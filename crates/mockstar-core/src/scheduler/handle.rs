//! Handles describing scheduled task entries.

use std::{cell::Cell, cmp::Ordering, fmt, rc::Rc};

/// Shared recurrence state of a periodic task.
struct Recurrence {
    period: i64,
    start: i64,
    cancelled: Cell<bool>,
}

/// Handle to a periodic task, returned by
/// [`crate::Scheduler::schedule_periodic_task`].
///
/// Clones share one cancellation flag. Equality is handle identity.
#[derive(Clone)]
pub struct PeriodicTaskHandle {
    recurrence: Rc<Recurrence>,
}

impl PeriodicTaskHandle {
    pub(crate) fn new(start: i64, period: i64) -> Self {
        Self { recurrence: Rc::new(Recurrence { period, start, cancelled: Cell::new(false) }) }
    }

    /// Stop future recurrences. Idempotent.
    ///
    /// An entry already queued stays in the queue until it reaches the head,
    /// where it is discarded without running.
    pub fn cancel(&self) {
        if !self.recurrence.cancelled.replace(true) {
            tracing::debug!(
                start = self.recurrence.start,
                period = self.recurrence.period,
                "Cancelled periodic task"
            );
        }
    }

    /// True once [`PeriodicTaskHandle::cancel`] has been called.
    pub fn is_cancelled(&self) -> bool {
        self.recurrence.cancelled.get()
    }

    /// Ticks between runs.
    pub fn period(&self) -> i64 {
        self.recurrence.period
    }

    /// Delay the task was originally scheduled with.
    pub fn start(&self) -> i64 {
        self.recurrence.start
    }
}

impl PartialEq for PeriodicTaskHandle {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.recurrence, &other.recurrence)
    }
}

impl Eq for PeriodicTaskHandle {}

impl fmt::Debug for PeriodicTaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeriodicTaskHandle")
            .field("start", &self.start())
            .field("period", &self.period())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

/// Description of one queued task entry.
///
/// Ordered by scheduled tick, then by insertion sequence, so entries due at
/// the same tick run first-in first-out.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    tick: i64,
    start: i64,
    sequence: u64,
    task_type: &'static str,
    periodic: Option<PeriodicTaskHandle>,
}

impl TaskHandle {
    pub(crate) fn one_shot(tick: i64, start: i64, sequence: u64, task_type: &'static str) -> Self {
        Self { tick, start, sequence, task_type, periodic: None }
    }

    pub(crate) fn periodic(
        tick: i64,
        sequence: u64,
        task_type: &'static str,
        periodic: PeriodicTaskHandle,
    ) -> Self {
        Self { tick, start: periodic.start(), sequence, task_type, periodic: Some(periodic) }
    }

    /// Same entry with a fresh insertion sequence.
    pub(crate) fn with_sequence(self, sequence: u64) -> Self {
        Self { sequence, ..self }
    }

    /// Next recurrence at `tick`, keeping the start offset and periodic handle.
    pub(crate) fn rescheduled(self, tick: i64, sequence: u64) -> Self {
        Self { tick, sequence, ..self }
    }

    /// Virtual tick at which the task is due.
    pub fn schedule_time(&self) -> i64 {
        self.tick
    }

    /// Delay the task was originally scheduled with.
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Insertion sequence, the tie-break among equal ticks.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Rust type name of the task.
    pub fn task_type(&self) -> &'static str {
        self.task_type
    }

    /// Periodic handle, if the task recurs.
    pub fn periodic_handle(&self) -> Option<&PeriodicTaskHandle> {
        self.periodic.as_ref()
    }

    /// True if the task recurs.
    pub fn is_periodic(&self) -> bool {
        self.periodic.is_some()
    }

    /// Ticks between runs, if the task recurs.
    pub fn period(&self) -> Option<i64> {
        self.periodic.as_ref().map(PeriodicTaskHandle::period)
    }

    /// True if the task recurs and has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.periodic.as_ref().is_some_and(PeriodicTaskHandle::is_cancelled)
    }
}

impl PartialEq for TaskHandle {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for TaskHandle {}

impl PartialOrd for TaskHandle {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TaskHandle {
    fn cmp(&self, other: &Self) -> Ordering {
        self.tick.cmp(&other.tick).then_with(|| self.sequence.cmp(&other.sequence))
    }
}
