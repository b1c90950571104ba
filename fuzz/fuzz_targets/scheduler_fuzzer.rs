//! Fuzz target for the virtual-time scheduler
//!
//! # Strategy
//!
//! - One-shot and periodic tasks with arbitrary delays and periods
//! - Tasks that retry a bounded number of times, or fail outright
//! - Cancellation of periodic handles at arbitrary points
//! - Stepping and running to arbitrary ticks
//!
//! # Invariants
//!
//! - Virtual time never moves backwards
//! - Executions within a run are ordered by tick
//! - Store and scheduler invariants hold after every step
//! - NEVER panic on any schedule

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mockstar_core::{Context, PeriodicTaskHandle, Task, TaskFailure};
use mockstar_harness::{Harness, HarnessConfig};
use serde::Serialize;

#[derive(Debug, Clone, Arbitrary)]
enum ScheduleOp {
    Once { delay: u8, retries: u8, abort: bool },
    Periodic { delay: u8, period: u8, retries: u8 },
    Cancel { index: u8 },
    Step,
    RunFor { ticks: u16 },
}

#[derive(Serialize)]
struct Flaky {
    retries_left: u8,
    abort: bool,
}

impl Task for Flaky {
    fn run(&mut self, _ctx: &Context) -> Result<(), TaskFailure> {
        if self.retries_left > 0 {
            self.retries_left -= 1;
            return Err(TaskFailure::retry("not ready"));
        }
        if self.abort {
            return Err(TaskFailure::abort("gave up"));
        }
        Ok(())
    }
}

fuzz_target!(|ops: Vec<ScheduleOp>| {
    let harness = Harness::new(HarnessConfig { max_steps_per_run: 512, ..HarnessConfig::default() });
    let scheduler = harness.context().scheduler().clone();
    let mut periodic: Vec<PeriodicTaskHandle> = Vec::new();

    for op in ops {
        let before = scheduler.virtual_time();
        match op {
            ScheduleOp::Once { delay, retries, abort } => {
                let task = Flaky { retries_left: retries % 4, abort };
                scheduler.schedule_task(task, i64::from(delay)).expect("non-negative delay");
            },
            ScheduleOp::Periodic { delay, period, retries } => {
                let task = Flaky { retries_left: retries % 4, abort: false };
                let handle = scheduler
                    .schedule_periodic_task(task, i64::from(delay), i64::from(period).max(1))
                    .expect("non-negative delay and period");
                periodic.push(handle);
            },
            ScheduleOp::Cancel { index } => {
                if !periodic.is_empty() {
                    periodic[usize::from(index) % periodic.len()].cancel();
                }
            },
            ScheduleOp::Step => {
                harness.step().expect("step keeps invariants");
            },
            ScheduleOp::RunFor { ticks } => {
                let target = before + i64::from(ticks);
                let executions = harness.run_until(target).expect("run keeps invariants");
                let ticks: Vec<_> = executions.iter().map(|e| e.handle.schedule_time()).collect();
                assert!(ticks.windows(2).all(|w| w[0] <= w[1]), "executions out of order: {ticks:?}");
            },
        }
        assert!(scheduler.virtual_time() >= before, "virtual time moved backwards");
    }
});
