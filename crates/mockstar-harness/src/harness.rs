//! Test driver over a [`Context`].
//!
//! Runs tasks as transactions: each task run, and each scheduled execution, is
//! followed by the store's validation pass and, optionally, by the standard
//! invariant checks.

use mockstar_core::{
    Context, Execution, Outcome, RunError, SchedulerConfig, StoreError, Task, TaskFailure,
};
use thiserror::Error;

use crate::invariants::{InvariantRegistry, SystemSnapshot, Violation};

/// Harness configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Virtual time the scheduler starts at
    pub start_time: i64,
    /// Step budget for [`Harness::run_until`]
    pub max_steps_per_run: usize,
    /// Validate the store after every task run and every scheduled execution
    pub validate_after_run: bool,
    /// Check invariants after every step
    pub check_invariants: bool,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        let scheduler = SchedulerConfig::default();
        Self {
            start_time: scheduler.start_time,
            max_steps_per_run: scheduler.max_steps_per_run,
            validate_after_run: true,
            check_invariants: true,
        }
    }
}

/// Errors surfaced by the harness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HarnessError {
    /// A task run or its validation failed.
    #[error(transparent)]
    Run(#[from] RunError),

    /// Validation after a scheduled execution failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// One or more invariants were violated.
    #[error("invariants violated {context}: {violations:?}")]
    Invariants {
        /// Where the check ran
        context: String,
        /// Every violation found
        violations: Vec<Violation>,
    },
}

/// Deterministic driver for one simulated server.
pub struct Harness {
    ctx: Context,
    config: HarnessConfig,
    invariants: InvariantRegistry,
}

impl Default for Harness {
    fn default() -> Self {
        Self::new(HarnessConfig::default())
    }
}

impl Harness {
    /// Harness with fresh services and the standard invariants.
    pub fn new(config: HarnessConfig) -> Self {
        let ctx = Context::with_scheduler_config(SchedulerConfig {
            start_time: config.start_time,
            max_steps_per_run: config.max_steps_per_run,
        });
        Self { ctx, config, invariants: InvariantRegistry::standard() }
    }

    /// Replace the invariant registry.
    #[must_use]
    pub fn with_invariants(mut self, invariants: InvariantRegistry) -> Self {
        self.invariants = invariants;
        self
    }

    /// The driven context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    /// Harness configuration.
    pub fn config(&self) -> HarnessConfig {
        self.config
    }

    /// Run `task` once as a transaction.
    pub fn run<T: Task>(&self, task: &mut T) -> Result<(), HarnessError> {
        self.run_with(|ctx| task.run(ctx))
    }

    /// Closure form of [`Harness::run`].
    pub fn run_with<F>(&self, f: F) -> Result<(), HarnessError>
    where
        F: FnOnce(&Context) -> Result<(), TaskFailure>,
    {
        if self.config.validate_after_run {
            self.ctx.run_with(f)?;
        } else {
            f(&self.ctx).map_err(RunError::Task)?;
        }
        self.after_step("after run")
    }

    /// Advance to the next due tick and execute one task there.
    ///
    /// Returns `None` if nothing is scheduled.
    pub fn step(&self) -> Result<Option<Execution>, HarnessError> {
        let Some(execution) = self.ctx.advance_to_next_due_tick() else {
            return Ok(None);
        };
        tracing::debug!(
            tick = execution.handle.schedule_time(),
            outcome = ?execution.outcome,
            "Stepped scheduler"
        );

        if self.config.validate_after_run && execution.outcome != Outcome::Cancelled {
            self.ctx.store().validate_transaction_boundary()?;
        }
        self.after_step(&format!("after step at tick {}", execution.handle.schedule_time()))?;
        Ok(Some(execution))
    }

    /// Step through every task due at or before `tick`, then leave the clock
    /// at `max(now, tick)`.
    ///
    /// Stops early after `max_steps_per_run` steps. Returns the executions in
    /// order.
    pub fn run_until(&self, tick: i64) -> Result<Vec<Execution>, HarnessError> {
        let scheduler = self.ctx.scheduler();
        let mut executions = Vec::new();

        while executions.len() < self.config.max_steps_per_run {
            match scheduler.next_due_tick() {
                Some(next) if next <= tick => {
                    if let Some(execution) = self.step()? {
                        executions.push(execution);
                    }
                },
                _ => {
                    scheduler.set_virtual_time(scheduler.virtual_time().max(tick));
                    return Ok(executions);
                },
            }
        }

        tracing::warn!(steps = executions.len(), target_tick = tick, "Step budget exhausted");
        Ok(executions)
    }

    /// Check every registered invariant against the current state.
    pub fn check_invariants(&self, context: &str) -> Result<(), HarnessError> {
        let snapshot = SystemSnapshot::capture(&self.ctx);
        self.invariants.check_all(&snapshot).map_err(|violations| {
            tracing::error!(context, count = violations.len(), "Invariant violation");
            HarnessError::Invariants { context: context.to_string(), violations }
        })
    }

    fn after_step(&self, context: &str) -> Result<(), HarnessError> {
        if self.config.check_invariants { self.check_invariants(context) } else { Ok(()) }
    }
}
