//! Per-test bundle of the simulated services.
//!
//! A [`Context`] is passed explicitly to every task and to whatever drives the
//! scheduler. Tests create one per case; nothing is global.

use crate::{
    channel::ChannelRegistry,
    error::RunError,
    scheduler::{Execution, Scheduler, SchedulerConfig, Task, TaskFailure},
    store::ObjectStore,
};

/// Store, scheduler and channel registry for one simulated server.
///
/// Cheap to clone; clones share all three services.
#[derive(Debug, Clone, Default)]
pub struct Context {
    store: ObjectStore,
    scheduler: Scheduler,
    channels: ChannelRegistry,
}

impl Context {
    /// Fresh services with the default scheduler configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fresh services with a custom scheduler configuration.
    pub fn with_scheduler_config(config: SchedulerConfig) -> Self {
        Self { scheduler: Scheduler::new(config), ..Self::default() }
    }

    /// The object store.
    pub fn store(&self) -> &ObjectStore {
        &self.store
    }

    /// The task scheduler.
    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The channel registry.
    pub fn channels(&self) -> &ChannelRegistry {
        &self.channels
    }

    /// Run `task` once, then validate the store as a commit would.
    ///
    /// # Errors
    ///
    /// - [`RunError::Task`] if the task fails; the store is not validated
    /// - [`RunError::Store`] if validation fails
    pub fn run<T: Task>(&self, task: &mut T) -> Result<(), RunError> {
        task.run(self).map_err(RunError::Task)?;
        self.store.validate_transaction_boundary()?;
        Ok(())
    }

    /// Closure form of [`Context::run`].
    pub fn run_with<F>(&self, f: F) -> Result<(), RunError>
    where
        F: FnOnce(&Self) -> Result<(), TaskFailure>,
    {
        f(self).map_err(RunError::Task)?;
        self.store.validate_transaction_boundary()?;
        Ok(())
    }

    /// See [`Scheduler::execute_due_task`].
    pub fn execute_due_task(&self) -> Option<Execution> {
        self.scheduler.execute_due_task(self)
    }

    /// See [`Scheduler::advance_to_next_due_tick`].
    pub fn advance_to_next_due_tick(&self) -> Option<Execution> {
        self.scheduler.advance_to_next_due_tick(self)
    }

    /// See [`Scheduler::run_until`].
    pub fn run_until(&self, tick: i64) -> usize {
        self.scheduler.run_until(self, tick)
    }
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};

    use super::*;
    use crate::{
        error::StoreError,
        scheduler::Outcome,
        store::{Managed, ManagedObject, Reference},
    };

    #[derive(Debug, Serialize, Deserialize)]
    struct Wallet {
        coins: u64,
    }

    impl ManagedObject for Wallet {}

    #[derive(Serialize)]
    struct Deposit {
        wallet: Reference<Wallet>,
        amount: u64,
    }

    impl Task for Deposit {
        fn run(&mut self, ctx: &Context) -> Result<(), TaskFailure> {
            self.wallet.get_for_update(ctx.store())?.borrow_mut().coins += self.amount;
            Ok(())
        }
    }

    #[test]
    fn run_validates_after_the_task() {
        let ctx = Context::new();
        let wallet = Managed::new(Wallet { coins: 5 });
        let reference = ctx.store().create_reference(&wallet).unwrap();

        ctx.run(&mut Deposit { wallet: reference.clone(), amount: 10 }).unwrap();

        assert!(!reference.is_active());
        let fresh = ctx.store().object_with_id::<Wallet>(reference.id()).unwrap();
        assert_eq!(fresh.borrow().coins, 15);
    }

    #[test]
    fn failed_task_skips_validation() {
        let ctx = Context::new();
        let wallet = Managed::new(Wallet { coins: 0 });
        let reference = ctx.store().create_reference(&wallet).unwrap();

        let err = ctx.run_with(|_| Err(TaskFailure::abort("no funds"))).unwrap_err();

        assert_eq!(err, RunError::Task(TaskFailure::abort("no funds")));
        assert!(reference.is_active());
        assert!(ctx.store().contains(&wallet));
    }

    #[test]
    fn stale_reference_fails_scheduled_task() {
        let ctx = Context::new();
        let wallet = Managed::new(Wallet { coins: 0 });
        let reference = ctx.store().create_reference(&wallet).unwrap();
        ctx.store().validate_transaction_boundary().unwrap();

        ctx.scheduler().schedule_task_now(Deposit { wallet: reference, amount: 1 }).unwrap();
        let execution = ctx.execute_due_task().unwrap();

        assert_eq!(execution.outcome, Outcome::Dropped);
        assert_eq!(
            ctx.scheduler().failures()[0].failure,
            TaskFailure::from(StoreError::InactiveContext)
        );
    }

    #[test]
    fn clones_share_services() {
        let ctx = Context::new();
        let other = ctx.clone();

        other.store().set_binding("wallet", &Managed::new(Wallet { coins: 1 })).unwrap();
        other.scheduler().set_virtual_time(42);

        assert_eq!(ctx.store().len(), 1);
        assert_eq!(ctx.scheduler().virtual_time(), 42);
        assert_eq!(ctx.run_until(50), 0);
        assert_eq!(other.scheduler().virtual_time(), 50);
    }
}
