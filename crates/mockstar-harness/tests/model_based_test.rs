//! Model-based property tests.
//!
//! Random operation sequences are applied to the reference model and to the
//! real store in lockstep. Results and observable state must agree after
//! every operation, and the standard invariants must hold throughout.
//!
//! ```text
//! proptest generates: Vec<Operation>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!      ModelStore     StoreDriver      Compare
//!      (reference)   (ObjectStore)     Results
//! ```

use mockstar_core::{Context, StoreError};
use mockstar_harness::{
    InvariantRegistry, ModelStore, NameKey, Operation, OperationError, OperationResult,
    StoreDriver, SystemSnapshot, generate_operations, logging,
};
use proptest::prelude::*;

fn operation_strategy() -> impl Strategy<Value = Operation> {
    prop_oneof![
        3 => any::<u8>().prop_map(|value| Operation::Create { value }),
        2 => any::<u8>().prop_map(|handle| Operation::Increment { handle }),
        2 => any::<u8>().prop_map(|handle| Operation::ObjectId { handle }),
        2 => any::<u8>().prop_map(|handle| Operation::CreateReference { handle }),
        2 => any::<u8>().prop_map(|reference| Operation::ResolveReference { reference }),
        3 => (any::<u8>(), any::<u8>())
            .prop_map(|(name, handle)| Operation::SetBinding { name: NameKey(name), handle }),
        2 => any::<u8>().prop_map(|name| Operation::GetBinding { name: NameKey(name) }),
        1 => any::<u8>().prop_map(|name| Operation::RemoveBinding { name: NameKey(name) }),
        1 => any::<u8>().prop_map(|handle| Operation::MarkForUpdate { handle }),
        1 => any::<u8>().prop_map(|handle| Operation::RemoveObject { handle }),
        1 => Just(Operation::Validate),
    ]
}

/// Apply operations in lockstep, checking results, state and invariants.
fn check_sequence(operations: &[Operation]) -> Result<(), TestCaseError> {
    let ctx = Context::new();
    let mut model = ModelStore::new();
    let mut real = StoreDriver::with_store(ctx.store().clone());
    let invariants = InvariantRegistry::standard();

    for (step, op) in operations.iter().enumerate() {
        let expected = model.apply(op);
        let actual = real.apply(op);
        prop_assert_eq!(&expected, &actual, "step {}: {:?}", step, op);
        prop_assert_eq!(model.observable_state(), real.observable_state(), "step {}: {:?}", step, op);

        let snapshot = SystemSnapshot::capture(&ctx);
        if let Err(violations) = invariants.check_all(&snapshot) {
            return Err(TestCaseError::fail(format!("step {step}: {violations:?}")));
        }
    }
    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Property: the real store matches the model for any sequence
    #[test]
    fn prop_real_store_matches_model(operations in prop::collection::vec(operation_strategy(), 0..80)) {
        check_sequence(&operations)?;
    }

    /// Property: seeded generation drives the same comparison
    #[test]
    fn prop_seeded_sequences_match(seed in any::<u64>()) {
        check_sequence(&generate_operations(seed, 60))?;
    }
}

#[test]
fn validation_then_stale_lookup() {
    logging::init();

    let operations = [
        Operation::Create { value: 7 },
        Operation::CreateReference { handle: 0 },
        Operation::Validate,
        Operation::ResolveReference { reference: 0 },
    ];

    let mut real = StoreDriver::new();
    let results: Vec<_> = operations.iter().map(|op| real.apply(op)).collect();

    assert_eq!(
        results,
        vec![
            OperationResult::Ok,
            OperationResult::Id(0),
            OperationResult::Ok,
            OperationResult::Error(OperationError::InactiveContext),
        ]
    );
    assert_eq!(real.observable_state().tracked, vec![(0, 7)]);
}

#[test]
fn binding_outlives_removed_object() {
    let mut real = StoreDriver::new();
    real.apply(&Operation::Create { value: 1 });
    real.apply(&Operation::SetBinding { name: NameKey(2), handle: 0 });
    real.apply(&Operation::RemoveObject { handle: 0 });

    assert_eq!(
        real.apply(&Operation::GetBinding { name: NameKey(2) }),
        OperationResult::Error(OperationError::NotFound)
    );
    assert_eq!(real.store().next_bound_name(None).as_deref(), Some("name2"));
    assert!(matches!(real.store().get_binding_any("name2"), Err(StoreError::NotFound(_))));
}
