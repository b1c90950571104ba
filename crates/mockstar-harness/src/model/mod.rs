//! Model-based testing of the object store.
//!
//! [`ModelStore`] is a reference implementation built from plain collections.
//! [`StoreDriver`] applies the same [`Operation`]s to a real
//! [`mockstar_core::ObjectStore`]. After every operation both results and
//! both [`ObservableState`]s must agree.

mod driver;
mod operation;
mod store;

use arbitrary::{Arbitrary, Unstructured};
use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

pub use driver::{Counter, StoreDriver};
pub use operation::{
    HandleIndex, NameKey, Operation, OperationError, OperationResult, ReferenceIndex,
};
pub use store::{ModelStore, ObservableState};

/// Bytes of entropy drawn per requested operation.
const BYTES_PER_OPERATION: usize = 8;

/// Generate up to `count` operations deterministically from `seed`.
///
/// The same seed always yields the same sequence.
pub fn generate_operations(seed: u64, count: usize) -> Vec<Operation> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bytes = vec![0u8; count * BYTES_PER_OPERATION];
    rng.fill_bytes(&mut bytes);

    let mut unstructured = Unstructured::new(&bytes);
    let mut operations = Vec::with_capacity(count);
    while operations.len() < count {
        match Operation::arbitrary(&mut unstructured) {
            Ok(op) => operations.push(op),
            Err(_) => break,
        }
    }
    operations
}

/// Outcome of replaying an operation sequence against model and real store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Divergence {
    /// The two sides returned different results.
    Result {
        /// Position of the operation in the sequence
        step: usize,
        /// The operation
        operation: Operation,
        /// Model result
        expected: OperationResult,
        /// Real result
        actual: OperationResult,
    },
    /// The results matched but the observable states differ.
    State {
        /// Position of the operation in the sequence
        step: usize,
        /// Model state
        expected: ObservableState,
        /// Real state
        actual: ObservableState,
    },
}

/// Apply `operations` to a fresh model and a fresh real store in lockstep,
/// stopping at the first divergence.
pub fn replay(operations: &[Operation]) -> Result<(), Box<Divergence>> {
    let mut model = ModelStore::new();
    let mut real = StoreDriver::new();

    for (step, operation) in operations.iter().enumerate() {
        let expected = model.apply(operation);
        let actual = real.apply(operation);
        if expected != actual {
            return Err(Box::new(Divergence::Result {
                step,
                operation: operation.clone(),
                expected,
                actual,
            }));
        }

        let expected = model.observable_state();
        let actual = real.observable_state();
        if expected != actual {
            return Err(Box::new(Divergence::State { step, expected, actual }));
        }
    }
    Ok(())
}
