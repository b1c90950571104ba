//! Fuzz target for the validation pass's CBOR round trip
//!
//! # Strategy
//!
//! - Managed objects holding arbitrary bytes, strings and nested maps
//! - Several objects bound under arbitrary names
//! - Repeated validation passes over the same store
//!
//! # Invariants
//!
//! - Validation succeeds for every serializable object
//! - Contents survive every pass unchanged
//! - Bindings keep pointing at the same identities
//! - NEVER panic on any payload

#![no_main]

use std::collections::BTreeMap;

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use mockstar_core::{Managed, ManagedObject, ObjectStore};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Arbitrary, Serialize, Deserialize)]
struct Blob {
    bytes: Vec<u8>,
    text: String,
    fields: BTreeMap<String, i64>,
    nested: Option<Vec<(u16, bool)>>,
}

impl ManagedObject for Blob {}

fuzz_target!(|input: (Vec<(String, Blob)>, u8)| {
    let (entries, passes) = input;
    let store = ObjectStore::new();

    let mut expected = BTreeMap::new();
    for (name, blob) in entries {
        store.set_binding(&name, &Managed::new(blob.clone())).expect("fresh object binds");
        expected.insert(name, blob);
    }
    let ids: BTreeMap<_, _> = store.snapshot().bindings;

    for _ in 0..=(passes % 4) {
        store.validate_transaction_boundary().expect("serializable objects validate");
    }

    assert_eq!(store.snapshot().bindings, ids);
    for (name, blob) in expected {
        let restored = store.get_binding::<Blob>(&name).expect("bound name resolves");
        assert_eq!(*restored.borrow(), blob);
    }
});
