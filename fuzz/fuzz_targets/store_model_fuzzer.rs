//! Fuzz target for the object store against its reference model
//!
//! # Strategy
//!
//! - Arbitrary operation sequences over a small pool of handles and names
//! - Validation passes interleaved at random points
//! - Stale handles and inactive references exercised after every pass
//!
//! # Invariants
//!
//! - Every operation returns the same result on model and store
//! - Observable state matches after every operation
//! - NEVER panic on any operation sequence

#![no_main]

use libfuzzer_sys::fuzz_target;
use mockstar_harness::{Operation, replay};

fuzz_target!(|operations: Vec<Operation>| {
    if let Err(divergence) = replay(&operations) {
        panic!("store diverged from model: {divergence:?}");
    }
});
