//! Fuzz target for the key store under storage failures
//!
//! Drives provisioning, erasure, flushes, counter checkpoints and restarts
//! through ChaoticStorage at configurable failure rates.
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 90%)
//! - Mixed persistent and volatile stores, erasures and flushes
//! - Counter advances interleaved with checkpoints
//! - Restarts that rebuild the store from the flash contents only
//!
//! # Invariants
//!
//! - Storage errors propagate as Result::Err, never panics
//! - After a restart the store holds exactly the keys whose persistence
//!   succeeded and were not erased since
//! - A restored counter equals the last successful checkpoint

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sidsec_core::{
    KeyStore, MasterKeyType, MemoryStorage, SecurityError, TimeSyncCounter,
    store::ChaoticStorage,
};

#[derive(Debug, Clone, Arbitrary)]
struct ChaosScenario {
    /// Seed for ChaoticStorage RNG (deterministic failures)
    chaos_seed: u64,
    /// Failure rate 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    /// Sequence of operations to perform
    operations: Vec<ChaosOperation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum ChaosOperation {
    /// Store a master key
    Store { slot: u8, fill: u8, persist: bool },
    /// Erase a master key
    Erase { slot: u8 },
    /// Persist volatile keys
    Flush,
    /// Advance and checkpoint the counter
    Checkpoint { steps: u8 },
    /// Drop all in-memory state and reload from flash
    Restart,
}

fuzz_target!(|scenario: ChaosScenario| {
    let failure_rate = (scenario.failure_rate_tenth % 10) as f64 / 10.0;
    let flash = MemoryStorage::new();
    let chaotic = || ChaoticStorage::with_seed(flash.clone(), failure_rate, scenario.chaos_seed);

    let mut store = KeyStore::new(chaotic());
    let mut counter = TimeSyncCounter::new(0);

    // Model of flash contents and of what memory additionally holds
    let mut persisted: [Option<u8>; 8] = [None; 8];
    let mut volatile: [Option<u8>; 8] = [None; 8];
    let mut checkpointed = 0u32;

    for op in scenario.operations.into_iter().take(64) {
        match op {
            ChaosOperation::Store { slot, fill, persist } => {
                let index = (slot as usize) % MasterKeyType::ALL.len();
                match store.store_master_key(MasterKeyType::ALL[index], &[fill; 16], persist) {
                    Ok(()) if persist => {
                        persisted[index] = Some(fill);
                        volatile[index] = None;
                    },
                    Ok(()) => volatile[index] = Some(fill),
                    Err(SecurityError::Storage(_)) => {},
                    Err(err) => panic!("unexpected store error: {err:?}"),
                }
            },
            ChaosOperation::Erase { slot } => {
                let index = (slot as usize) % MasterKeyType::ALL.len();
                match store.erase_master_key(MasterKeyType::ALL[index]) {
                    Ok(()) => {
                        persisted[index] = None;
                        volatile[index] = None;
                    },
                    Err(SecurityError::Storage(_)) => {},
                    Err(err) => panic!("unexpected erase error: {err:?}"),
                }
            },
            ChaosOperation::Flush => match store.flush() {
                Ok(_) => {
                    for index in 0..volatile.len() {
                        if let Some(fill) = volatile[index].take() {
                            persisted[index] = Some(fill);
                        }
                    }
                },
                // Partial flushes leave flash state unknown for volatile slots; restart
                // would make the model ambiguous, so stop here
                Err(SecurityError::Storage(_)) => return,
                Err(err) => panic!("unexpected flush error: {err:?}"),
            },
            ChaosOperation::Checkpoint { steps } => {
                for _ in 0..steps {
                    counter.advance();
                }
                if let Ok(value) = counter.checkpoint(store.storage()) {
                    checkpointed = value;
                }
            },
            ChaosOperation::Restart => {
                store = KeyStore::new(chaotic());
                counter = TimeSyncCounter::new(0);
                volatile = [None; 8];

                // Verify against the raw flash, which never fails
                let reference = KeyStore::new(flash.clone());
                for (index, key_type) in MasterKeyType::ALL.into_iter().enumerate() {
                    match (persisted[index], reference.load_master_key(key_type)) {
                        (Some(fill), Ok(key)) => assert_eq!(key.expose(), &[fill; 16]),
                        (None, Err(err)) => assert!(err.is_not_found()),
                        (expected, actual) => {
                            panic!("slot {index}: expected {expected:?}, got {actual:?}")
                        },
                    }
                }

                match counter.restore(&flash) {
                    Ok(value) => assert_eq!(value, checkpointed),
                    Err(err) => panic!("counter restore failed on clean flash: {err:?}"),
                }
            },
        }
    }
});
