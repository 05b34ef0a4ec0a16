//! Counter replay tracking
//!
//! Counter-referenced keys are single use. The receiver remembers the highest
//! reference it has authenticated per (master context, source) and rejects
//! anything not strictly newer. Comparison uses serial-number arithmetic so
//! the 32-bit reference can wrap.

use std::{
    collections::{HashMap, hash_map::Entry},
    sync::{Mutex, PoisonError},
};

use crate::{error::SecurityError, key_type::MasterKeyType, nonce::DeviceId};

type ReplayKey = (MasterKeyType, Option<DeviceId>);

/// Highest accepted counter reference per stream.
#[derive(Debug, Default)]
pub struct ReplayGuard {
    last_accepted: Mutex<HashMap<ReplayKey, u32>>,
}

/// True if `candidate` is after `last` in serial-number order.
pub(crate) const fn is_newer(candidate: u32, last: u32) -> bool {
    (candidate.wrapping_sub(last) as i32) > 0
}

impl ReplayGuard {
    /// Empty guard: the first reference of every stream is accepted.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject `reference` if it is not newer than the last accepted one.
    ///
    /// Does not record anything; call [`Self::commit`] once the message has
    /// authenticated.
    pub fn check(
        &self,
        master: MasterKeyType,
        source: Option<DeviceId>,
        reference: u32,
    ) -> Result<(), SecurityError> {
        let guard = self.last_accepted.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.get(&(master, source)) {
            Some(&last) if !is_newer(reference, last) => {
                Err(SecurityError::Replay { reference, last_accepted: last })
            },
            _ => Ok(()),
        }
    }

    /// Check `reference` and record it under one lock acquisition.
    ///
    /// Two receivers racing on the same reference cannot both succeed: the
    /// loser sees the winner's entry and gets `Replay`. Never moves a stream
    /// backwards.
    ///
    /// # Errors
    ///
    /// - `Replay`: `reference` is not newer than the stream's last accepted one
    pub fn commit(
        &self,
        master: MasterKeyType,
        source: Option<DeviceId>,
        reference: u32,
    ) -> Result<(), SecurityError> {
        let mut guard = self.last_accepted.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.entry((master, source)) {
            Entry::Occupied(entry) if !is_newer(reference, *entry.get()) => {
                Err(SecurityError::Replay { reference, last_accepted: *entry.get() })
            },
            Entry::Occupied(mut entry) => {
                entry.insert(reference);
                Ok(())
            },
            Entry::Vacant(entry) => {
                entry.insert(reference);
                Ok(())
            },
        }
    }

    /// Highest accepted reference for a stream.
    pub fn last_accepted(&self, master: MasterKeyType, source: Option<DeviceId>) -> Option<u32> {
        self.last_accepted
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(master, source))
            .copied()
    }

    /// Forget every stream.
    pub fn clear(&self) {
        self.last_accepted.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
