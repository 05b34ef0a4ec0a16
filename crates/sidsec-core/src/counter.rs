//! Time-sync counter
//!
//! Process-wide freshness counter used as the reference value for master and
//! counter-referenced keys. It is an explicit object injected into the
//! engine, never a global.
//!
//! # Invariants
//!
//! - [`TimeSyncCounter::advance`] is the only production mutator
//! - Readers observe a non-decreasing sequence (modulo 2^32 wraparound)
//! - [`TimeSyncCounter::restore`] never moves the counter backwards in
//!   serial-number order

use std::sync::atomic::{AtomicU32, Ordering};

use crate::{
    error::SecurityError,
    replay::is_newer,
    store::{KeyStorage, Slot, StorageError},
};

/// Width of a persisted counter checkpoint.
const CHECKPOINT_SIZE: usize = 4;

/// Monotonic 32-bit freshness counter.
#[derive(Debug, Default)]
pub struct TimeSyncCounter {
    value: AtomicU32,
}

impl TimeSyncCounter {
    /// Counter starting at `initial`.
    pub fn new(initial: u32) -> Self {
        Self { value: AtomicU32::new(initial) }
    }

    /// Current value.
    pub fn current(&self) -> u32 {
        self.value.load(Ordering::Acquire)
    }

    /// Increment and return the new value, wrapping at `u32::MAX`.
    pub fn advance(&self) -> u32 {
        self.value.fetch_add(1, Ordering::AcqRel).wrapping_add(1)
    }

    /// Overwrite the counter. Simulation only.
    #[cfg(any(test, feature = "test-utils"))]
    pub fn set_raw(&self, value: u32) {
        self.value.store(value, Ordering::Release);
    }

    /// Counter resumed from the checkpoint in `storage`, or zero if none.
    ///
    /// Use this at startup. Unlike [`Self::restore`] the stored value is
    /// adopted as is, so a checkpoint more than 2^31 past zero still counts.
    ///
    /// # Errors
    ///
    /// - `Storage`: the collaborator failed or the checkpoint is malformed
    pub fn load<S: KeyStorage>(storage: &S) -> Result<Self, SecurityError> {
        let stored = read_checkpoint(storage)?.unwrap_or(0);
        tracing::debug!(stored, "time-sync counter loaded");
        Ok(Self::new(stored))
    }

    /// Merge a checkpoint from `storage` into a running counter.
    ///
    /// The counter only moves forward in serial-number order: a checkpoint
    /// that is not newer than the current value is ignored, including across
    /// the 32-bit wrap. Returns the value after restoring.
    ///
    /// # Errors
    ///
    /// - `Storage`: the collaborator failed or the checkpoint is malformed
    pub fn restore<S: KeyStorage>(&self, storage: &S) -> Result<u32, SecurityError> {
        let Some(stored) = read_checkpoint(storage)? else {
            return Ok(self.current());
        };

        let restored = match self.value.fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            is_newer(stored, current).then_some(stored)
        }) {
            Ok(_) => stored,
            Err(current) => current,
        };
        tracing::debug!(stored, restored, "time-sync counter restored");
        Ok(restored)
    }

    /// Persist the current value to `storage`. Returns the value written.
    pub fn checkpoint<S: KeyStorage>(&self, storage: &S) -> Result<u32, SecurityError> {
        let value = self.current();
        storage.write(Slot::TimeSyncCounter, &value.to_be_bytes())?;
        Ok(value)
    }
}

fn read_checkpoint<S: KeyStorage>(storage: &S) -> Result<Option<u32>, SecurityError> {
    let Some(bytes) = storage.read(Slot::TimeSyncCounter)? else {
        return Ok(None);
    };

    let Ok(raw) = <[u8; CHECKPOINT_SIZE]>::try_from(bytes.as_slice()) else {
        return Err(StorageError::Corrupt { slot: Slot::TimeSyncCounter.id(), len: bytes.len() }.into());
    };
    Ok(Some(u32::from_be_bytes(raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    #[test]
    fn advance_returns_new_value() {
        let counter = TimeSyncCounter::new(10);
        assert_eq!(counter.advance(), 11);
        assert_eq!(counter.advance(), 12);
        assert_eq!(counter.current(), 12);
    }

    #[test]
    fn advance_wraps() {
        let counter = TimeSyncCounter::new(u32::MAX);
        assert_eq!(counter.advance(), 0);
    }

    #[test]
    fn set_raw_overwrites() {
        let counter = TimeSyncCounter::new(500);
        counter.set_raw(3);
        assert_eq!(counter.current(), 3);
    }

    #[test]
    fn checkpoint_restore_roundtrip() {
        let storage = MemoryStorage::new();
        let counter = TimeSyncCounter::new(41);
        counter.advance();
        assert_eq!(counter.checkpoint(&storage).unwrap(), 42);

        let fresh = TimeSyncCounter::default();
        assert_eq!(fresh.restore(&storage).unwrap(), 42);
        assert_eq!(fresh.current(), 42);
    }

    #[test]
    fn restore_never_lowers() {
        let storage = MemoryStorage::new();
        TimeSyncCounter::new(7).checkpoint(&storage).unwrap();

        let counter = TimeSyncCounter::new(100);
        assert_eq!(counter.restore(&storage).unwrap(), 100);
    }

    #[test]
    fn restore_respects_wraparound() {
        let storage = MemoryStorage::new();
        TimeSyncCounter::new(u32::MAX - 2).checkpoint(&storage).unwrap();

        // The live counter wrapped past the checkpoint
        let counter = TimeSyncCounter::new(3);
        assert_eq!(counter.restore(&storage).unwrap(), 3);
        assert_eq!(counter.current(), 3);

        // A checkpoint just past the wrap is newer than one just before it
        TimeSyncCounter::new(2).checkpoint(&storage).unwrap();
        let behind = TimeSyncCounter::new(u32::MAX - 2);
        assert_eq!(behind.restore(&storage).unwrap(), 2);
    }

    #[test]
    fn load_adopts_any_checkpoint() {
        let storage = MemoryStorage::new();
        assert_eq!(TimeSyncCounter::load(&storage).unwrap().current(), 0);

        TimeSyncCounter::new(0x9000_0000).checkpoint(&storage).unwrap();
        assert_eq!(TimeSyncCounter::load(&storage).unwrap().current(), 0x9000_0000);
    }

    #[test]
    fn restore_without_checkpoint_keeps_value() {
        let counter = TimeSyncCounter::new(9);
        assert_eq!(counter.restore(&MemoryStorage::new()).unwrap(), 9);
    }

    #[test]
    fn malformed_checkpoint_is_corrupt() {
        let storage = MemoryStorage::new();
        storage.write(Slot::TimeSyncCounter, &[1, 2]).unwrap();

        let result = TimeSyncCounter::default().restore(&storage);
        assert_eq!(
            result,
            Err(SecurityError::Storage(StorageError::Corrupt { slot: 0xF0, len: 2 }))
        );
    }

    #[test]
    fn concurrent_advance_is_monotonic() {
        let counter = std::sync::Arc::new(TimeSyncCounter::new(0));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let counter = counter.clone();
                std::thread::spawn(move || {
                    let mut last = 0;
                    for _ in 0..1000 {
                        let next = counter.advance();
                        assert!(next > last);
                        last = next;
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(counter.current(), 4000);
    }
}
