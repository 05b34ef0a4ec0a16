//! Fault-injecting storage for flash failure tests
//!
//! Wraps another [`KeyStorage`] and fails a seeded, reproducible fraction of
//! operations. The key store must never report a key as persisted when the
//! write failed, and never surface a half-written key.

use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use zeroize::Zeroizing;

use super::{KeyStorage, Slot, StorageError};

/// Storage that fails operations at a configured rate.
///
/// The fault is decided before delegating, so a failed write leaves the
/// wrapped slot untouched. Clones share the fault schedule.
#[derive(Clone)]
pub struct ChaoticStorage<S: KeyStorage> {
    inner: S,
    /// Probability of failing an operation, in [0.0, 1.0]
    failure_rate: f64,
    schedule: Arc<Mutex<FaultSchedule>>,
    injected: Arc<AtomicU64>,
}

/// SplitMix64 stream; a seed always yields the same fault sequence.
struct FaultSchedule {
    state: u64,
}

impl FaultSchedule {
    /// Uniform sample in [0.0, 1.0) from the top 53 bits.
    fn sample(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut z = self.state;
        z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        z ^= z >> 31;

        (z >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl<S: KeyStorage> ChaoticStorage<S> {
    /// Wrap `inner` with the default seed.
    ///
    /// `failure_rate` is clamped to [0.0, 1.0].
    pub fn new(inner: S, failure_rate: f64) -> Self {
        Self::with_seed(inner, failure_rate, 0x5EC0_FA17)
    }

    /// Wrap `inner` with an explicit fault seed.
    pub fn with_seed(inner: S, failure_rate: f64, seed: u64) -> Self {
        Self {
            inner,
            failure_rate: failure_rate.clamp(0.0, 1.0),
            schedule: Arc::new(Mutex::new(FaultSchedule { state: seed })),
            injected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Wrapped storage, for inspecting what actually landed.
    pub fn inner(&self) -> &S {
        &self.inner
    }

    /// Number of faults injected so far.
    pub fn injected(&self) -> u64 {
        self.injected.load(Ordering::Relaxed)
    }

    fn fault(&self, operation: &str, slot: Slot) -> Result<(), StorageError> {
        let sample = self.schedule.lock().unwrap_or_else(PoisonError::into_inner).sample();
        if sample >= self.failure_rate {
            return Ok(());
        }

        self.injected.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(operation, slot = slot.id(), "injected storage fault");
        Err(StorageError::Io(format!("injected {operation} failure")))
    }
}

impl<S: KeyStorage> KeyStorage for ChaoticStorage<S> {
    fn read(&self, slot: Slot) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        self.fault("read", slot)?;
        self.inner.read(slot)
    }

    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<(), StorageError> {
        self.fault("write", slot)?;
        self.inner.write(slot, bytes)
    }

    fn erase(&self, slot: Slot) -> Result<(), StorageError> {
        self.fault("erase", slot)?;
        self.inner.erase(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStorage;

    #[test]
    fn zero_rate_never_fails() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 0.0);
        for i in 0..100u8 {
            storage.write(Slot::TimeSyncCounter, &[i]).unwrap();
        }
    }

    #[test]
    fn full_rate_always_fails() {
        let storage = ChaoticStorage::new(MemoryStorage::new(), 1.0);
        let result = storage.write(Slot::TimeSyncCounter, &[1]);
        assert_eq!(result, Err(StorageError::Io("injected write failure".to_string())));
        assert_eq!(storage.inner().slot_count(), 0);
        assert_eq!(storage.injected(), 1);
    }

    #[test]
    fn rate_is_roughly_honoured() {
        let storage = ChaoticStorage::with_seed(MemoryStorage::new(), 0.25, 9);
        for _ in 0..4_000 {
            let _ = storage.read(Slot::TimeSyncCounter);
        }
        assert!((800..1_200).contains(&storage.injected()), "{}", storage.injected());
    }

    #[test]
    fn same_seed_same_failures() {
        let a = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);
        let b = ChaoticStorage::with_seed(MemoryStorage::new(), 0.5, 42);

        for _ in 0..50 {
            let ra = a.write(Slot::TimeSyncCounter, &[0]).is_ok();
            let rb = b.write(Slot::TimeSyncCounter, &[0]).is_ok();
            assert_eq!(ra, rb);
        }
    }
}
