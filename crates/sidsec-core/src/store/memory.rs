use std::{
    collections::HashMap,
    sync::{Arc, Mutex, PoisonError},
};

use zeroize::Zeroizing;

use super::{KeyStorage, Slot, StorageError};

/// In-memory storage implementation for testing and simulation
///
/// Uses a `HashMap` keyed by slot. All state is wrapped in Arc<Mutex<>> so
/// clones share the same slots, which lets a test drop a key store and build
/// a fresh one over the same "flash". Slot contents are zeroized when
/// overwritten or erased.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<HashMap<Slot, Zeroizing<Vec<u8>>>>>,
}

impl MemoryStorage {
    /// Create a new empty `MemoryStorage`
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of occupied slots.
    ///
    /// Useful for debugging and testing.
    pub fn slot_count(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl KeyStorage for MemoryStorage {
    fn read(&self, slot: Slot) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(inner.get(&slot).cloned())
    }

    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.insert(slot, Zeroizing::new(bytes.to_vec()));
        Ok(())
    }

    fn erase(&self, slot: Slot) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.remove(&slot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_type::MasterKeyType;

    #[test]
    fn write_then_read() {
        let storage = MemoryStorage::new();
        storage.write(Slot::TimeSyncCounter, &[0, 0, 0, 9]).unwrap();

        let bytes = storage.read(Slot::TimeSyncCounter).unwrap().unwrap();
        assert_eq!(bytes.as_slice(), &[0, 0, 0, 9]);
        assert_eq!(storage.slot_count(), 1);
    }

    #[test]
    fn clones_share_slots() {
        let storage = MemoryStorage::new();
        let clone = storage.clone();

        storage.write(Slot::MasterKey(MasterKeyType::Wan), &[1u8; 16]).unwrap();
        assert!(clone.read(Slot::MasterKey(MasterKeyType::Wan)).unwrap().is_some());
    }

    #[test]
    fn erase_empty_slot_succeeds() {
        let storage = MemoryStorage::new();
        storage.erase(Slot::MasterKey(MasterKeyType::Pan)).unwrap();
        assert_eq!(storage.slot_count(), 0);
    }
}
