//! Redb-backed key storage.
//!
//! Uses Redb's ACID transactions with Copy-on-Write so a slot is either the
//! old or the new value after a crash, never a torn write. Master keys and the
//! time-sync counter checkpoint survive process restarts.

use std::{fmt::Display, path::Path, sync::Arc};

use redb::{Database, ReadableTable, TableDefinition};
use sidsec_core::{KeyStorage, Slot, StorageError};
use zeroize::Zeroizing;

/// Table: slots
/// Key: slot id (master key tag, or 0xF0 for the counter checkpoint)
/// Value: raw slot bytes (16-byte key, or 4-byte big-endian counter)
const SLOTS: TableDefinition<u8, &[u8]> = TableDefinition::new("slots");

/// Durable key storage backed by Redb.
///
/// Every write or erase is its own committed transaction. Clones share one
/// database handle.
#[derive(Clone)]
pub struct RedbKeyStorage {
    db: Arc<Database>,
}

impl RedbKeyStorage {
    /// Open the key database at `path`, creating it and its slot table on
    /// first use.
    ///
    /// # Errors
    ///
    /// `StorageError::Io` if the file cannot be opened, created or locked.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let db = Database::create(path.as_ref()).map_err(io_error)?;

        let txn = db.begin_write().map_err(io_error)?;
        {
            let _ = txn.open_table(SLOTS).map_err(io_error)?;
        }
        txn.commit().map_err(io_error)?;

        tracing::debug!(path = %path.as_ref().display(), "key database opened");
        Ok(Self { db: Arc::new(db) })
    }
}

fn io_error(err: impl Display) -> StorageError {
    StorageError::Io(err.to_string())
}

impl KeyStorage for RedbKeyStorage {
    fn read(&self, slot: Slot) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError> {
        let txn = self.db.begin_read().map_err(io_error)?;
        let table = txn.open_table(SLOTS).map_err(io_error)?;

        let value = table.get(slot.id()).map_err(io_error)?;
        Ok(value.map(|guard| Zeroizing::new(guard.value().to_vec())))
    }

    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut table = txn.open_table(SLOTS).map_err(io_error)?;
            table.insert(slot.id(), bytes).map_err(io_error)?;
        }
        txn.commit().map_err(io_error)?;
        Ok(())
    }

    fn erase(&self, slot: Slot) -> Result<(), StorageError> {
        let txn = self.db.begin_write().map_err(io_error)?;
        {
            let mut table = txn.open_table(SLOTS).map_err(io_error)?;
            table.remove(slot.id()).map_err(io_error)?;
        }
        txn.commit().map_err(io_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use sidsec_core::MasterKeyType;
    use tempfile::tempdir;

    use super::*;

    #[test]
    fn missing_slot_reads_none() {
        let dir = tempdir().unwrap();
        let storage = RedbKeyStorage::open(dir.path().join("keys.redb")).unwrap();

        assert!(storage.read(Slot::MasterKey(MasterKeyType::Wan)).unwrap().is_none());
        assert!(storage.read(Slot::TimeSyncCounter).unwrap().is_none());
    }

    #[test]
    fn write_overwrite_erase() {
        let dir = tempdir().unwrap();
        let storage = RedbKeyStorage::open(dir.path().join("keys.redb")).unwrap();
        let slot = Slot::MasterKey(MasterKeyType::Pan);

        storage.write(slot, &[1; 16]).unwrap();
        storage.write(slot, &[2; 16]).unwrap();
        assert_eq!(storage.read(slot).unwrap().unwrap().as_slice(), &[2; 16]);

        storage.erase(slot).unwrap();
        assert!(storage.read(slot).unwrap().is_none());

        // Erasing an empty slot succeeds
        storage.erase(slot).unwrap();
    }

    #[test]
    fn clones_share_database() {
        let dir = tempdir().unwrap();
        let storage = RedbKeyStorage::open(dir.path().join("keys.redb")).unwrap();
        let clone = storage.clone();

        clone.write(Slot::TimeSyncCounter, &7u32.to_be_bytes()).unwrap();
        assert_eq!(storage.read(Slot::TimeSyncCounter).unwrap().unwrap().as_slice(), &[0, 0, 0, 7]);
    }
}
