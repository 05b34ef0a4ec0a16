//! Key hierarchy store and its persistence abstraction
//!
//! [`KeyStore`] owns every master key. It keeps a volatile copy of each key
//! and writes through to a [`KeyStorage`] collaborator when asked to
//! persist. Callers only ever receive scoped [`SecretKey`] copies.
//!
//! The storage trait is synchronous: every operation in this layer is a
//! bounded, non-suspending computation.

mod chaotic;
mod error;
mod memory;

use std::{
    collections::HashMap,
    sync::{PoisonError, RwLock},
};

pub use chaotic::ChaoticStorage;
pub use error::StorageError;
pub use memory::MemoryStorage;
use sidsec_crypto::{KEY_SIZE, SecretKey};
use zeroize::Zeroizing;

use crate::{error::SecurityError, key_type::MasterKeyType};

/// A persistent storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Master key for one context
    MasterKey(MasterKeyType),
    /// Time-sync counter checkpoint
    TimeSyncCounter,
}

impl Slot {
    /// Stable one-byte slot identifier.
    pub const fn id(self) -> u8 {
        match self {
            Self::MasterKey(key_type) => key_type.tag(),
            Self::TimeSyncCounter => 0xF0,
        }
    }
}

/// Persistence collaborator for key material and the time-sync counter.
///
/// Must be Send + Sync (the key store is shared between callers) and
/// synchronous. Implementations typically share internal state via Arc, so
/// clones access the same underlying storage.
pub trait KeyStorage: Send + Sync {
    /// Read a slot. `None` if the slot has never been written or was erased.
    fn read(&self, slot: Slot) -> Result<Option<Zeroizing<Vec<u8>>>, StorageError>;

    /// Overwrite a slot.
    fn write(&self, slot: Slot, bytes: &[u8]) -> Result<(), StorageError>;

    /// Erase a slot. Erasing an empty slot succeeds.
    fn erase(&self, slot: Slot) -> Result<(), StorageError>;
}

struct CachedKey {
    key: SecretKey,
    persisted: bool,
}

/// Holds master keys and hands out scoped copies.
///
/// # Invariants
///
/// - Every cached key is exactly [`KEY_SIZE`] bytes
/// - A key marked persisted has been written to the collaborator
/// - Evicted or overwritten keys are zeroized (dropped `SecretKey`)
/// - Collaborator writes and erases happen under the cache write lock, so
///   the cache never disagrees with storage once a call returns
pub struct KeyStore<S: KeyStorage> {
    storage: S,
    cache: RwLock<HashMap<MasterKeyType, CachedKey>>,
}

impl<S: KeyStorage> KeyStore<S> {
    /// Create a store backed by `storage`. Nothing is loaded eagerly.
    pub fn new(storage: S) -> Self {
        Self { storage, cache: RwLock::new(HashMap::new()) }
    }

    /// Persistence collaborator.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Store a master key.
    ///
    /// With `persist = false` the key lives only in memory until
    /// [`Self::flush`].
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: `key_bytes` is not [`KEY_SIZE`] bytes
    /// - `Storage`: the collaborator failed; the previous key (if any) is kept
    pub fn store_master_key(
        &self,
        key_type: MasterKeyType,
        key_bytes: &[u8],
        persist: bool,
    ) -> Result<(), SecurityError> {
        let key = SecretKey::from_slice(key_bytes).map_err(|_| SecurityError::InvalidLength {
            field: "master key",
            expected: KEY_SIZE,
            actual: key_bytes.len(),
        })?;

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if persist {
            self.storage.write(Slot::MasterKey(key_type), key.expose())?;
        }
        cache.insert(key_type, CachedKey { key, persisted: persist });
        drop(cache);

        tracing::info!(key_type = %key_type, persist, "master key stored");
        Ok(())
    }

    /// Load a scoped copy of a master key.
    ///
    /// Falls through to the collaborator on a cache miss and caches the
    /// result.
    ///
    /// # Errors
    ///
    /// - `NotFound`: no key has been stored for `key_type`
    /// - `Storage`: the collaborator failed or returned a malformed key
    pub fn load_master_key(&self, key_type: MasterKeyType) -> Result<SecretKey, SecurityError> {
        if let Some(cached) =
            self.cache.read().unwrap_or_else(PoisonError::into_inner).get(&key_type)
        {
            return Ok(cached.key.clone());
        }

        // Storage is read under the write lock so a concurrent erase cannot
        // land between the read and the cache fill
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(cached) = cache.get(&key_type) {
            return Ok(cached.key.clone());
        }

        let slot = Slot::MasterKey(key_type);
        let bytes = self.storage.read(slot)?.ok_or(SecurityError::NotFound { key_type })?;
        let key = SecretKey::from_slice(&bytes)
            .map_err(|_| StorageError::Corrupt { slot: slot.id(), len: bytes.len() })?;
        let cached = cache.entry(key_type).or_insert(CachedKey { key, persisted: true });

        tracing::debug!(key_type = %key_type, "master key loaded from storage");
        Ok(cached.key.clone())
    }

    /// Erase a master key from memory and from the collaborator.
    ///
    /// Idempotent: erasing an absent key succeeds.
    pub fn erase_master_key(&self, key_type: MasterKeyType) -> Result<(), SecurityError> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        self.storage.erase(Slot::MasterKey(key_type))?;
        cache.remove(&key_type);
        drop(cache);

        tracing::info!(key_type = %key_type, "master key erased");
        Ok(())
    }

    /// Persist every key that so far lives only in memory.
    ///
    /// Returns the number of keys written. Stops at the first storage error;
    /// keys written before it stay marked persisted.
    pub fn flush(&self) -> Result<usize, SecurityError> {
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);

        let mut flushed = 0;
        for (key_type, cached) in cache.iter_mut().filter(|(_, cached)| !cached.persisted) {
            self.storage.write(Slot::MasterKey(*key_type), cached.key.expose())?;
            cached.persisted = true;
            flushed += 1;
        }

        if flushed > 0 {
            tracing::info!(flushed, "volatile master keys flushed");
        }
        Ok(flushed)
    }

    /// True if a key is available for `key_type` (in memory or persisted).
    pub fn contains(&self, key_type: MasterKeyType) -> Result<bool, SecurityError> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        if cache.contains_key(&key_type) {
            return Ok(true);
        }
        Ok(self.storage.read(Slot::MasterKey(key_type))?.is_some())
    }

    /// Every master context with a key available, in tag order.
    pub fn provisioned(&self) -> Result<Vec<MasterKeyType>, SecurityError> {
        let mut provisioned = Vec::new();
        for key_type in MasterKeyType::ALL {
            if self.contains(key_type)? {
                provisioned.push(key_type);
            }
        }
        Ok(provisioned)
    }
}
