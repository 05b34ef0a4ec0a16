//! Security engine
//!
//! Wires the key store, time-sync counter, clock and primitive provider
//! together. Every cryptographic operation goes through [`SecurityEngine`]:
//! no other code path reads master key bytes.
//!
//! # Key resolution
//!
//! ```text
//! external key ──────────────────────────────────► used as is
//! external IKM ──► HKDF(ikm, "sidsec-ext" ‖ wire_tag ‖ context) ──► key
//! Master(m)    ──► KeyStore::load_master_key(m) ──► key
//! *Derived(m)  ──► derive_key(load_master_key(m), reference) ──► key
//! ```
//!
//! # Reference resolution
//!
//! An explicit reference always wins. Otherwise time-derived keys read the
//! clock and everything else reads the time-sync counter. Encryption and
//! verification only read the counter; [`TimeSyncCounter::advance`] is the
//! caller's decision.

use std::sync::Arc;

use sidsec_crypto::{CryptoProvider, KEY_SIZE, SecretKey};

use crate::{
    clock::Clock,
    config::{EngineConfig, MASTER_KEY_TTL_SECS, TIME_TOLERANCE_SECS},
    counter::TimeSyncCounter,
    derivation::{derivation_context, derive_key},
    error::SecurityError,
    key_type::{Derivation, KeyClass, KeyType},
    nonce::DeviceId,
    replay::ReplayGuard,
    store::{KeyStorage, KeyStore},
};

/// Label for keys derived from caller-supplied keying material.
const EXTERNAL_IKM_LABEL: &[u8] = b"sidsec-ext";

/// Entry point for every security operation.
pub struct SecurityEngine<P: CryptoProvider, S: KeyStorage, C: Clock> {
    pub(crate) provider: P,
    store: KeyStore<S>,
    counter: Arc<TimeSyncCounter>,
    pub(crate) clock: C,
    pub(crate) config: EngineConfig,
    replay: ReplayGuard,
}

impl<P: CryptoProvider, S: KeyStorage, C: Clock> SecurityEngine<P, S, C> {
    /// Create an engine with the default configuration.
    pub fn new(provider: P, store: KeyStore<S>, counter: Arc<TimeSyncCounter>, clock: C) -> Self {
        Self {
            provider,
            store,
            counter,
            clock,
            config: EngineConfig::default(),
            replay: ReplayGuard::new(),
        }
    }

    /// Replace the configuration.
    #[must_use]
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Master key store.
    pub fn store(&self) -> &KeyStore<S> {
        &self.store
    }

    /// Shared time-sync counter.
    pub fn counter(&self) -> &Arc<TimeSyncCounter> {
        &self.counter
    }

    /// Time source.
    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Active configuration.
    pub fn config(&self) -> EngineConfig {
        self.config
    }

    /// Receive-side replay state.
    pub fn replay_guard(&self) -> &ReplayGuard {
        &self.replay
    }

    /// Derive the key for a time- or counter-referenced `key_type`.
    ///
    /// Deterministic: the same stored master key and reference always give
    /// the same key.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: `key_type` is a master type
    /// - `NotFound`: no master key stored for the context
    pub fn derive(&self, key_type: KeyType, reference: u32) -> Result<SecretKey, SecurityError> {
        if !key_type.is_derived() {
            return Err(SecurityError::InvalidParameter("master key types are not derived"));
        }
        self.resolve_key(key_type, reference, None, None)
    }

    /// Reference an operation runs under.
    pub fn resolve_reference(&self, key_type: KeyType, explicit: Option<u32>) -> u32 {
        explicit.unwrap_or_else(|| match key_type.derivation() {
            Derivation::TimeReferenced => self.clock.now_secs(),
            Derivation::Master | Derivation::CounterReferenced => self.counter.current(),
        })
    }

    pub(crate) fn require_class(key_type: KeyType, class: KeyClass) -> Result<(), SecurityError> {
        if key_type.class() == class {
            return Ok(());
        }
        Err(SecurityError::InvalidParameter(match class {
            KeyClass::Confidentiality => "key type is not a confidentiality context",
            KeyClass::Authentication => "key type is not an authentication context",
            KeyClass::Identifier => "key type is not an identifier context",
        }))
    }

    /// Key for one operation. The returned key is zeroized when dropped.
    pub(crate) fn resolve_key(
        &self,
        key_type: KeyType,
        reference: u32,
        external_key: Option<&SecretKey>,
        external_ikm: Option<&[u8]>,
    ) -> Result<SecretKey, SecurityError> {
        if let Some(key) = external_key {
            tracing::debug!(%key_type, reference, "using external key");
            return Ok(key.clone());
        }

        if let Some(ikm) = external_ikm {
            return self.key_from_ikm(ikm, key_type, reference);
        }

        let master = self.store.load_master_key(key_type.master())?;
        if key_type.is_derived() {
            derive_key(&self.provider, self.config.kdf, &master, key_type, reference)
        } else {
            Ok(master)
        }
    }

    fn key_from_ikm(
        &self,
        ikm: &[u8],
        key_type: KeyType,
        reference: u32,
    ) -> Result<SecretKey, SecurityError> {
        if ikm.is_empty() {
            return Err(SecurityError::InvalidLength {
                field: "external ikm",
                expected: KEY_SIZE,
                actual: 0,
            });
        }

        let context = derivation_context(key_type.derivation(), reference).to_be_bytes();
        let info = [EXTERNAL_IKM_LABEL, &[key_type.wire_tag()], &context].concat();

        let mut okm = zeroize::Zeroizing::new([0u8; KEY_SIZE]);
        self.provider.hkdf_sha256(ikm, &info, &mut okm[..])?;

        tracing::debug!(%key_type, reference, "derived key from external ikm");
        Ok(SecretKey::new(*okm))
    }

    /// Reject time references outside the receiver's freshness window.
    ///
    /// Accepts references up to `MASTER_KEY_TTL_SECS + TIME_TOLERANCE_SECS`
    /// old and `TIME_TOLERANCE_SECS` ahead of the clock.
    pub(crate) fn check_fresh(&self, key_type: KeyType, reference: u32) -> Result<(), SecurityError> {
        if key_type.derivation() != Derivation::TimeReferenced {
            return Ok(());
        }

        let now = self.clock.now_secs();
        let age = i64::from(now.wrapping_sub(reference) as i32);
        let max_age = i64::from(MASTER_KEY_TTL_SECS + TIME_TOLERANCE_SECS);
        let max_ahead = -i64::from(TIME_TOLERANCE_SECS);

        if age < max_ahead || age > max_age {
            tracing::warn!(%key_type, reference, now, "stale time reference");
            return Err(SecurityError::StaleReference { reference, now });
        }
        Ok(())
    }

    /// Reject counter references that are not newer than the stream's last.
    pub(crate) fn check_replay(
        &self,
        key_type: KeyType,
        source: Option<DeviceId>,
        reference: u32,
    ) -> Result<(), SecurityError> {
        if key_type.derivation() != Derivation::CounterReferenced {
            return Ok(());
        }

        self.replay.check(key_type.master(), source, reference).inspect_err(|_| {
            tracing::warn!(%key_type, reference, "replayed counter reference");
        })
    }

    /// Record an authenticated counter reference.
    ///
    /// Re-checks under the replay lock, so a concurrent receiver that
    /// authenticated the same reference first wins and this call fails.
    pub(crate) fn commit_reference(
        &self,
        key_type: KeyType,
        source: Option<DeviceId>,
        reference: u32,
    ) -> Result<(), SecurityError> {
        if key_type.derivation() != Derivation::CounterReferenced {
            return Ok(());
        }

        self.replay.commit(key_type.master(), source, reference).inspect_err(|_| {
            tracing::warn!(%key_type, reference, "counter reference committed concurrently");
        })
    }
}

/// Allocate a scratch buffer holding a copy of `data`.
pub(crate) fn scratch_copy(data: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let mut buffer = Vec::new();
    buffer.try_reserve_exact(data.len()).map_err(|_| SecurityError::OutOfResources)?;
    buffer.extend_from_slice(data);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use sidsec_crypto::SoftwareCrypto;

    use super::*;
    use crate::{clock::ManualClock, key_type::MasterKeyType, store::MemoryStorage};

    fn engine(now: u32) -> SecurityEngine<SoftwareCrypto, MemoryStorage, ManualClock> {
        let store = KeyStore::new(MemoryStorage::new());
        store.store_master_key(MasterKeyType::Wan, &[0x11; 16], true).unwrap();
        SecurityEngine::new(
            SoftwareCrypto::new(),
            store,
            Arc::new(TimeSyncCounter::new(40)),
            ManualClock::new(now),
        )
    }

    #[test]
    fn explicit_reference_wins() {
        let engine = engine(5000);
        assert_eq!(engine.resolve_reference(KeyType::TimeDerived(MasterKeyType::Wan), Some(1)), 1);
    }

    #[test]
    fn reference_source_follows_derivation() {
        let engine = engine(5000);
        assert_eq!(engine.resolve_reference(KeyType::TimeDerived(MasterKeyType::Wan), None), 5000);
        assert_eq!(engine.resolve_reference(KeyType::CounterDerived(MasterKeyType::Wan), None), 40);
        assert_eq!(engine.resolve_reference(KeyType::Master(MasterKeyType::Wan), None), 40);
    }

    #[test]
    fn derive_rejects_master_types() {
        let result = engine(0).derive(KeyType::Master(MasterKeyType::Wan), 0);
        assert!(matches!(result, Err(SecurityError::InvalidParameter(_))));
    }

    #[test]
    fn derive_without_master_is_not_found() {
        let result = engine(0).derive(KeyType::TimeDerived(MasterKeyType::Pan), 0);
        assert_eq!(result, Err(SecurityError::NotFound { key_type: MasterKeyType::Pan }));
    }

    #[test]
    fn external_key_bypasses_store() {
        let engine = engine(0);
        let external = SecretKey::new([0x77; 16]);
        let key = engine
            .resolve_key(KeyType::Master(MasterKeyType::App), 0, Some(&external), None)
            .unwrap();
        assert_eq!(key, external);
    }

    #[test]
    fn external_ikm_depends_on_reference() {
        let engine = engine(0);
        let key_type = KeyType::CounterDerived(MasterKeyType::PanAuth);
        let a = engine.resolve_key(key_type, 1, None, Some(b"shared secret".as_slice())).unwrap();
        let b = engine.resolve_key(key_type, 2, None, Some(b"shared secret".as_slice())).unwrap();
        assert_ne!(a, b);

        let empty = engine.resolve_key(key_type, 1, None, Some(&[][..]));
        assert!(matches!(empty, Err(SecurityError::InvalidLength { .. })));
    }

    #[test]
    fn freshness_window_bounds() {
        let engine = engine(10_000);
        let key_type = KeyType::TimeDerived(MasterKeyType::Wan);

        assert!(engine.check_fresh(key_type, 10_000).is_ok());
        assert!(engine.check_fresh(key_type, 10_030).is_ok());
        assert!(engine.check_fresh(key_type, 10_031).is_err());
        assert!(engine.check_fresh(key_type, 10_000 - 3630).is_ok());
        assert_eq!(
            engine.check_fresh(key_type, 10_000 - 3631),
            Err(SecurityError::StaleReference { reference: 6369, now: 10_000 })
        );

        // Counter references are not time-checked
        assert!(engine.check_fresh(KeyType::CounterDerived(MasterKeyType::Wan), 0).is_ok());
    }

    #[test]
    fn replay_applies_to_counter_keys_only() {
        let engine = engine(0);
        let counter_type = KeyType::CounterDerived(MasterKeyType::Wan);
        engine.commit_reference(counter_type, None, 5).unwrap();
        assert!(engine.check_replay(counter_type, None, 5).is_err());
        assert!(engine.commit_reference(counter_type, None, 5).is_err());

        let master_type = KeyType::Master(MasterKeyType::Wan);
        engine.commit_reference(master_type, None, 5).unwrap();
        engine.commit_reference(master_type, None, 5).unwrap();
        assert!(engine.check_replay(master_type, None, 5).is_ok());
    }
}
