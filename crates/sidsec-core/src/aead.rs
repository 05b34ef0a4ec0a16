//! Authenticated encryption for confidentiality contexts
//!
//! AES-128-GCM with the tag truncated to [`AEAD_TAG_SIZE`] bytes. On a failed
//! decryption the scratch buffer is zeroized by the primitive and never
//! returned, so no candidate plaintext escapes.

use sidsec_crypto::CryptoProvider;
use zeroize::Zeroize;

use crate::{
    clock::Clock,
    config::AEAD_TAG_SIZE,
    engine::{SecurityEngine, scratch_copy},
    error::SecurityError,
    key_type::KeyClass,
    nonce::{build_aad, build_nonce},
    params::{EncryptionParams, Sealed},
    store::KeyStorage,
};

impl<P: CryptoProvider, S: KeyStorage, C: Clock> SecurityEngine<P, S, C> {
    /// Encrypt `plaintext` under the key selected by `params`.
    ///
    /// The returned [`Sealed`] carries the reference used, which the caller
    /// transmits when the receiver cannot infer it.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: key type is not a confidentiality context, or
    ///   the sequence width exceeds 3 bytes
    /// - `InvalidLength`: AAD too long
    /// - `NotFound`: no master key for the context
    /// - `OutOfResources`: scratch buffer allocation failed
    /// - `PrimitiveFailure`: the AEAD primitive failed
    pub fn encrypt(
        &self,
        params: &EncryptionParams<'_>,
        plaintext: &[u8],
    ) -> Result<Sealed, SecurityError> {
        let key_type = params.key_type;
        Self::require_class(key_type, KeyClass::Confidentiality)?;

        let reference = self.resolve_reference(key_type, params.reference);
        let nonce = build_nonce(key_type, &params.source, params.sequence, reference)?;
        let aad = build_aad(key_type, params.aad)?;
        let key = self.resolve_key(key_type, reference, params.external_key, None)?;

        let mut buffer = scratch_copy(plaintext)?;
        let full_tag = match self.provider.aead_encrypt(
            &key,
            nonce.as_bytes(),
            aad.as_bytes(),
            &mut buffer,
        ) {
            Ok(tag) => tag,
            Err(err) => {
                buffer.zeroize();
                return Err(err.into());
            },
        };

        let mut tag = [0u8; AEAD_TAG_SIZE];
        tag.copy_from_slice(&full_tag[..AEAD_TAG_SIZE]);

        tracing::debug!(
            %key_type,
            reference,
            source = %params.source,
            len = buffer.len(),
            "encrypted"
        );
        Ok(Sealed { ciphertext: buffer, tag, reference })
    }

    /// Decrypt `ciphertext` and verify its truncated `tag`.
    ///
    /// Time-derived references must be fresh and counter-derived references
    /// must be newer than the last accepted one from the same source. A
    /// counter reference is recorded only after the tag verifies.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed`: tag does not verify (no plaintext returned)
    /// - `StaleReference`: time reference outside the freshness window
    /// - `Replay`: counter reference already accepted
    /// - `InvalidLength`: tag is not [`AEAD_TAG_SIZE`] bytes, or AAD too long
    /// - everything [`Self::encrypt`] can return
    pub fn decrypt(
        &self,
        params: &EncryptionParams<'_>,
        ciphertext: &[u8],
        tag: &[u8],
    ) -> Result<Vec<u8>, SecurityError> {
        let key_type = params.key_type;
        Self::require_class(key_type, KeyClass::Confidentiality)?;

        if tag.len() != AEAD_TAG_SIZE {
            return Err(SecurityError::InvalidLength {
                field: "tag",
                expected: AEAD_TAG_SIZE,
                actual: tag.len(),
            });
        }

        let reference = self.resolve_reference(key_type, params.reference);
        self.check_fresh(key_type, reference)?;
        self.check_replay(key_type, Some(params.source), reference)?;

        let nonce = build_nonce(key_type, &params.source, params.sequence, reference)?;
        let aad = build_aad(key_type, params.aad)?;
        let key = self.resolve_key(key_type, reference, params.external_key, None)?;

        let mut buffer = scratch_copy(ciphertext)?;
        self.provider
            .aead_decrypt(&key, nonce.as_bytes(), aad.as_bytes(), &mut buffer, tag)
            .map_err(SecurityError::from)
            .inspect_err(|err| {
                tracing::warn!(
                    %key_type,
                    reference,
                    source = %params.source,
                    %err,
                    "decrypt failed"
                );
            })?;

        if let Err(err) = self.commit_reference(key_type, Some(params.source), reference) {
            buffer.zeroize();
            return Err(err);
        }

        tracing::debug!(%key_type, reference, source = %params.source, "decrypted");
        Ok(buffer)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sidsec_crypto::{SecretKey, SoftwareCrypto};

    use super::*;
    use crate::{
        clock::ManualClock,
        counter::TimeSyncCounter,
        key_type::{KeyType, MasterKeyType},
        nonce::{DeviceId, SequenceNumber},
        store::{KeyStore, MemoryStorage},
    };

    const SOURCE: DeviceId = DeviceId::new([0xDE, 0xAD, 0xBE, 0xEF, 0x01]);

    fn engine() -> SecurityEngine<SoftwareCrypto, MemoryStorage, ManualClock> {
        let store = KeyStore::new(MemoryStorage::new());
        store.store_master_key(MasterKeyType::Wan, &[0x42; 16], true).unwrap();
        store.store_master_key(MasterKeyType::WanAuth, &[0x43; 16], true).unwrap();
        SecurityEngine::new(
            SoftwareCrypto::new(),
            store,
            Arc::new(TimeSyncCounter::new(100)),
            ManualClock::new(7200),
        )
    }

    fn params<'a>(key_type: KeyType, seq: u32) -> EncryptionParams<'a> {
        EncryptionParams::new(key_type, SOURCE, SequenceNumber::new(seq, 2).unwrap())
    }

    #[test]
    fn roundtrip_with_resolved_reference() {
        let engine = engine();
        let params = params(KeyType::TimeDerived(MasterKeyType::Wan), 1).with_aad(b"hdr");

        let sealed = engine.encrypt(&params, b"hello").unwrap();
        assert_eq!(sealed.reference, 7200);
        assert_eq!(sealed.ciphertext.len(), 5);

        let params = params.with_reference(sealed.reference);
        let plaintext = engine.decrypt(&params, &sealed.ciphertext, &sealed.tag).unwrap();
        assert_eq!(plaintext, b"hello");
    }

    #[test]
    fn encrypt_does_not_advance_counter() {
        let engine = engine();
        let params = params(KeyType::CounterDerived(MasterKeyType::Wan), 1);

        let sealed = engine.encrypt(&params, b"x").unwrap();
        assert_eq!(sealed.reference, 100);
        assert_eq!(engine.counter().current(), 100);
    }

    #[test]
    fn authentication_type_is_rejected() {
        let result = engine().encrypt(&params(KeyType::Master(MasterKeyType::WanAuth), 1), b"x");
        assert!(matches!(result, Err(SecurityError::InvalidParameter(_))));
    }

    #[test]
    fn wrong_tag_width_is_rejected() {
        let engine = engine();
        let params = params(KeyType::Master(MasterKeyType::Wan), 1);
        let result = engine.decrypt(&params, b"abc", &[0; 16]);
        assert_eq!(
            result,
            Err(SecurityError::InvalidLength { field: "tag", expected: 4, actual: 16 })
        );
    }

    #[test]
    fn counter_replay_is_rejected() {
        let engine = engine();
        let params = params(KeyType::CounterDerived(MasterKeyType::Wan), 1).with_reference(500);
        let sealed = engine.encrypt(&params, b"once").unwrap();

        assert!(engine.decrypt(&params, &sealed.ciphertext, &sealed.tag).is_ok());
        assert_eq!(
            engine.decrypt(&params, &sealed.ciphertext, &sealed.tag),
            Err(SecurityError::Replay { reference: 500, last_accepted: 500 })
        );
    }

    #[test]
    fn failed_decrypt_does_not_consume_reference() {
        let engine = engine();
        let params = params(KeyType::CounterDerived(MasterKeyType::Wan), 1).with_reference(9);
        let sealed = engine.encrypt(&params, b"data").unwrap();

        let mut bad_tag = sealed.tag;
        bad_tag[0] ^= 1;
        assert_eq!(
            engine.decrypt(&params, &sealed.ciphertext, &bad_tag),
            Err(SecurityError::AuthenticationFailed)
        );
        assert!(engine.decrypt(&params, &sealed.ciphertext, &sealed.tag).is_ok());
    }

    #[test]
    fn stale_time_reference_is_rejected() {
        let engine = engine();
        let params = params(KeyType::TimeDerived(MasterKeyType::Wan), 1).with_reference(10);
        let sealed = engine.encrypt(&params, b"late").unwrap();

        assert_eq!(
            engine.decrypt(&params, &sealed.ciphertext, &sealed.tag),
            Err(SecurityError::StaleReference { reference: 10, now: 7200 })
        );
    }

    #[test]
    fn external_key_roundtrip() {
        let engine = engine();
        let key = SecretKey::new([0x99; 16]);
        let params = params(KeyType::Master(MasterKeyType::D2d), 3).with_external_key(&key);

        let sealed = engine.encrypt(&params, b"peer").unwrap();
        assert_eq!(engine.decrypt(&params, &sealed.ciphertext, &sealed.tag).unwrap(), b"peer");
    }

    #[test]
    fn missing_master_is_not_found() {
        let result = engine().encrypt(&params(KeyType::Master(MasterKeyType::App), 1), b"x");
        assert_eq!(result, Err(SecurityError::NotFound { key_type: MasterKeyType::App }));
    }
}
