//! Property tests for the security engine
//!
//! These tests verify the engine's core guarantees over random inputs:
//! - Derivation is deterministic across independent engines
//! - Distinct derived key types never share key bytes
//! - AEAD round-trips, and any single-bit change is rejected
//! - Nonces never repeat for distinct sequence numbers under one key
//! - The time-sync counter advances strictly
//! - tx_uuid verification succeeds exactly inside its window

use std::{collections::HashSet, sync::Arc};

use proptest::prelude::*;
use sidsec_core::{
    DeviceId, EncryptionParams, KdfScheme, KeyType, ManualClock, MasterKeyType, MemoryStorage,
    SecurityEngine, SecurityError, SequenceNumber, TimeSyncCounter, TxUuidKind, TxUuidParams,
    build_nonce, config::EngineConfig, store::KeyStore,
};
use sidsec_crypto::SoftwareCrypto;

type Engine = SecurityEngine<SoftwareCrypto, MemoryStorage, ManualClock>;

/// Engine with every master context provisioned from `master`.
fn engine_with(master: [u8; 16], scheme: KdfScheme, now: u32) -> Engine {
    let store = KeyStore::new(MemoryStorage::new());
    for key_type in MasterKeyType::ALL {
        store.store_master_key(key_type, &master, true).expect("store master key");
    }

    SecurityEngine::new(
        SoftwareCrypto::new(),
        store,
        Arc::new(TimeSyncCounter::new(0)),
        ManualClock::new(now),
    )
    .with_config(EngineConfig { kdf: scheme })
}

fn master_type() -> impl Strategy<Value = MasterKeyType> {
    proptest::sample::select(MasterKeyType::ALL.to_vec())
}

fn scheme() -> impl Strategy<Value = KdfScheme> {
    prop_oneof![Just(KdfScheme::CmacCounter), Just(KdfScheme::HkdfSha256)]
}

fn derived_types() -> Vec<KeyType> {
    MasterKeyType::ALL
        .into_iter()
        .flat_map(|m| [KeyType::TimeDerived(m), KeyType::CounterDerived(m)])
        .collect()
}

#[test]
fn prop_derivation_is_deterministic() {
    proptest!(|(
        master in any::<[u8; 16]>(),
        master_type in master_type(),
        counter in any::<bool>(),
        reference in any::<u32>(),
        scheme in scheme(),
    )| {
        let key_type = if counter {
            KeyType::CounterDerived(master_type)
        } else {
            KeyType::TimeDerived(master_type)
        };

        // Sender and receiver hold the same master but share nothing else
        let sender = engine_with(master, scheme, 0);
        let receiver = engine_with(master, scheme, 0);

        prop_assert_eq!(
            sender.derive(key_type, reference).expect("sender derive"),
            receiver.derive(key_type, reference).expect("receiver derive")
        );
    });
}

#[test]
fn prop_derived_types_are_separated() {
    proptest!(|(
        master in any::<[u8; 16]>(),
        reference in any::<u32>(),
        scheme in scheme(),
    )| {
        let engine = engine_with(master, scheme, 0);

        let keys: HashSet<[u8; 16]> = derived_types()
            .into_iter()
            .map(|key_type| *engine.derive(key_type, reference).expect("derive").expose())
            .collect();

        prop_assert_eq!(keys.len(), derived_types().len());
    });
}

#[test]
fn prop_aead_roundtrip_and_tamper() {
    proptest!(|(
        plaintext in prop::collection::vec(any::<u8>(), 1..64),
        aad in prop::collection::vec(any::<u8>(), 1..=16),
        source in any::<[u8; 5]>(),
        sequence in any::<u32>(),
        reference in any::<u32>(),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    )| {
        let engine = engine_with([0x5A; 16], KdfScheme::CmacCounter, 0);
        let sequence = SequenceNumber::new(sequence, 3).expect("sequence");
        let params = EncryptionParams::new(
            KeyType::Master(MasterKeyType::App),
            DeviceId::new(source),
            sequence,
        )
        .with_aad(&aad)
        .with_reference(reference);

        let sealed = engine.encrypt(&params, &plaintext).expect("encrypt");
        prop_assert_eq!(sealed.ciphertext.len(), plaintext.len());

        let opened = engine.decrypt(&params, &sealed.ciphertext, &sealed.tag).expect("decrypt");
        prop_assert_eq!(&opened, &plaintext);

        // Ciphertext
        let mut ciphertext = sealed.ciphertext.clone();
        let idx = flip.index(ciphertext.len());
        ciphertext[idx] ^= 1 << bit;
        prop_assert_eq!(
            engine.decrypt(&params, &ciphertext, &sealed.tag),
            Err(SecurityError::AuthenticationFailed)
        );

        // Tag
        let mut tag = sealed.tag;
        tag[flip.index(tag.len())] ^= 1 << bit;
        prop_assert_eq!(
            engine.decrypt(&params, &sealed.ciphertext, &tag),
            Err(SecurityError::AuthenticationFailed)
        );

        // AAD
        let mut tampered_aad = aad.clone();
        tampered_aad[flip.index(aad.len())] ^= 1 << bit;
        let tampered = params.with_aad(&tampered_aad);
        prop_assert_eq!(
            engine.decrypt(&tampered, &sealed.ciphertext, &sealed.tag),
            Err(SecurityError::AuthenticationFailed)
        );
    });
}

#[test]
fn prop_nonces_do_not_repeat() {
    proptest!(|(
        source in any::<[u8; 5]>(),
        reference in any::<u32>(),
        start in 0u32..0x00FF_0000,
        count in 1u32..2048,
    )| {
        let key_type = KeyType::TimeDerived(MasterKeyType::Wan);
        let source = DeviceId::new(source);

        let nonces: HashSet<_> = (start..start + count)
            .map(|n| {
                let sequence = SequenceNumber::new(n, 3).expect("sequence");
                build_nonce(key_type, &source, sequence, reference).expect("nonce")
            })
            .collect();

        prop_assert_eq!(nonces.len(), count as usize);
    });
}

#[test]
fn prop_counter_advances_strictly() {
    proptest!(|(initial in any::<u32>(), steps in 1usize..256)| {
        let counter = TimeSyncCounter::new(initial);
        let mut previous = counter.current();

        for _ in 0..steps {
            let next = counter.advance();
            prop_assert_eq!(next, previous.wrapping_add(1));
            prop_assert_eq!(counter.current(), next);
            previous = next;
        }
    });
}

#[test]
fn prop_tx_uuid_time_window() {
    proptest!(|(
        identity in any::<[u8; 5]>(),
        sent_at in 100_000u32..1_000_000_000,
        offset in -30i64..=30,
        outside in 31i64..5_000,
        negative in any::<bool>(),
    )| {
        let engine = engine_with([0x0F; 16], KdfScheme::CmacCounter, 0);
        let sender = TxUuidParams::new(DeviceId::new(identity), TxUuidKind::Time)
            .with_reference(sent_at);
        let id = engine.generate_tx_uuid(&sender).expect("generate");

        let shifted = |delta: i64| (i64::from(sent_at) + delta) as u32;

        let inside = sender.with_reference(shifted(offset));
        prop_assert_eq!(engine.verify_tx_uuid(&inside, id.as_bytes()), Ok(sent_at));

        let delta = if negative { -outside } else { outside };
        let far = sender.with_reference(shifted(delta));
        let result = engine.verify_tx_uuid(&far, id.as_bytes());
        prop_assert!(result.as_ref().is_err_and(SecurityError::is_not_found), "{:?}", result);
    });
}
