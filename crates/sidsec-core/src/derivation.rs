//! Derived key construction
//!
//! Derived keys are a pure function of the master key, the derivation kind,
//! the master context and a context value computed from the reference:
//!
//! ```text
//! time-derived:    context = reference / MASTER_KEY_TTL_SECS  (one key per window)
//! counter-derived: context = reference                        (one key per value)
//! ```
//!
//! The default construction is NIST SP 800-108 in counter mode with
//! AES-128-CMAC as the PRF. One PRF block covers the 128-bit output:
//!
//! ```text
//! K = CMAC(master, 0x01 || "sidsec-kdf" || kind || master_tag || 0x00 || context_be32 || 0x0080)
//! ```
//!
//! The HKDF-SHA256 alternative uses the master key as IKM and
//! `"sidsec-kdf" || kind || master_tag || context_be32` as info.

use sidsec_crypto::{CryptoProvider, KEY_SIZE, SecretKey};
use zeroize::Zeroize;

use crate::{
    config::{KdfScheme, MASTER_KEY_TTL_SECS},
    error::SecurityError,
    key_type::{Derivation, KeyType},
};

/// Label binding every derived key to this hierarchy.
const KDF_LABEL: &[u8] = b"sidsec-kdf";

/// SP 800-108 block counter (single block).
const KDF_BLOCK_COUNTER: u8 = 0x01;

/// SP 800-108 output length field: 128 bits, big-endian.
const KDF_OUTPUT_BITS: [u8; 2] = (KEY_SIZE as u16 * 8).to_be_bytes();

/// Context value a reference contributes to the derivation.
///
/// Every reference inside one key window maps to the same time-derived key.
pub const fn derivation_context(derivation: Derivation, reference: u32) -> u32 {
    match derivation {
        Derivation::TimeReferenced => reference / MASTER_KEY_TTL_SECS,
        Derivation::Master | Derivation::CounterReferenced => reference,
    }
}

/// Derive the key for `key_type` at `reference` from `master`.
///
/// # Errors
///
/// - `InvalidParameter`: `key_type` is a master type (nothing to derive)
/// - `PrimitiveFailure`: the PRF collaborator failed
pub fn derive_key<P: CryptoProvider + ?Sized>(
    provider: &P,
    scheme: KdfScheme,
    master: &SecretKey,
    key_type: KeyType,
    reference: u32,
) -> Result<SecretKey, SecurityError> {
    let derivation = key_type.derivation();
    if derivation == Derivation::Master {
        return Err(SecurityError::InvalidParameter("master key types are not derived"));
    }

    let kind = [derivation.tag()];
    let master_tag = [key_type.master().tag()];
    let context = derivation_context(derivation, reference).to_be_bytes();

    let mut block = [0u8; KEY_SIZE];
    let result = match scheme {
        KdfScheme::CmacCounter => provider
            .cmac(
                master,
                &[
                    &[KDF_BLOCK_COUNTER],
                    KDF_LABEL,
                    &kind,
                    &master_tag,
                    &[0x00],
                    &context,
                    &KDF_OUTPUT_BITS,
                ],
            )
            .map(|out| block = out),
        KdfScheme::HkdfSha256 => {
            let info = [KDF_LABEL, &kind, &master_tag, &context].concat();
            provider.hkdf_sha256(master.expose(), &info, &mut block)
        },
    };

    let derived = result.map(|()| SecretKey::new(block));
    block.zeroize();
    let derived = derived?;

    tracing::debug!(%key_type, reference, ?scheme, "derived key");
    Ok(derived)
}
