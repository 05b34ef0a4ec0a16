//! Capability interface for cryptographic primitives

use subtle::ConstantTimeEq;

use crate::{error::CryptoError, secret::SecretKey};

/// AES-GCM nonce width (96 bits)
pub const GCM_NONCE_SIZE: usize = 12;

/// Full AES-GCM tag width
pub const GCM_TAG_SIZE: usize = 16;

/// AES-CMAC output width
pub const CMAC_SIZE: usize = 16;

/// HMAC-SHA256 output width
pub const HMAC_SHA256_SIZE: usize = 32;

/// Primitive operations consumed by the key hierarchy.
///
/// Implementations may block internally (e.g. waiting on a hardware
/// accelerator) but must not retain key material after returning.
///
/// # Invariants
///
/// - Outputs are a pure function of the inputs
/// - `aead_decrypt` leaves no plaintext in `buffer` when it returns an error
pub trait CryptoProvider: Send + Sync {
    /// Encrypt `buffer` in place with AES-128-GCM.
    ///
    /// Returns the full 16-byte tag; callers truncate to their profile.
    fn aead_encrypt(
        &self,
        key: &SecretKey,
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<[u8; GCM_TAG_SIZE], CryptoError>;

    /// Decrypt `buffer` in place with AES-128-GCM, verifying a (possibly
    /// truncated) tag.
    ///
    /// # Errors
    ///
    /// - `InvalidTagLength`: tag is empty or longer than [`GCM_TAG_SIZE`]
    /// - `TagMismatch`: tag does not verify; `buffer` has been zeroized
    fn aead_decrypt(
        &self,
        key: &SecretKey,
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<(), CryptoError>;

    /// AES-128-CMAC over the concatenation of `parts`.
    fn cmac(&self, key: &SecretKey, parts: &[&[u8]]) -> Result<[u8; CMAC_SIZE], CryptoError>;

    /// HMAC-SHA256 over the concatenation of `parts`.
    fn hmac_sha256(
        &self,
        key: &[u8],
        parts: &[&[u8]],
    ) -> Result<[u8; HMAC_SHA256_SIZE], CryptoError>;

    /// HKDF-SHA256 extract (no salt) and expand into `out`.
    fn hkdf_sha256(&self, ikm: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), CryptoError>;
}

/// Constant-time check that `truncated` is a prefix of `full`.
///
/// Empty or over-long tags never match.
pub fn tags_match(full: &[u8], truncated: &[u8]) -> bool {
    if truncated.is_empty() || truncated.len() > full.len() {
        return false;
    }

    full[..truncated.len()].ct_eq(truncated).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefix_matches() {
        let full = [1u8, 2, 3, 4, 5, 6];
        assert!(tags_match(&full, &[1, 2, 3, 4]));
        assert!(tags_match(&full, &full));
    }

    #[test]
    fn single_bit_difference_rejected() {
        let full = [1u8, 2, 3, 4, 5, 6];
        assert!(!tags_match(&full, &[1, 2, 3, 5]));
    }

    #[test]
    fn empty_and_overlong_rejected() {
        let full = [1u8, 2, 3, 4];
        assert!(!tags_match(&full, &[]));
        assert!(!tags_match(&full, &[1, 2, 3, 4, 5]));
    }
}
