//! Software primitives over the RustCrypto crates

use aes::Aes128;
use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{AeadInPlace, KeyInit},
};
use cmac::Cmac;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::{
    error::CryptoError,
    provider::{
        CMAC_SIZE, CryptoProvider, GCM_NONCE_SIZE, GCM_TAG_SIZE, HMAC_SHA256_SIZE, tags_match,
    },
    secret::SecretKey,
};

type HmacSha256 = Hmac<Sha256>;
type AesCmac = Cmac<Aes128>;

/// Portable software implementation of [`CryptoProvider`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SoftwareCrypto;

impl SoftwareCrypto {
    /// Create a new software provider.
    pub fn new() -> Self {
        Self
    }

    fn gcm(key: &SecretKey) -> Result<Aes128Gcm, CryptoError> {
        Aes128Gcm::new_from_slice(key.expose())
            .map_err(|_| key_rejected("AES-128-GCM", key.expose().len()))
    }
}

/// Backend refused key material it should accept.
fn key_rejected(primitive: &str, key_len: usize) -> CryptoError {
    CryptoError::Backend(format!("{primitive} rejected a {key_len}-byte key"))
}

impl CryptoProvider for SoftwareCrypto {
    fn aead_encrypt(
        &self,
        key: &SecretKey,
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
    ) -> Result<[u8; GCM_TAG_SIZE], CryptoError> {
        let cipher = Self::gcm(key)?;
        let tag = cipher
            .encrypt_in_place_detached(Nonce::from_slice(nonce), aad, buffer)
            .map_err(|_| CryptoError::Backend("AES-GCM encryption failed".to_string()))?;

        let mut out = [0u8; GCM_TAG_SIZE];
        out.copy_from_slice(&tag);
        Ok(out)
    }

    fn aead_decrypt(
        &self,
        key: &SecretKey,
        nonce: &[u8; GCM_NONCE_SIZE],
        aad: &[u8],
        buffer: &mut [u8],
        tag: &[u8],
    ) -> Result<(), CryptoError> {
        if tag.is_empty() || tag.len() > GCM_TAG_SIZE {
            return Err(CryptoError::InvalidTagLength(tag.len()));
        }

        let cipher = Self::gcm(key)?;
        let nonce = Nonce::from_slice(nonce);

        // GCM's CTR keystream is an involution, so sealing the ciphertext
        // yields the plaintext candidate. Sealing that candidate again
        // reproduces the ciphertext together with its genuine tag.
        cipher
            .encrypt_in_place_detached(nonce, aad, buffer)
            .map_err(|_| CryptoError::Backend("AES-GCM keystream failed".to_string()))?;

        let mut scratch = Zeroizing::new(buffer.to_vec());
        let expected = match cipher.encrypt_in_place_detached(nonce, aad, &mut scratch) {
            Ok(expected) => expected,
            Err(_) => {
                buffer.zeroize();
                return Err(CryptoError::Backend("AES-GCM tag computation failed".to_string()));
            },
        };

        if tags_match(&expected, tag) {
            Ok(())
        } else {
            buffer.zeroize();
            Err(CryptoError::TagMismatch)
        }
    }

    fn cmac(&self, key: &SecretKey, parts: &[&[u8]]) -> Result<[u8; CMAC_SIZE], CryptoError> {
        let mut mac = <AesCmac as KeyInit>::new_from_slice(key.expose())
            .map_err(|_| key_rejected("AES-CMAC", key.expose().len()))?;
        for part in parts {
            mac.update(part);
        }

        let mut out = [0u8; CMAC_SIZE];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }

    fn hmac_sha256(
        &self,
        key: &[u8],
        parts: &[&[u8]],
    ) -> Result<[u8; HMAC_SHA256_SIZE], CryptoError> {
        let mut mac = <HmacSha256 as KeyInit>::new_from_slice(key)
            .map_err(|_| key_rejected("HMAC-SHA256", key.len()))?;
        for part in parts {
            mac.update(part);
        }

        let mut out = [0u8; HMAC_SHA256_SIZE];
        out.copy_from_slice(&mac.finalize().into_bytes());
        Ok(out)
    }

    fn hkdf_sha256(&self, ikm: &[u8], info: &[u8], out: &mut [u8]) -> Result<(), CryptoError> {
        let hkdf = Hkdf::<Sha256>::new(None, ikm);
        hkdf.expand(info, out).map_err(|_| CryptoError::InvalidOutputLength(out.len()))
    }
}
