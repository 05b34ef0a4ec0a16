//! Scoped secret key material.

use std::fmt;

use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::CryptoError;

/// Width of every symmetric key in the hierarchy (AES-128).
pub const KEY_SIZE: usize = 16;

/// A 128-bit symmetric key that is zeroized when dropped.
///
/// Derived keys are produced as `SecretKey` values owned by the call that
/// derived them. Dropping the value (normal return, `?` early return or
/// unwinding) wipes the bytes.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey([u8; KEY_SIZE]);

impl SecretKey {
    /// Wrap raw key bytes.
    pub fn new(bytes: [u8; KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// Copy key bytes out of a slice.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength`: slice is not exactly [`KEY_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength { expected: KEY_SIZE, actual: bytes.len() });
        }

        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(bytes);
        let secret = Self(key);
        key.zeroize();
        Ok(secret)
    }

    /// Raw key bytes, for handing to a primitive.
    pub fn expose(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey([REDACTED])")
    }
}

impl PartialEq for SecretKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.ct_eq(&other.0).into()
    }
}

impl Eq for SecretKey {}
