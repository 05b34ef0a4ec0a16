//! Sidsec Cryptographic Primitives
//!
//! Capability interface for the block-cipher, MAC and hash primitives the
//! key hierarchy is built on, plus a software implementation over the
//! RustCrypto crates. Hardware-accelerated backends implement the same
//! [`CryptoProvider`] trait.
//!
//! # Primitives
//!
//! ```text
//! AES-128-GCM   → confidentiality (tag truncated by the caller's profile)
//! AES-128-CMAC  → link authentication, PRF for key derivation
//! HMAC-SHA256   → rotating identifiers
//! HKDF-SHA256   → alternative key derivation scheme
//! ```
//!
//! # Security
//!
//! Key Material:
//! - [`SecretKey`] is zeroized on drop, on every exit path
//! - `Debug` output never contains key bytes
//!
//! Authenticity:
//! - Tag comparison is constant-time ([`tags_match`])
//! - Failed AEAD verification zeroizes the candidate plaintext before
//!   returning, so no partial plaintext escapes

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
mod provider;
mod secret;
mod software;

pub use error::CryptoError;
pub use provider::{
    CMAC_SIZE, CryptoProvider, GCM_NONCE_SIZE, GCM_TAG_SIZE, HMAC_SHA256_SIZE, tags_match,
};
pub use secret::{KEY_SIZE, SecretKey};
pub use software::SoftwareCrypto;
