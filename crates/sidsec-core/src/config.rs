//! Protocol constants and engine configuration.
//!
//! Widths and lifetimes are fixed at build time. The only runtime choice is
//! the key derivation scheme, which both ends of a link must agree on.

pub use sidsec_crypto::KEY_SIZE;

/// Lifetime of a time-referenced derived key (one hour).
pub const MASTER_KEY_TTL_SECS: u32 = 3600;

/// Default tx_uuid refresh interval (a quarter of the key TTL).
pub const TX_UUID_REFRESH_SECS: u32 = MASTER_KEY_TTL_SECS / 4;

/// Lower bound on the tx_uuid refresh interval.
pub const TX_UUID_REFRESH_FLOOR_SECS: u32 = 30;

/// Tolerated clock skew between peers.
pub const TIME_TOLERANCE_SECS: u32 = 30;

/// Width of a device identity.
pub const DEVICE_ID_SIZE: usize = 5;

/// Width of the truncated AEAD tag on compact links.
pub const AEAD_TAG_SIZE: usize = 4;

/// Smallest MAC tag a profile may use.
pub const MAC_TAG_MIN: usize = 4;

/// Largest MAC tag a profile may use (full CMAC block).
pub const MAC_TAG_MAX: usize = 16;

/// AEAD nonce width.
pub const NONCE_SIZE: usize = sidsec_crypto::GCM_NONCE_SIZE;

/// Width of the sequence number field inside the nonce.
pub const NONCE_SEQ_SIZE: usize = 3;

/// Width of the fixed link-MAC header.
pub const LINK_AAD_SIZE: usize = 8;

/// Largest AAD the combined profile accepts.
pub const MAX_AAD_SIZE: usize = 17;

/// Default rotating identifier width.
pub const TX_UUID_SIZE: usize = 5;

/// Largest rotating identifier width.
pub const TX_UUID_MAX_SIZE: usize = 16;

/// Number of counter values a receiver tries ahead of its expectation.
pub const TX_UUID_COUNTER_WINDOW: u32 = 16;

/// Key derivation construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KdfScheme {
    /// NIST SP 800-108 counter mode with AES-128-CMAC as the PRF.
    #[default]
    CmacCounter,
    /// HKDF-SHA256 with the master key as input keying material.
    HkdfSha256,
}

/// Runtime engine configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct EngineConfig {
    /// Derivation scheme for time- and counter-referenced keys
    pub kdf: KdfScheme,
}

/// Identifier refresh interval for a given key TTL.
///
/// A quarter of the TTL, never below [`TX_UUID_REFRESH_FLOOR_SECS`].
pub const fn refresh_interval_secs(key_ttl_secs: u32) -> u32 {
    let quarter = key_ttl_secs / 4;
    if quarter < TX_UUID_REFRESH_FLOOR_SECS { TX_UUID_REFRESH_FLOOR_SECS } else { quarter }
}
