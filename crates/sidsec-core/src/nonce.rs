//! Nonce and AAD construction
//!
//! # Nonce layout (12 bytes)
//!
//! ```text
//! ┌──────────────────┬──────────────┬──────────────────┐
//! │ source id (5)    │ sequence (3) │ reference (4 BE) │
//! └──────────────────┴──────────────┴──────────────────┘
//! ```
//!
//! The sequence number is masked to its declared width and right-aligned in
//! its field. A nonce is unique for a derived key as long as the sender never
//! reuses a sequence number under one reference.
//!
//! # AAD profiles
//!
//! - Link (authentication and identifier contexts): fixed 8 bytes,
//!   `key_tag || extra` zero-padded
//! - Combined (confidentiality contexts): `key_tag || extra`, at most 17 bytes

use std::fmt;

use crate::{
    config::{DEVICE_ID_SIZE, LINK_AAD_SIZE, MAX_AAD_SIZE, NONCE_SEQ_SIZE, NONCE_SIZE},
    error::SecurityError,
    key_type::{KeyClass, KeyType},
};

/// Fixed-width source device identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceId([u8; DEVICE_ID_SIZE]);

impl DeviceId {
    /// Wrap raw identity bytes.
    pub const fn new(bytes: [u8; DEVICE_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Parse an identity from a slice.
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: slice is not [`DEVICE_ID_SIZE`] bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SecurityError> {
        let raw = <[u8; DEVICE_ID_SIZE]>::try_from(bytes).map_err(|_| {
            SecurityError::InvalidLength {
                field: "device id",
                expected: DEVICE_ID_SIZE,
                actual: bytes.len(),
            }
        })?;
        Ok(Self(raw))
    }

    /// Raw identity bytes.
    pub const fn as_bytes(&self) -> &[u8; DEVICE_ID_SIZE] {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// A sequence number together with its declared wire width (1 to 4 bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceNumber {
    value: u32,
    width: u8,
}

impl SequenceNumber {
    /// Sequence number `value` carried in `width` bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: `width` is outside 1..=4
    pub fn new(value: u32, width: u8) -> Result<Self, SecurityError> {
        if !(1..=4).contains(&width) {
            return Err(SecurityError::InvalidParameter("sequence width must be 1 to 4 bytes"));
        }
        Ok(Self { value, width })
    }

    /// Declared width in bytes.
    pub const fn width(self) -> u8 {
        self.width
    }

    /// Value masked to its declared width.
    pub const fn truncated(self) -> u32 {
        if self.width >= 4 { self.value } else { self.value & ((1 << (self.width * 8)) - 1) }
    }

    /// Big-endian bytes as placed in the nonce and link header.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: width exceeds the 3-byte nonce field
    pub fn nonce_field(self) -> Result<[u8; NONCE_SEQ_SIZE], SecurityError> {
        if usize::from(self.width) > NONCE_SEQ_SIZE {
            return Err(SecurityError::InvalidParameter(
                "sequence width exceeds the 3-byte nonce field",
            ));
        }

        let be = self.truncated().to_be_bytes();
        let mut field = [0u8; NONCE_SEQ_SIZE];
        field.copy_from_slice(&be[4 - NONCE_SEQ_SIZE..]);
        Ok(field)
    }
}

/// AEAD nonce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Nonce([u8; NONCE_SIZE]);

impl Nonce {
    /// Raw nonce bytes.
    pub const fn as_bytes(&self) -> &[u8; NONCE_SIZE] {
        &self.0
    }
}

/// Build the nonce for one message.
///
/// `key_type` does not change the layout; it is checked so a nonce is never
/// built for a context that has no AEAD.
///
/// # Errors
///
/// - `InvalidParameter`: `key_type` is not a confidentiality context, or the
///   sequence width exceeds 3 bytes
pub fn build_nonce(
    key_type: KeyType,
    source: &DeviceId,
    sequence: SequenceNumber,
    reference: u32,
) -> Result<Nonce, SecurityError> {
    if key_type.class() != KeyClass::Confidentiality {
        return Err(SecurityError::InvalidParameter("nonce requested for a non-AEAD key type"));
    }

    let mut nonce = [0u8; NONCE_SIZE];

    // Source identity (5 bytes)
    nonce[..DEVICE_ID_SIZE].copy_from_slice(source.as_bytes());

    // Sequence number (3 bytes)
    nonce[DEVICE_ID_SIZE..DEVICE_ID_SIZE + NONCE_SEQ_SIZE].copy_from_slice(&sequence.nonce_field()?);

    // Reference (4 bytes)
    nonce[DEVICE_ID_SIZE + NONCE_SEQ_SIZE..].copy_from_slice(&reference.to_be_bytes());

    Ok(Nonce(nonce))
}

/// AAD layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AadProfile {
    /// Fixed 8-byte header for link MACs
    Link,
    /// Variable header up to 17 bytes for AEAD frames
    Combined,
}

impl AadProfile {
    /// Profile used by a key type.
    pub const fn for_key_type(key_type: KeyType) -> Self {
        match key_type.class() {
            KeyClass::Confidentiality => Self::Combined,
            KeyClass::Authentication | KeyClass::Identifier => Self::Link,
        }
    }
}

/// Authenticated-but-not-encrypted header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Aad {
    bytes: [u8; MAX_AAD_SIZE],
    len: usize,
}

impl Aad {
    /// Header bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Profile-dependent width.
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Never true: every header carries the key tag.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Build the AAD for `key_type` from transport-provided `extra` bytes.
///
/// # Errors
///
/// - `InvalidLength`: `extra` does not fit the profile
pub fn build_aad(key_type: KeyType, extra: &[u8]) -> Result<Aad, SecurityError> {
    let profile = AadProfile::for_key_type(key_type);
    let capacity = match profile {
        AadProfile::Link => LINK_AAD_SIZE,
        AadProfile::Combined => MAX_AAD_SIZE,
    };

    if extra.len() + 1 > capacity {
        return Err(SecurityError::InvalidLength {
            field: "aad",
            expected: capacity - 1,
            actual: extra.len(),
        });
    }

    let mut bytes = [0u8; MAX_AAD_SIZE];
    bytes[0] = key_type.wire_tag();
    bytes[1..=extra.len()].copy_from_slice(extra);

    let len = match profile {
        AadProfile::Link => LINK_AAD_SIZE,
        AadProfile::Combined => extra.len() + 1,
    };

    Ok(Aad { bytes, len })
}
