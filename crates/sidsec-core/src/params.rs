//! Per-operation parameter and result types
//!
//! Parameters are built once per message and borrowed by the engine. Results
//! carry the reference value actually used so the caller can transmit it.

use sidsec_crypto::SecretKey;

use crate::{
    config::{AEAD_TAG_SIZE, MAC_TAG_MAX, TX_UUID_MAX_SIZE, TX_UUID_SIZE},
    key_type::KeyType,
    nonce::{DeviceId, SequenceNumber},
};

/// Parameters for one AEAD encryption or decryption.
#[derive(Debug, Clone, Copy)]
pub struct EncryptionParams<'a> {
    /// Key context
    pub key_type: KeyType,
    /// Sending device
    pub source: DeviceId,
    /// Per-source sequence number
    pub sequence: SequenceNumber,
    /// Transport-provided header bytes bound into the AAD
    pub aad: &'a [u8],
    /// Reference to use instead of the clock or counter
    pub reference: Option<u32>,
    /// Caller-supplied key, bypassing the hierarchy
    pub external_key: Option<&'a SecretKey>,
}

impl<'a> EncryptionParams<'a> {
    /// Parameters with no AAD, no explicit reference and no external key.
    pub fn new(key_type: KeyType, source: DeviceId, sequence: SequenceNumber) -> Self {
        Self { key_type, source, sequence, aad: &[], reference: None, external_key: None }
    }

    /// Bind `aad` into the tag.
    #[must_use]
    pub fn with_aad(mut self, aad: &'a [u8]) -> Self {
        self.aad = aad;
        self
    }

    /// Use `reference` instead of resolving one.
    #[must_use]
    pub fn with_reference(mut self, reference: u32) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Use `key` directly.
    #[must_use]
    pub fn with_external_key(mut self, key: &'a SecretKey) -> Self {
        self.external_key = Some(key);
        self
    }
}

/// Ciphertext, truncated tag and the reference it was sealed under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sealed {
    /// Encrypted payload, same length as the plaintext
    pub ciphertext: Vec<u8>,
    /// Truncated AEAD tag
    pub tag: [u8; AEAD_TAG_SIZE],
    /// Reference value used for key derivation and the nonce
    pub reference: u32,
}

/// Parameters for MAC generation and verification.
#[derive(Debug, Clone, Copy)]
pub struct MacParams<'a> {
    /// Key context (authentication class)
    pub key_type: KeyType,
    /// Per-source sequence number, bound into the link header
    pub sequence: SequenceNumber,
    /// Reference to use instead of the clock or counter
    pub reference: Option<u32>,
    /// Input keying material replacing the stored master key
    pub external_ikm: Option<&'a [u8]>,
    /// Sending device, used to scope replay tracking
    pub source: Option<DeviceId>,
}

impl<'a> MacParams<'a> {
    /// Parameters with no explicit reference, no external IKM and no source.
    pub fn new(key_type: KeyType, sequence: SequenceNumber) -> Self {
        Self { key_type, sequence, reference: None, external_ikm: None, source: None }
    }

    /// Use `reference` instead of resolving one.
    #[must_use]
    pub fn with_reference(mut self, reference: u32) -> Self {
        self.reference = Some(reference);
        self
    }

    /// Derive the key from `ikm` instead of the stored master key.
    #[must_use]
    pub fn with_external_ikm(mut self, ikm: &'a [u8]) -> Self {
        self.external_ikm = Some(ikm);
        self
    }

    /// Scope replay tracking to `source`.
    #[must_use]
    pub fn with_source(mut self, source: DeviceId) -> Self {
        self.source = Some(source);
        self
    }
}

/// A MAC tag, truncated to its profile width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MacTag {
    bytes: [u8; MAC_TAG_MAX],
    len: usize,
    /// Reference value the tag was computed under
    pub reference: u32,
}

impl MacTag {
    pub(crate) fn new(full: [u8; MAC_TAG_MAX], len: usize, reference: u32) -> Self {
        let mut bytes = [0u8; MAC_TAG_MAX];
        bytes[..len].copy_from_slice(&full[..len]);
        Self { bytes, len, reference }
    }

    /// Tag bytes as transmitted.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Reference source for rotating identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxUuidKind {
    /// Reference is the clock
    Time,
    /// Reference is the time-sync counter
    Counter,
}

impl TxUuidKind {
    /// Key type the identifier key is derived as.
    pub const fn key_type(self) -> KeyType {
        use crate::key_type::MasterKeyType::TxUuid;
        match self {
            Self::Time => KeyType::TimeDerived(TxUuid),
            Self::Counter => KeyType::CounterDerived(TxUuid),
        }
    }

    pub(crate) const fn tag(self) -> u8 {
        match self {
            Self::Time => 0x01,
            Self::Counter => 0x02,
        }
    }
}

/// Parameters for rotating identifier generation and verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxUuidParams {
    /// Stable identity the identifier is bound to
    pub identity: DeviceId,
    /// Reference source
    pub kind: TxUuidKind,
    /// Identifier width in bytes (1 to 16)
    pub length: usize,
    /// Explicit reference; for verification, the centre of the search window
    pub reference: Option<u32>,
}

impl TxUuidParams {
    /// Default-width identifier with a resolved reference.
    pub fn new(identity: DeviceId, kind: TxUuidKind) -> Self {
        Self { identity, kind, length: TX_UUID_SIZE, reference: None }
    }

    /// Override the identifier width.
    #[must_use]
    pub fn with_length(mut self, length: usize) -> Self {
        self.length = length;
        self
    }

    /// Use `reference` instead of the clock or counter.
    #[must_use]
    pub fn with_reference(mut self, reference: u32) -> Self {
        self.reference = Some(reference);
        self
    }
}

/// A generated rotating identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxUuid {
    bytes: [u8; TX_UUID_MAX_SIZE],
    len: usize,
    /// Reference the identifier was generated under
    pub reference: u32,
    /// Seconds until the caller should generate a fresh identifier
    pub refresh_interval_secs: u32,
}

impl TxUuid {
    pub(crate) fn new(
        full: &[u8],
        len: usize,
        reference: u32,
        refresh_interval_secs: u32,
    ) -> Self {
        let mut bytes = [0u8; TX_UUID_MAX_SIZE];
        bytes[..len].copy_from_slice(&full[..len]);
        Self { bytes, len, reference, refresh_interval_secs }
    }

    /// Identifier bytes as advertised.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key_type::MasterKeyType;

    #[test]
    fn mac_tag_truncates() {
        let tag = MacTag::new([0xAB; MAC_TAG_MAX], 4, 9);
        assert_eq!(tag.as_bytes(), &[0xAB; 4]);
        assert_eq!(tag.reference, 9);
    }

    #[test]
    fn tx_uuid_kind_maps_to_key_type() {
        assert_eq!(TxUuidKind::Time.key_type(), KeyType::TimeDerived(MasterKeyType::TxUuid));
        assert_eq!(TxUuidKind::Counter.key_type(), KeyType::CounterDerived(MasterKeyType::TxUuid));
    }

    #[test]
    fn builders_set_fields() {
        let key = SecretKey::new([1; 16]);
        let sequence = SequenceNumber::new(3, 1).unwrap();
        let params = EncryptionParams::new(
            KeyType::Master(MasterKeyType::App),
            DeviceId::new([0; 5]),
            sequence,
        )
        .with_aad(b"hdr")
        .with_reference(12)
        .with_external_key(&key);

        assert_eq!(params.aad, b"hdr");
        assert_eq!(params.reference, Some(12));
        assert!(params.external_key.is_some());

        let params = TxUuidParams::new(DeviceId::new([0; 5]), TxUuidKind::Time);
        assert_eq!(params.length, 5);
    }
}
