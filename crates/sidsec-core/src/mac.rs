//! Link-layer message authentication
//!
//! AES-128-CMAC over the 8-byte link header and the frame, truncated to the
//! context's tag width:
//!
//! ```text
//! header = wire_tag ‖ reference_be32 ‖ sequence[3]
//! tag    = CMAC(key, header ‖ data)[..width]
//! ```

use sidsec_crypto::{CryptoProvider, tags_match};

use crate::{
    clock::Clock,
    engine::SecurityEngine,
    error::SecurityError,
    key_type::{KeyClass, KeyType},
    nonce::{SequenceNumber, build_aad},
    params::{MacParams, MacTag},
    store::KeyStorage,
};

/// Width of the link header fields after the key tag.
const LINK_HEADER_EXTRA: usize = 7;

fn link_header(
    sequence: SequenceNumber,
    reference: u32,
) -> Result<[u8; LINK_HEADER_EXTRA], SecurityError> {
    let mut header = [0u8; LINK_HEADER_EXTRA];
    header[..4].copy_from_slice(&reference.to_be_bytes());
    header[4..].copy_from_slice(&sequence.nonce_field()?);
    Ok(header)
}

fn tag_width(key_type: KeyType) -> Result<usize, SecurityError> {
    key_type
        .master()
        .mac_tag_size()
        .ok_or(SecurityError::InvalidParameter("key type is not an authentication context"))
}

impl<P: CryptoProvider, S: KeyStorage, C: Clock> SecurityEngine<P, S, C> {
    /// Compute the MAC of `data`.
    ///
    /// # Errors
    ///
    /// - `InvalidParameter`: key type is not an authentication context, or
    ///   the sequence width exceeds 3 bytes
    /// - `NotFound`: no master key and no external IKM
    /// - `PrimitiveFailure`: the CMAC primitive failed
    pub fn generate_mac(
        &self,
        params: &MacParams<'_>,
        data: &[u8],
    ) -> Result<MacTag, SecurityError> {
        let key_type = params.key_type;
        Self::require_class(key_type, KeyClass::Authentication)?;
        let width = tag_width(key_type)?;

        let reference = self.resolve_reference(key_type, params.reference);
        let full = self.compute_mac(params, reference, data)?;

        tracing::debug!(%key_type, reference, width, "mac generated");
        Ok(MacTag::new(full, width, reference))
    }

    /// Verify a MAC over `data`.
    ///
    /// Failure is reported as `AuthenticationFailed` whatever the cause (wrong
    /// key, wrong reference, corrupted data or tag).
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed`: tag does not verify
    /// - `InvalidLength`: tag width does not match the context's profile
    /// - `StaleReference`: time reference outside the freshness window
    /// - `Replay`: counter reference already accepted from this source
    pub fn verify_mac(
        &self,
        params: &MacParams<'_>,
        data: &[u8],
        tag: &[u8],
    ) -> Result<(), SecurityError> {
        let key_type = params.key_type;
        Self::require_class(key_type, KeyClass::Authentication)?;

        let width = tag_width(key_type)?;
        if tag.len() != width {
            return Err(SecurityError::InvalidLength {
                field: "mac",
                expected: width,
                actual: tag.len(),
            });
        }

        let reference = self.resolve_reference(key_type, params.reference);
        self.check_fresh(key_type, reference)?;
        self.check_replay(key_type, params.source, reference)?;

        let full = self.compute_mac(params, reference, data)?;
        if !tags_match(&full, tag) {
            tracing::warn!(%key_type, reference, "mac verification failed");
            return Err(SecurityError::AuthenticationFailed);
        }

        self.commit_reference(key_type, params.source, reference)
    }

    fn compute_mac(
        &self,
        params: &MacParams<'_>,
        reference: u32,
        data: &[u8],
    ) -> Result<[u8; 16], SecurityError> {
        let header = link_header(params.sequence, reference)?;
        let aad = build_aad(params.key_type, &header)?;
        let key = self.resolve_key(params.key_type, reference, None, params.external_ikm)?;

        Ok(self.provider.cmac(&key, &[aad.as_bytes(), data])?)
    }
}
