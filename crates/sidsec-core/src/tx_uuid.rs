//! Rotating pseudonymous identifiers
//!
//! A tx_uuid is a short keyed hash of a device identity under a rotating
//! reference:
//!
//! ```text
//! key = derive(TxUuid master, kind, reference)
//! id  = HMAC-SHA256(key, "sidsec-txuuid" ‖ identity ‖ kind ‖ reference_be32)[..len]
//! ```
//!
//! A receiver does not know the exact reference the sender used, so
//! verification searches a bounded window around its own reference: ±30
//! seconds for time-based identifiers, 16 values forward for counter-based
//! ones.

use sidsec_crypto::{CryptoProvider, HMAC_SHA256_SIZE, SecretKey, tags_match};

use crate::{
    clock::Clock,
    config::{
        MASTER_KEY_TTL_SECS, TIME_TOLERANCE_SECS, TX_UUID_COUNTER_WINDOW, TX_UUID_MAX_SIZE,
        refresh_interval_secs,
    },
    derivation::derivation_context,
    engine::SecurityEngine,
    error::SecurityError,
    params::{TxUuid, TxUuidKind, TxUuidParams},
    store::KeyStorage,
};

/// Label binding identifiers to this scheme.
const TX_UUID_LABEL: &[u8] = b"sidsec-txuuid";

/// Reference values tried around `center`, in search order.
fn candidate_window(kind: TxUuidKind, center: u32) -> impl Iterator<Item = u32> {
    let (start, count) = match kind {
        TxUuidKind::Time => {
            (center.wrapping_sub(TIME_TOLERANCE_SECS), 2 * TIME_TOLERANCE_SECS + 1)
        },
        TxUuidKind::Counter => (center, TX_UUID_COUNTER_WINDOW),
    };
    (0..count).map(move |offset| start.wrapping_add(offset))
}

fn check_length(length: usize) -> Result<(), SecurityError> {
    if !(1..=TX_UUID_MAX_SIZE).contains(&length) {
        return Err(SecurityError::InvalidLength {
            field: "tx_uuid",
            expected: TX_UUID_MAX_SIZE,
            actual: length,
        });
    }
    Ok(())
}

impl<P: CryptoProvider, S: KeyStorage, C: Clock> SecurityEngine<P, S, C> {
    /// Generate the identifier for `params` at the resolved reference.
    ///
    /// The result carries the reference used and how long the identifier
    /// should be advertised before regenerating.
    ///
    /// # Errors
    ///
    /// - `InvalidLength`: requested length outside 1..=16
    /// - `NotFound`: no tx_uuid master key stored
    pub fn generate_tx_uuid(&self, params: &TxUuidParams) -> Result<TxUuid, SecurityError> {
        check_length(params.length)?;

        let key_type = params.kind.key_type();
        let reference = self.resolve_reference(key_type, params.reference);
        let key = self.resolve_key(key_type, reference, None, None)?;
        let full = self.identifier(&key, params, reference)?;

        let refresh = refresh_interval_secs(MASTER_KEY_TTL_SECS);
        tracing::debug!(identity = %params.identity, reference, refresh, "tx_uuid generated");
        Ok(TxUuid::new(&full, params.length, reference, refresh))
    }

    /// Search the reference window for one that produces `candidate`.
    ///
    /// The window is centred on `params.reference`, or on the receiver's own
    /// clock or counter when absent. Returns the matching reference.
    ///
    /// # Errors
    ///
    /// - `IdentifierNotFound`: no reference in the window matches
    /// - `InvalidLength`: `candidate` width differs from `params.length`
    /// - `NotFound`: no tx_uuid master key stored
    pub fn verify_tx_uuid(
        &self,
        params: &TxUuidParams,
        candidate: &[u8],
    ) -> Result<u32, SecurityError> {
        check_length(params.length)?;
        if candidate.len() != params.length {
            return Err(SecurityError::InvalidLength {
                field: "tx_uuid",
                expected: params.length,
                actual: candidate.len(),
            });
        }

        let key_type = params.kind.key_type();
        let center = self.resolve_reference(key_type, params.reference);

        // Time-derived keys are shared by a whole window; derive once per context
        let mut cached: Option<(u32, SecretKey)> = None;
        let mut candidates = 0u32;

        for reference in candidate_window(params.kind, center) {
            candidates += 1;

            let context = derivation_context(key_type.derivation(), reference);
            let key = match cached.take() {
                Some((cached_context, key)) if cached_context == context => key,
                _ => self.resolve_key(key_type, reference, None, None)?,
            };

            let full = self.identifier(&key, params, reference)?;
            cached = Some((context, key));

            if tags_match(&full, candidate) {
                tracing::debug!(identity = %params.identity, reference, "tx_uuid verified");
                return Ok(reference);
            }
        }

        tracing::warn!(identity = %params.identity, center, candidates, "tx_uuid not matched");
        Err(SecurityError::IdentifierNotFound { candidates })
    }

    fn identifier(
        &self,
        key: &SecretKey,
        params: &TxUuidParams,
        reference: u32,
    ) -> Result<[u8; HMAC_SHA256_SIZE], SecurityError> {
        let digest = self.provider.hmac_sha256(
            key.expose(),
            &[
                TX_UUID_LABEL,
                params.identity.as_bytes(),
                &[params.kind.tag()],
                &reference.to_be_bytes(),
            ],
        )?;
        Ok(digest)
    }
}
