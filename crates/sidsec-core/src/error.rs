//! Error types for the security layer.
//!
//! Every expected failure is returned as a typed [`SecurityError`]. The
//! variants deliberately carry no secret-dependent detail: an
//! `AuthenticationFailed` looks the same whether the key, the tag or the
//! input was wrong.

use sidsec_crypto::CryptoError;
use thiserror::Error;

use crate::{key_type::MasterKeyType, store::StorageError};

/// Errors returned by security engine operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SecurityError {
    /// No master key has been provisioned for the requested context
    #[error("no master key stored for {key_type}")]
    NotFound {
        /// Context that was looked up
        key_type: MasterKeyType,
    },

    /// Rotating identifier search exhausted its window
    #[error("no matching identifier in {candidates} candidate references")]
    IdentifierNotFound {
        /// Number of reference values tried
        candidates: u32,
    },

    /// Buffer or key has the wrong width
    #[error("invalid length for {field}: expected {expected}, got {actual}")]
    InvalidLength {
        /// Which input was wrong
        field: &'static str,
        /// Required (or maximum) width
        expected: usize,
        /// Supplied width
        actual: usize,
    },

    /// Parameter combination is not allowed
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// Tag or MAC did not verify
    #[error("authentication failed")]
    AuthenticationFailed,

    /// The primitive collaborator reported a failure
    #[error("primitive failure: {0}")]
    PrimitiveFailure(CryptoError),

    /// Scratch buffer allocation failed
    #[error("out of resources")]
    OutOfResources,

    /// Counter reference was already accepted
    #[error("replayed reference {reference}: last accepted {last_accepted}")]
    Replay {
        /// Reference carried by the rejected message
        reference: u32,
        /// Highest reference accepted so far
        last_accepted: u32,
    },

    /// Time reference lies outside the freshness window
    #[error("stale reference {reference} at time {now}")]
    StaleReference {
        /// Reference carried by the rejected message
        reference: u32,
        /// Receiver time when the check ran
        now: u32,
    },

    /// The persistence collaborator failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SecurityError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate a caller bug or a broken collaborator.
    /// Verification outcomes and missing state are reported to the calling
    /// protocol layer, which owns retry and rate limiting.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::InvalidLength { .. }
            | Self::InvalidParameter(_)
            | Self::PrimitiveFailure(_)
            | Self::OutOfResources => true,

            Self::NotFound { .. }
            | Self::IdentifierNotFound { .. }
            | Self::AuthenticationFailed
            | Self::Replay { .. }
            | Self::StaleReference { .. }
            | Self::Storage(_) => false,
        }
    }

    /// Returns true for both "nothing stored" and "nothing matched".
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. } | Self::IdentifierNotFound { .. })
    }
}

impl From<CryptoError> for SecurityError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::TagMismatch => Self::AuthenticationFailed,
            CryptoError::InvalidKeyLength { expected, actual } => {
                Self::InvalidLength { field: "key", expected, actual }
            },
            other => Self::PrimitiveFailure(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mismatch_maps_to_authentication_failed() {
        let err: SecurityError = CryptoError::TagMismatch.into();
        assert_eq!(err, SecurityError::AuthenticationFailed);
        assert!(!err.is_fatal());
    }

    #[test]
    fn backend_failure_maps_to_primitive_failure() {
        let err: SecurityError = CryptoError::Backend("dma fault".to_string()).into();
        assert!(matches!(err, SecurityError::PrimitiveFailure(CryptoError::Backend(_))));
        assert!(err.is_fatal());
    }

    #[test]
    fn not_found_covers_both_variants() {
        assert!(SecurityError::NotFound { key_type: MasterKeyType::Wan }.is_not_found());
        assert!(SecurityError::IdentifierNotFound { candidates: 61 }.is_not_found());
        assert!(!SecurityError::AuthenticationFailed.is_not_found());
    }

    #[test]
    fn error_display() {
        let err = SecurityError::NotFound { key_type: MasterKeyType::PanAuth };
        assert_eq!(err.to_string(), "no master key stored for pan-auth");

        let err = SecurityError::InvalidLength { field: "master key", expected: 16, actual: 8 };
        assert_eq!(err.to_string(), "invalid length for master key: expected 16, got 8");

        assert_eq!(SecurityError::AuthenticationFailed.to_string(), "authentication failed");
    }
}
