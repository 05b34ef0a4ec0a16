//! Error types for primitive operations

use thiserror::Error;

/// Errors reported by a [`crate::CryptoProvider`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// Key material has the wrong width
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Required key length
        expected: usize,
        /// Supplied key length
        actual: usize,
    },

    /// Authentication tag is empty or longer than the primitive produces
    #[error("invalid tag length: {0}")]
    InvalidTagLength(usize),

    /// Requested output length is not supported by the primitive
    #[error("invalid output length: {0}")]
    InvalidOutputLength(usize),

    /// Authentication tag did not verify
    #[error("authentication tag mismatch")]
    TagMismatch,

    /// The backend (driver, accelerator) reported a failure
    #[error("primitive backend failure: {0}")]
    Backend(String),
}

impl CryptoError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Tag mismatches are an expected operational outcome. Everything else
    /// indicates a caller bug or a broken backend.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::TagMismatch => false,
            Self::InvalidKeyLength { .. }
            | Self::InvalidTagLength(_)
            | Self::InvalidOutputLength(_)
            | Self::Backend(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_mismatch_is_not_fatal() {
        assert!(!CryptoError::TagMismatch.is_fatal());
    }

    #[test]
    fn backend_failure_is_fatal() {
        assert!(CryptoError::Backend("accelerator timeout".to_string()).is_fatal());
    }

    #[test]
    fn error_display() {
        let err = CryptoError::InvalidKeyLength { expected: 16, actual: 15 };
        assert_eq!(err.to_string(), "invalid key length: expected 16, got 15");
    }
}
