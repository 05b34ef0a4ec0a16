//! Storage error types.
//!
//! Defines errors the persistence collaborator can report:
//! - `Corrupt`: a slot holds bytes of the wrong width
//! - `Io`: underlying storage system errors

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Stored value has an impossible width for its slot
    #[error("corrupt slot {slot:#04x}: {len} bytes")]
    Corrupt {
        /// Slot identifier
        slot: u8,
        /// Width that was read back
        len: usize,
    },

    /// I/O error (file system, database, flash driver, etc.)
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}
