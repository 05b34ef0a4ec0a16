//! Tool error types.

use std::fmt;

use sidsec_core::{SecurityError, StorageError};

/// Errors that can occur while running a command.
#[derive(Debug)]
pub enum ToolError {
    /// Command-line argument could not be used (bad hex, wrong width, etc.).
    ///
    /// Fix the invocation and retry.
    Argument(String),

    /// Key database could not be opened or accessed.
    Storage(StorageError),

    /// Security operation failed.
    ///
    /// Verification failures land here as `AuthenticationFailed`,
    /// `IdentifierNotFound`, `Replay` or `StaleReference`.
    Security(SecurityError),

    /// Writing command output failed.
    Output(std::io::Error),
}

impl ToolError {
    /// Returns true if the failure is a negative verification result rather
    /// than a broken invocation or environment.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::Security(
                SecurityError::AuthenticationFailed
                    | SecurityError::IdentifierNotFound { .. }
                    | SecurityError::Replay { .. }
                    | SecurityError::StaleReference { .. }
            )
        )
    }
}

impl fmt::Display for ToolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Argument(msg) => write!(f, "invalid argument: {msg}"),
            Self::Storage(err) => write!(f, "storage error: {err}"),
            Self::Security(err) => write!(f, "security error: {err}"),
            Self::Output(err) => write!(f, "output error: {err}"),
        }
    }
}

impl std::error::Error for ToolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Argument(_) => None,
            Self::Storage(err) => Some(err),
            Self::Security(err) => Some(err),
            Self::Output(err) => Some(err),
        }
    }
}

impl From<SecurityError> for ToolError {
    fn from(err: SecurityError) -> Self {
        Self::Security(err)
    }
}

impl From<StorageError> for ToolError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Output(err)
    }
}

impl From<hex::FromHexError> for ToolError {
    fn from(err: hex::FromHexError) -> Self {
        Self::Argument(format!("hex: {err}"))
    }
}
