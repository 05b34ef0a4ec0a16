//! Sidsec operator tool.
//!
//! Provisions master keys into a Redb database and runs the security engine
//! operations (encrypt, decrypt, MAC, tx_uuid) against them from the command
//! line. Useful for bench testing devices and for producing reference frames.
//!
//! # Components
//!
//! - [`RedbKeyStorage`]: durable [`sidsec_core::KeyStorage`] over Redb
//! - [`Cli`] / [`run`]: argument parsing and command execution
//! - [`ToolError`]: everything a command can fail with

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod commands;
pub mod error;
pub mod storage;

pub use commands::{Cli, Command, run};
pub use error::ToolError;
pub use storage::RedbKeyStorage;
