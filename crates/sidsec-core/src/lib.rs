//! Sidsec security layer.
//!
//! Key hierarchy, authenticated encryption, link MACs and rotating
//! identifiers for constrained LPWAN devices. Upper protocol layers call the
//! [`SecurityEngine`]; primitives come from a [`sidsec_crypto::CryptoProvider`]
//! and persistence from a [`KeyStorage`] collaborator.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────────────────────┐
//!   caller ──────► │      SecurityEngine      │
//!                  │ encrypt/decrypt (aead)   │
//!                  │ generate/verify (mac)    │
//!                  │ tx_uuid generate/verify  │
//!                  └──┬──────┬──────┬──────┬──┘
//!                     │      │      │      │
//!               KeyStore  derive  nonce  TimeSyncCounter / Clock
//!                  │      │
//!            KeyStorage  CryptoProvider
//! ```
//!
//! # Components
//!
//! - [`KeyStore`]: master keys, volatile or persisted through [`KeyStorage`]
//! - [`derive_key`]: time- and counter-referenced keys from a master
//! - [`build_nonce`] / [`build_aad`]: deterministic nonce and header layout
//! - [`TimeSyncCounter`]: injected freshness counter
//! - [`ReplayGuard`]: receive-side counter replay rejection
//!
//! # Security
//!
//! - Derived keys exist only as [`sidsec_crypto::SecretKey`] values scoped to
//!   one call and are zeroized on every exit path
//! - No operation returns master key bytes
//! - Verification failures carry no detail about the cause
//! - Encryption and verification never advance the counter

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod aead;
mod clock;
pub mod config;
mod counter;
mod derivation;
mod engine;
mod error;
mod key_type;
mod mac;
mod nonce;
mod params;
mod replay;
pub mod store;
mod tx_uuid;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, KdfScheme};
pub use counter::TimeSyncCounter;
pub use derivation::{derivation_context, derive_key};
pub use engine::SecurityEngine;
pub use error::SecurityError;
pub use key_type::{Derivation, KeyClass, KeyType, MasterKeyType, Validity};
pub use nonce::{Aad, AadProfile, DeviceId, Nonce, SequenceNumber, build_aad, build_nonce};
pub use params::{EncryptionParams, MacParams, MacTag, Sealed, TxUuid, TxUuidKind, TxUuidParams};
pub use replay::ReplayGuard;
pub use store::{ChaoticStorage, KeyStorage, KeyStore, MemoryStorage, Slot, StorageError};
