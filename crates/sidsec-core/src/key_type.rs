//! Key types and their fixed mapping onto master keys.
//!
//! Every key is identified by a [`KeyType`]: the master key it belongs to and
//! how it is obtained from that master. Because derived variants wrap their
//! [`MasterKeyType`], the derived-to-master mapping is fixed by construction
//! and every per-type rule (class, tag width, validity) is an exhaustive
//! match.

use std::fmt;

use crate::config::MASTER_KEY_TTL_SECS;

/// Long-lived provisioned key contexts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MasterKeyType {
    /// WAN confidentiality
    Wan,
    /// WAN authentication
    WanAuth,
    /// PAN confidentiality
    Pan,
    /// PAN authentication
    PanAuth,
    /// Application-layer confidentiality
    App,
    /// Device-to-device confidentiality
    D2d,
    /// Rotating identifier derivation
    TxUuid,
    /// Time-sync response authentication
    TimeSyncResponse,
}

/// What a key context is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyClass {
    /// AEAD encryption and decryption
    Confidentiality,
    /// MAC generation and verification
    Authentication,
    /// Rotating identifier generation
    Identifier,
}

impl MasterKeyType {
    /// Every master key context.
    pub const ALL: [Self; 8] = [
        Self::Wan,
        Self::WanAuth,
        Self::Pan,
        Self::PanAuth,
        Self::App,
        Self::D2d,
        Self::TxUuid,
        Self::TimeSyncResponse,
    ];

    /// Stable one-byte tag, used for storage slots and derivation labels.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Wan => 0x01,
            Self::WanAuth => 0x02,
            Self::Pan => 0x03,
            Self::PanAuth => 0x04,
            Self::App => 0x05,
            Self::D2d => 0x06,
            Self::TxUuid => 0x07,
            Self::TimeSyncResponse => 0x08,
        }
    }

    /// Inverse of [`Self::tag`].
    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Usage class of keys in this context.
    pub const fn class(self) -> KeyClass {
        match self {
            Self::Wan | Self::Pan | Self::App | Self::D2d => KeyClass::Confidentiality,
            Self::WanAuth | Self::PanAuth | Self::TimeSyncResponse => KeyClass::Authentication,
            Self::TxUuid => KeyClass::Identifier,
        }
    }

    /// MAC tag width for authentication contexts.
    ///
    /// Link profiles truncate to 4 bytes; time-sync responses carry the full
    /// CMAC block.
    pub const fn mac_tag_size(self) -> Option<usize> {
        match self {
            Self::WanAuth | Self::PanAuth => Some(4),
            Self::TimeSyncResponse => Some(16),
            Self::Wan | Self::Pan | Self::App | Self::D2d | Self::TxUuid => None,
        }
    }

    /// Short lowercase name.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Wan => "wan",
            Self::WanAuth => "wan-auth",
            Self::Pan => "pan",
            Self::PanAuth => "pan-auth",
            Self::App => "app",
            Self::D2d => "d2d",
            Self::TxUuid => "tx-uuid",
            Self::TimeSyncResponse => "time-sync-response",
        }
    }
}

impl fmt::Display for MasterKeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How a key is obtained from its master.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Derivation {
    /// The provisioned master key itself
    Master,
    /// Derived per time window
    TimeReferenced,
    /// Derived per counter value
    CounterReferenced,
}

impl Derivation {
    /// Stable one-byte tag, used in derivation labels.
    pub const fn tag(self) -> u8 {
        match self {
            Self::Master => 0x00,
            Self::TimeReferenced => 0x01,
            Self::CounterReferenced => 0x02,
        }
    }
}

/// How long a key of a given type remains usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    /// Until explicitly erased
    Persistent,
    /// For every reference inside the same window of this many seconds
    Window {
        /// Window length in seconds
        secs: u32,
    },
    /// For exactly one counter value
    SingleUse,
}

/// A key context qualified by its derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyType {
    /// Provisioned master key
    Master(MasterKeyType),
    /// Time-referenced key derived from the wrapped master
    TimeDerived(MasterKeyType),
    /// Counter-referenced key derived from the wrapped master
    CounterDerived(MasterKeyType),
}

impl KeyType {
    /// Master key this type is (or derives from).
    pub const fn master(self) -> MasterKeyType {
        match self {
            Self::Master(m) | Self::TimeDerived(m) | Self::CounterDerived(m) => m,
        }
    }

    /// Derivation rule.
    pub const fn derivation(self) -> Derivation {
        match self {
            Self::Master(_) => Derivation::Master,
            Self::TimeDerived(_) => Derivation::TimeReferenced,
            Self::CounterDerived(_) => Derivation::CounterReferenced,
        }
    }

    /// True for time- and counter-referenced keys.
    pub const fn is_derived(self) -> bool {
        !matches!(self, Self::Master(_))
    }

    /// Usage class, inherited from the master context.
    pub const fn class(self) -> KeyClass {
        self.master().class()
    }

    /// Lifetime of keys of this type.
    pub const fn validity(self) -> Validity {
        match self {
            Self::Master(_) => Validity::Persistent,
            Self::TimeDerived(_) => Validity::Window { secs: MASTER_KEY_TTL_SECS },
            Self::CounterDerived(_) => Validity::SingleUse,
        }
    }

    /// One-byte tag distinguishing every key type, bound into AAD.
    ///
    /// High nibble is the derivation, low nibble the master context.
    pub const fn wire_tag(self) -> u8 {
        (self.derivation().tag() << 4) | self.master().tag()
    }
}

impl fmt::Display for KeyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Master(m) => write!(f, "master({m})"),
            Self::TimeDerived(m) => write!(f, "time-derived({m})"),
            Self::CounterDerived(m) => write!(f, "counter-derived({m})"),
        }
    }
}
