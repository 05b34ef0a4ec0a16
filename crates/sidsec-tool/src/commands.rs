//! Command-line surface and command execution.
//!
//! Every invocation opens the key database, restores the time-sync counter
//! checkpoint and builds a fresh [`SecurityEngine`]. Byte strings are taken
//! and printed as lowercase hex. Results go to the supplied writer; logs go
//! through `tracing`.

use std::{io::Write, path::PathBuf, sync::Arc};

use clap::{Args, Parser, Subcommand, ValueEnum};
use sidsec_core::{
    Clock, DeviceId, EncryptionParams, KdfScheme, KeyType, MacParams, ManualClock, MasterKeyType,
    SecurityEngine, SequenceNumber, SystemClock, TimeSyncCounter, TxUuidKind, TxUuidParams,
    config::EngineConfig, store::KeyStore,
};
use sidsec_crypto::{SecretKey, SoftwareCrypto};
use zeroize::Zeroizing;

use crate::{error::ToolError, storage::RedbKeyStorage};

type Engine = SecurityEngine<SoftwareCrypto, RedbKeyStorage, ManualClock>;

/// Sidsec key hierarchy and secure messaging tool
#[derive(Parser, Debug)]
#[command(name = "sidsec")]
#[command(about = "Provision keys and run sidsec security operations")]
#[command(version)]
pub struct Cli {
    /// Path to the key database
    #[arg(long, global = true, default_value = "sidsec.redb")]
    pub db: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    /// Current time in seconds (defaults to the system clock)
    #[arg(long, global = true)]
    pub now: Option<u32>,

    /// Key derivation scheme shared with the peer
    #[arg(long, global = true, value_enum, default_value_t = KdfArg::Cmac)]
    pub kdf: KdfArg,

    /// Operation to run
    #[command(subcommand)]
    pub command: Command,
}

/// Operations.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Store a master key persistently
    Provision {
        /// Master key context
        #[arg(long, value_enum)]
        key_type: MasterKeyArg,
        /// Key bytes as hex (16 bytes)
        #[arg(long)]
        key: String,
    },

    /// Erase a master key
    Erase {
        /// Master key context
        #[arg(long, value_enum)]
        key_type: MasterKeyArg,
    },

    /// List provisioned master key contexts
    List,

    /// Encrypt a payload
    Encrypt {
        /// Frame parameters
        #[command(flatten)]
        frame: FrameArgs,
        /// Plaintext as hex
        plaintext: String,
    },

    /// Decrypt and authenticate a payload
    Decrypt {
        /// Frame parameters
        #[command(flatten)]
        frame: FrameArgs,
        /// Truncated tag as hex (4 bytes)
        #[arg(long)]
        tag: String,
        /// Ciphertext as hex
        ciphertext: String,
    },

    /// Compute a link MAC
    Mac {
        /// Link parameters
        #[command(flatten)]
        link: LinkArgs,
        /// Authenticated data as hex
        data: String,
    },

    /// Verify a link MAC
    VerifyMac {
        /// Link parameters
        #[command(flatten)]
        link: LinkArgs,
        /// MAC tag as hex
        #[arg(long)]
        mac: String,
        /// Authenticated data as hex
        data: String,
    },

    /// Rotating transmission identifiers
    #[command(subcommand)]
    TxUuid(TxUuidCommand),

    /// Time-sync counter
    #[command(subcommand)]
    Counter(CounterCommand),
}

/// Rotating identifier operations.
#[derive(Subcommand, Debug)]
pub enum TxUuidCommand {
    /// Generate the identifier for the current reference
    Generate {
        /// Identifier parameters
        #[command(flatten)]
        id: TxUuidArgs,
    },

    /// Search the reference window for a received identifier
    Verify {
        /// Identifier parameters
        #[command(flatten)]
        id: TxUuidArgs,
        /// Received identifier as hex
        candidate: String,
    },
}

/// Counter operations.
#[derive(Subcommand, Debug)]
pub enum CounterCommand {
    /// Print the restored counter value
    Show,

    /// Advance the counter and checkpoint it
    Advance {
        /// Number of increments
        #[arg(long, default_value_t = 1)]
        steps: u32,
    },
}

/// Which key an operation uses.
#[derive(Args, Debug, Clone, Copy)]
pub struct KeySelector {
    /// Master key context
    #[arg(long, value_enum)]
    pub key_type: MasterKeyArg,

    /// How the key is obtained from the master
    #[arg(long, value_enum, default_value_t = DerivationArg::Time)]
    pub derivation: DerivationArg,

    /// Explicit reference (defaults to the clock or counter)
    #[arg(long)]
    pub reference: Option<u32>,
}

impl KeySelector {
    fn resolve(&self) -> KeyType {
        let master = MasterKeyType::from(self.key_type);
        match self.derivation {
            DerivationArg::Master => KeyType::Master(master),
            DerivationArg::Time => KeyType::TimeDerived(master),
            DerivationArg::Counter => KeyType::CounterDerived(master),
        }
    }
}

/// AEAD frame parameters.
#[derive(Args, Debug)]
pub struct FrameArgs {
    /// Key selection
    #[command(flatten)]
    pub selector: KeySelector,

    /// Source device id as hex (5 bytes)
    #[arg(long)]
    pub source: String,

    /// Frame sequence number
    #[arg(long)]
    pub sequence: u32,

    /// Sequence number width in bytes
    #[arg(long, default_value_t = 3)]
    pub sequence_width: u8,

    /// Additional authenticated data as hex
    #[arg(long, default_value = "")]
    pub aad: String,

    /// Externally supplied key as hex (16 bytes), bypassing the key store
    #[arg(long)]
    pub external_key: Option<String>,
}

/// Link MAC parameters.
#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Key selection
    #[command(flatten)]
    pub selector: KeySelector,

    /// Frame sequence number
    #[arg(long)]
    pub sequence: u32,

    /// Sequence number width in bytes
    #[arg(long, default_value_t = 1)]
    pub sequence_width: u8,

    /// Sending device id as hex (5 bytes), scopes replay tracking
    #[arg(long)]
    pub source: Option<String>,

    /// External input keying material as hex
    #[arg(long)]
    pub external_ikm: Option<String>,
}

/// Rotating identifier parameters.
#[derive(Args, Debug)]
pub struct TxUuidArgs {
    /// Device identity as hex (5 bytes)
    #[arg(long)]
    pub identity: String,

    /// Reference source
    #[arg(long, value_enum, default_value_t = TxUuidKindArg::Time)]
    pub kind: TxUuidKindArg,

    /// Identifier width in bytes
    #[arg(long, default_value_t = 5)]
    pub length: usize,

    /// Explicit reference (defaults to the clock or counter)
    #[arg(long)]
    pub reference: Option<u32>,
}

/// Master key context names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum MasterKeyArg {
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

impl From<MasterKeyArg> for MasterKeyType {
    fn from(arg: MasterKeyArg) -> Self {
        match arg {
            MasterKeyArg::Wan => Self::Wan,
            MasterKeyArg::WanAuth => Self::WanAuth,
            MasterKeyArg::Pan => Self::Pan,
            MasterKeyArg::PanAuth => Self::PanAuth,
            MasterKeyArg::App => Self::App,
            MasterKeyArg::D2d => Self::D2d,
            MasterKeyArg::TxUuid => Self::TxUuid,
            MasterKeyArg::TimeSyncResponse => Self::TimeSyncResponse,
        }
    }
}

/// Key derivation modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DerivationArg {
    /// Use the master key directly
    Master,
    /// Time-referenced derived key
    Time,
    /// Counter-referenced derived key
    Counter,
}

/// Rotating identifier reference sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TxUuidKindArg {
    /// Clock seconds
    Time,
    /// Time-sync counter
    Counter,
}

impl From<TxUuidKindArg> for TxUuidKind {
    fn from(arg: TxUuidKindArg) -> Self {
        match arg {
            TxUuidKindArg::Time => Self::Time,
            TxUuidKindArg::Counter => Self::Counter,
        }
    }
}

/// Key derivation schemes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KdfArg {
    /// SP 800-108 counter mode over AES-CMAC
    Cmac,
    /// HKDF-SHA256
    Hkdf,
}

impl From<KdfArg> for KdfScheme {
    fn from(arg: KdfArg) -> Self {
        match arg {
            KdfArg::Cmac => Self::CmacCounter,
            KdfArg::Hkdf => Self::HkdfSha256,
        }
    }
}

/// Run one command, writing its result lines to `out`.
///
/// # Errors
///
/// - `Argument`: malformed hex or a value of the wrong width
/// - `Storage`: the key database could not be opened
/// - `Security`: the engine rejected the operation
/// - `Output`: `out` could not be written
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<(), ToolError> {
    let engine = open_engine(cli)?;

    match &cli.command {
        Command::Provision { key_type, key } => {
            let key_type = MasterKeyType::from(*key_type);
            let bytes = Zeroizing::new(hex::decode(key)?);
            engine.store().store_master_key(key_type, &bytes, true)?;
            writeln!(out, "provisioned {key_type}")?;
        },
        Command::Erase { key_type } => {
            let key_type = MasterKeyType::from(*key_type);
            engine.store().erase_master_key(key_type)?;
            writeln!(out, "erased {key_type}")?;
        },
        Command::List => {
            for key_type in engine.store().provisioned()? {
                writeln!(out, "{key_type}")?;
            }
        },
        Command::Encrypt { frame, plaintext } => {
            let aad = hex::decode(&frame.aad)?;
            let external = frame.external_key.as_deref().map(decode_key).transpose()?;
            let params = encryption_params(frame, &aad, external.as_ref())?;

            let plaintext = Zeroizing::new(hex::decode(plaintext)?);
            let sealed = engine.encrypt(&params, &plaintext)?;
            writeln!(
                out,
                "reference={} ciphertext={} tag={}",
                sealed.reference,
                hex::encode(&sealed.ciphertext),
                hex::encode(sealed.tag)
            )?;
        },
        Command::Decrypt { frame, tag, ciphertext } => {
            let aad = hex::decode(&frame.aad)?;
            let external = frame.external_key.as_deref().map(decode_key).transpose()?;
            let params = encryption_params(frame, &aad, external.as_ref())?;

            let plaintext =
                Zeroizing::new(engine.decrypt(&params, &hex::decode(ciphertext)?, &hex::decode(tag)?)?);
            writeln!(out, "{}", hex::encode(plaintext.as_slice()))?;
        },
        Command::Mac { link, data } => {
            let ikm = link.external_ikm.as_deref().map(hex::decode).transpose()?;
            let params = mac_params(link, ikm.as_deref())?;

            let tag = engine.generate_mac(&params, &hex::decode(data)?)?;
            writeln!(out, "reference={} mac={}", tag.reference, hex::encode(tag.as_bytes()))?;
        },
        Command::VerifyMac { link, mac, data } => {
            let ikm = link.external_ikm.as_deref().map(hex::decode).transpose()?;
            let params = mac_params(link, ikm.as_deref())?;

            engine.verify_mac(&params, &hex::decode(data)?, &hex::decode(mac)?)?;
            writeln!(out, "verified")?;
        },
        Command::TxUuid(TxUuidCommand::Generate { id }) => {
            let generated = engine.generate_tx_uuid(&tx_uuid_params(id)?)?;
            writeln!(
                out,
                "tx_uuid={} reference={} refresh={}",
                hex::encode(generated.as_bytes()),
                generated.reference,
                generated.refresh_interval_secs
            )?;
        },
        Command::TxUuid(TxUuidCommand::Verify { id, candidate }) => {
            let reference = engine.verify_tx_uuid(&tx_uuid_params(id)?, &hex::decode(candidate)?)?;
            writeln!(out, "reference={reference}")?;
        },
        Command::Counter(CounterCommand::Show) => {
            writeln!(out, "counter={}", engine.counter().current())?;
        },
        Command::Counter(CounterCommand::Advance { steps }) => {
            for _ in 0..*steps {
                engine.counter().advance();
            }
            let value = engine.counter().checkpoint(engine.store().storage())?;
            writeln!(out, "counter={value}")?;
        },
    }

    Ok(())
}

fn open_engine(cli: &Cli) -> Result<Engine, ToolError> {
    let storage = RedbKeyStorage::open(&cli.db)?;

    let counter = Arc::new(TimeSyncCounter::load(&storage)?);
    let restored = counter.current();

    let now = cli.now.unwrap_or_else(|| SystemClock.now_secs());
    tracing::debug!(db = %cli.db.display(), counter = restored, now, "engine ready");

    let engine =
        SecurityEngine::new(SoftwareCrypto::new(), KeyStore::new(storage), counter, ManualClock::new(now))
            .with_config(EngineConfig { kdf: cli.kdf.into() });
    Ok(engine)
}

fn decode_key(encoded: &str) -> Result<SecretKey, ToolError> {
    let bytes = Zeroizing::new(hex::decode(encoded)?);
    SecretKey::from_slice(&bytes).map_err(|e| ToolError::Argument(format!("external key: {e}")))
}

fn encryption_params<'a>(
    frame: &FrameArgs,
    aad: &'a [u8],
    external: Option<&'a SecretKey>,
) -> Result<EncryptionParams<'a>, ToolError> {
    let source = DeviceId::from_slice(&hex::decode(&frame.source)?)?;
    let sequence = SequenceNumber::new(frame.sequence, frame.sequence_width)?;

    let mut params =
        EncryptionParams::new(frame.selector.resolve(), source, sequence).with_aad(aad);
    if let Some(reference) = frame.selector.reference {
        params = params.with_reference(reference);
    }
    if let Some(key) = external {
        params = params.with_external_key(key);
    }
    Ok(params)
}

fn mac_params<'a>(link: &LinkArgs, ikm: Option<&'a [u8]>) -> Result<MacParams<'a>, ToolError> {
    let sequence = SequenceNumber::new(link.sequence, link.sequence_width)?;

    let mut params = MacParams::new(link.selector.resolve(), sequence);
    if let Some(reference) = link.selector.reference {
        params = params.with_reference(reference);
    }
    if let Some(source) = &link.source {
        params = params.with_source(DeviceId::from_slice(&hex::decode(source)?)?);
    }
    if let Some(ikm) = ikm {
        params = params.with_external_ikm(ikm);
    }
    Ok(params)
}

fn tx_uuid_params(id: &TxUuidArgs) -> Result<TxUuidParams, ToolError> {
    let identity = DeviceId::from_slice(&hex::decode(&id.identity)?)?;

    let mut params = TxUuidParams::new(identity, id.kind.into()).with_length(id.length);
    if let Some(reference) = id.reference {
        params = params.with_reference(reference);
    }
    Ok(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn selector_maps_derivation() {
        let selector = KeySelector {
            key_type: MasterKeyArg::PanAuth,
            derivation: DerivationArg::Counter,
            reference: None,
        };
        assert_eq!(selector.resolve(), KeyType::CounterDerived(MasterKeyType::PanAuth));

        let selector = KeySelector { derivation: DerivationArg::Master, ..selector };
        assert_eq!(selector.resolve(), KeyType::Master(MasterKeyType::PanAuth));
    }

    #[test]
    fn value_names_match_context_names() {
        for arg in MasterKeyArg::value_variants() {
            let name = arg.to_possible_value().unwrap().get_name().to_string();
            assert_eq!(name, MasterKeyType::from(*arg).name());
        }
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["sidsec", "list", "--now", "42", "--kdf", "hkdf"]);
        assert_eq!(cli.now, Some(42));
        assert_eq!(cli.kdf, KdfArg::Hkdf);
        assert!(matches!(cli.command, Command::List));
    }
}
