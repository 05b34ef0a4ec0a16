//! Sidsec tool binary.
//!
//! # Usage
//!
//! ```bash
//! # Provision a WAN master key
//! sidsec --db device.redb provision --key-type wan --key 000102030405060708090a0b0c0d0e0f
//!
//! # Encrypt with the hourly WAN key
//! sidsec --db device.redb encrypt --key-type wan --source 0a0b0c0d0e --sequence 1 aabbcc
//! ```

use std::process::ExitCode;

use clap::Parser;
use sidsec_tool::{Cli, run};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> ExitCode {
    let cli = Cli::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    // Results go to stdout, logs to stderr
    tracing_subscriber::registry().with(fmt::layer().with_writer(std::io::stderr)).with(filter).init();

    let stdout = std::io::stdout();
    match run(&cli, &mut stdout.lock()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) if err.is_rejection() => {
            tracing::warn!(error = %err, "rejected");
            ExitCode::from(2)
        },
        Err(err) => {
            tracing::error!(error = %err, "command failed");
            ExitCode::FAILURE
        },
    }
}
