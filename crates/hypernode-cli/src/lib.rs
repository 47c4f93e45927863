//! # hypernode-cli
//!
//! Command-line interface for the Hypernode job marketplace.
//!
//! Provides commands for:
//! - Identities and payable balances
//! - Market creation and inspection
//! - Job creation, completion, cancellation and timeouts
//! - Node listing and reputation
//!
//! # Architecture
//!
//! Every invocation loads the ledger snapshot, applies exactly one
//! marketplace operation and saves the snapshot back when the operation
//! changed it.
//!
//! ```text
//! ┌───────────┐  load   ┌──────────────────┐  one op  ┌─────────────┐
//! │ ledger.json│───────►│ hypernode-market │◄────────│  hypernode  │
//! └───────────┘◄───────└──────────────────┘          └─────────────┘
//!                 save
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
pub mod store;

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use hypernode_market::{Clock, ManualClock, Marketplace, SystemClock};
use tracing::debug;

pub use cli::{Cli, Commands, Format, JobCommands, MarketCommands, NodeCommands};
pub use error::CliError;
pub use output::OutputFormat;
pub use store::LedgerFile;

use commands::{AccountCommand, JobCommand, MarketCommand, NodeCommand};

/// Runs one CLI invocation, writing its output to `writer`.
///
/// # Errors
///
/// Returns an error if the config or ledger cannot be loaded, the
/// operation is rejected, or the ledger cannot be saved.
pub fn run<W: Write>(cli: &Cli, writer: &mut W) -> anyhow::Result<()> {
    let format = OutputFormat::new(cli.format);
    if matches!(cli.command, Commands::Keygen) {
        AccountCommand::keygen(writer, &format)?;
        return Ok(());
    }

    let config = store::load_config(cli.config.as_deref()).context("loading engine config")?;
    let clock: Arc<dyn Clock> = match cli.now {
        Some(now) => Arc::new(ManualClock::new(now)),
        None => Arc::new(SystemClock),
    };
    let ledger = LedgerFile::new(&cli.state);
    let place = ledger
        .load(config, clock)
        .with_context(|| format!("loading ledger {}", ledger.path().display()))?;

    dispatch(&place, &cli.command, writer, &format)?;

    for event in place.drain_events() {
        debug!(event = event.name(), market = %event.market(), "emitted");
    }
    if cli.command.mutates() {
        ledger
            .save(&place)
            .with_context(|| format!("saving ledger {}", ledger.path().display()))?;
    }
    Ok(())
}

fn dispatch<W: Write>(
    place: &Marketplace,
    command: &Commands,
    writer: &mut W,
    format: &OutputFormat,
) -> Result<(), CliError> {
    match command {
        Commands::Keygen => AccountCommand::keygen(writer, format),
        Commands::Deposit { account, amount } => {
            AccountCommand::new(place).deposit(writer, format, *account, *amount)
        }
        Commands::Balance { account } => AccountCommand::new(place).balance(writer, format, *account),
        Commands::Market { command } => MarketCommand::new(place).execute(writer, format, command),
        Commands::Job { command } => JobCommand::new(place).execute(writer, format, command),
        Commands::Node { command } => NodeCommand::new(place).execute(writer, format, command),
        Commands::Sweep { market } => MarketCommand::new(place).sweep(writer, format, *market),
    }
}
