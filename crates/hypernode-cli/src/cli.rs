//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use hypernode_core::{Amount, ContentHash, Pubkey};
use hypernode_market::GpuType;

/// Default ledger snapshot file.
pub const DEFAULT_STATE_FILE: &str = "hypernode-ledger.json";

/// Hypernode CLI - GPU job marketplace ledger.
#[derive(Parser, Debug, Clone)]
#[command(name = "hypernode")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Ledger snapshot file.
    #[arg(short, long, env = "HYPERNODE_STATE", default_value = DEFAULT_STATE_FILE)]
    pub state: PathBuf,

    /// Engine configuration file (JSON).
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format.
    #[arg(short, long, value_enum, default_value_t = Format::Table)]
    pub format: Format,

    /// Pin the clock to this unix timestamp instead of wall time.
    #[arg(long, value_name = "UNIX_SECONDS")]
    pub now: Option<i64>,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum Format {
    /// Human-readable table format.
    #[default]
    Table,
    /// JSON output for scripting.
    Json,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Generate a fresh identity.
    Keygen,

    /// Credit funds to an account from the wallet layer.
    Deposit {
        /// Account to credit.
        account: Pubkey,

        /// Amount in HYPER (up to 6 decimals).
        amount: Amount,
    },

    /// Show an account's payable balance.
    Balance {
        /// Account to inspect.
        account: Pubkey,
    },

    /// Market management commands.
    Market {
        /// Market subcommand to execute.
        #[command(subcommand)]
        command: MarketCommands,
    },

    /// Job lifecycle commands.
    Job {
        /// Job subcommand to execute.
        #[command(subcommand)]
        command: JobCommands,
    },

    /// Compute node commands.
    Node {
        /// Node subcommand to execute.
        #[command(subcommand)]
        command: NodeCommands,
    },

    /// Time out every expired job of a market.
    Sweep {
        /// Market to sweep.
        market: Pubkey,
    },
}

/// Market subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum MarketCommands {
    /// Create a fixed-price market.
    Create(CreateMarketArgs),

    /// Show a market with its vault and queue.
    Show {
        /// Market ID.
        id: Pubkey,
    },

    /// List all markets.
    List,
}

/// Arguments for creating a market.
#[derive(Parser, Debug, Clone)]
pub struct CreateMarketArgs {
    /// Identity creating the market.
    #[arg(long)]
    pub authority: Pubkey,

    /// Price per job in HYPER.
    #[arg(long)]
    pub price: Amount,

    /// Job timeout in seconds.
    #[arg(long, default_value = "3600")]
    pub timeout: i64,

    /// Minimum node stake required to list.
    #[arg(long, default_value = "0")]
    pub min_stake: u128,
}

/// Job subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum JobCommands {
    /// Create a job and escrow its price.
    Create(CreateJobArgs),

    /// Show a job.
    Show {
        /// Job ID.
        id: Pubkey,
    },

    /// List the jobs of a market.
    List {
        /// Market ID.
        market: Pubkey,
    },

    /// Deliver a result for a running job.
    Finish {
        /// Job ID.
        id: Pubkey,

        /// Bound node delivering the result.
        #[arg(long)]
        node: Pubkey,

        /// Content hash of the result (64 hex chars).
        #[arg(long)]
        result: ContentHash,
    },

    /// Withdraw a queued job.
    Cancel {
        /// Job ID.
        id: Pubkey,

        /// Client that created the job.
        #[arg(long)]
        client: Pubkey,
    },

    /// Time out a job past its deadline.
    Timeout {
        /// Job ID.
        id: Pubkey,
    },
}

/// Arguments for creating a job.
#[derive(Parser, Debug, Clone)]
pub struct CreateJobArgs {
    /// Market to submit to.
    #[arg(long)]
    pub market: Pubkey,

    /// Paying client.
    #[arg(long)]
    pub client: Pubkey,

    /// Content hash of the job definition (64 hex chars).
    #[arg(long)]
    pub ipfs: ContentHash,

    /// Minimum VRAM in GB.
    #[arg(long, default_value = "0")]
    pub min_vram: u8,

    /// GPU vendor requirement (any, nvidia, amd).
    #[arg(long, default_value = "any")]
    pub gpu: GpuType,

    /// Job ID; generated when omitted.
    #[arg(long)]
    pub id: Option<Pubkey>,
}

/// Node subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum NodeCommands {
    /// Offer a node to a market.
    List {
        /// Market ID.
        market: Pubkey,

        /// Node identity.
        #[arg(long)]
        node: Pubkey,

        /// Externally verified stake of the node.
        #[arg(long, default_value = "0")]
        stake: u128,
    },

    /// Withdraw an idle node from a market's queue.
    Delist {
        /// Market ID.
        market: Pubkey,

        /// Node identity.
        #[arg(long)]
        node: Pubkey,
    },

    /// Show a node's balance and reputation.
    Show {
        /// Node identity.
        node: Pubkey,
    },
}

impl Commands {
    /// Returns true if the command changes the ledger.
    #[must_use]
    pub const fn mutates(&self) -> bool {
        match self {
            Self::Keygen | Self::Balance { .. } => false,
            Self::Deposit { .. } | Self::Sweep { .. } => true,
            Self::Market { command } => matches!(command, MarketCommands::Create(_)),
            Self::Job { command } => !matches!(
                command,
                JobCommands::Show { .. } | JobCommands::List { .. }
            ),
            Self::Node { command } => !matches!(command, NodeCommands::Show { .. }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    const KEY: &str = "11111111111111111111111111111111";

    #[test]
    fn cli_help_does_not_panic() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parse_defaults() {
        let cli = Cli::parse_from(["hypernode", "keygen"]);
        assert!(matches!(cli.command, Commands::Keygen));
        assert_eq!(cli.format, Format::Table);
        assert!(cli.config.is_none());
        assert!(cli.now.is_none());
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::parse_from([
            "hypernode",
            "--state",
            "/tmp/ledger.json",
            "--format",
            "json",
            "--now",
            "1700000000",
            "balance",
            KEY,
        ]);
        assert_eq!(cli.state, PathBuf::from("/tmp/ledger.json"));
        assert_eq!(cli.format, Format::Json);
        assert_eq!(cli.now, Some(1_700_000_000));
        assert!(matches!(cli.command, Commands::Balance { .. }));
    }

    #[test]
    fn parse_deposit_amount() {
        let cli = Cli::parse_from(["hypernode", "deposit", KEY, "2.5"]);
        match cli.command {
            Commands::Deposit { amount, .. } => assert_eq!(amount, Amount::from_base(2_500_000)),
            other => panic!("expected deposit, got {other:?}"),
        }
    }

    #[test]
    fn parse_market_create() {
        let cli = Cli::parse_from([
            "hypernode", "market", "create", "--authority", KEY, "--price", "1000", "--timeout",
            "60",
        ]);
        match cli.command {
            Commands::Market {
                command: MarketCommands::Create(args),
            } => {
                assert_eq!(args.price, Amount::from_hyper(1000));
                assert_eq!(args.timeout, 60);
                assert_eq!(args.min_stake, 0);
            }
            other => panic!("expected market create, got {other:?}"),
        }
    }

    #[test]
    fn parse_job_create_with_gpu() {
        let hash = ContentHash::of(b"job").to_string();
        let cli = Cli::parse_from([
            "hypernode", "job", "create", "--market", KEY, "--client", KEY, "--ipfs", &hash,
            "--min-vram", "8", "--gpu", "nvidia",
        ]);
        match cli.command {
            Commands::Job {
                command: JobCommands::Create(args),
            } => {
                assert_eq!(args.gpu, GpuType::Nvidia);
                assert_eq!(args.min_vram, 8);
                assert!(args.id.is_none());
            }
            other => panic!("expected job create, got {other:?}"),
        }
    }

    #[test]
    fn rejects_malformed_key() {
        assert!(Cli::try_parse_from(["hypernode", "balance", "not-a-key!"]).is_err());
    }

    #[test]
    fn read_only_commands_do_not_mutate() {
        let show = Cli::parse_from(["hypernode", "job", "show", KEY]);
        assert!(!show.command.mutates());
        let sweep = Cli::parse_from(["hypernode", "sweep", KEY]);
        assert!(sweep.command.mutates());
        let node_show = Cli::parse_from(["hypernode", "node", "show", KEY]);
        assert!(!node_show.command.mutates());
    }
}
