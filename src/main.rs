//! Proof-of-work ledger CLI application
//!
//! A command-line interface for interacting with the ledger.

use clap::{Parser, Subcommand};
use pow_ledger::cli::{self, AppState};
use pow_ledger::core::{LedgerConfig, DEFAULT_DIFFICULTY, DEFAULT_MINING_REWARD};
use pow_ledger::crypto::MAX_DIFFICULTY;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ledger")]
#[command(version = "0.1.0")]
#[command(about = "An append-only proof-of-work ledger", long_about = None)]
struct Cli {
    /// Data directory for ledger storage
    #[arg(short, long, default_value = ".ledger_data")]
    data_dir: PathBuf,

    /// Mining difficulty (leading zero hex digits, 0-64) for new ledgers
    #[arg(
        long,
        default_value_t = DEFAULT_DIFFICULTY as u8,
        value_parser = clap::value_parser!(u8).range(0..=MAX_DIFFICULTY as i64)
    )]
    difficulty: u8,

    /// Mining reward for new ledgers
    #[arg(long, default_value_t = DEFAULT_MINING_REWARD)]
    reward: u64,

    /// Worker threads for the nonce search
    #[arg(short, long, default_value_t = 1)]
    workers: usize,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new key pair
    Keygen,

    /// Initialize a new ledger
    Init,

    /// Sign a transfer and add it to the pending transactions
    Send {
        /// Sender's private key (hex)
        #[arg(short, long)]
        private_key: String,

        /// Recipient's address (public key hex)
        #[arg(short, long)]
        to: String,

        /// Amount to send
        #[arg(short, long)]
        amount: u64,
    },

    /// Mine pending transactions into new blocks
    Mine {
        /// Address receiving the mining reward
        #[arg(short, long)]
        address: String,

        /// Number of blocks to mine
        #[arg(short, long, default_value = "1")]
        count: u32,
    },

    /// Show the balance of an address
    Balance {
        /// Address (public key hex)
        #[arg(short, long)]
        address: String,
    },

    /// Display ledger information
    Chain {
        /// Number of recent blocks to show
        #[arg(short, long, default_value = "10")]
        count: usize,
    },

    /// Show pending transactions
    Pending,

    /// Validate the ledger
    Validate,

    /// Export ledger to file
    Export {
        /// Output file path
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Import ledger from file
    Import {
        /// Input file path
        #[arg(short, long)]
        input: PathBuf,
    },

    /// Run an in-memory walkthrough
    Demo,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = LedgerConfig {
        difficulty: usize::from(cli.difficulty),
        mining_reward: cli.reward,
        workers: cli.workers,
    };

    // Commands that don't need the stored ledger
    match &cli.command {
        Commands::Keygen => return cli::cmd_keygen(),
        Commands::Init => return cli::cmd_init(&cli.data_dir, config),
        Commands::Demo => return cli::cmd_demo(config),
        _ => {}
    }

    let mut state = AppState::new(cli.data_dir.clone(), config)?;

    match cli.command {
        Commands::Keygen | Commands::Init | Commands::Demo => unreachable!(),

        Commands::Send {
            private_key,
            to,
            amount,
        } => {
            cli::cmd_send(&mut state, &private_key, &to, amount)?;
        }

        Commands::Mine { address, count } => {
            cli::cmd_mine(&mut state, &address, count)?;
        }

        Commands::Balance { address } => {
            cli::cmd_balance(&state, &address)?;
        }

        Commands::Chain { count } => {
            cli::cmd_chain(&state, count)?;
        }

        Commands::Pending => {
            cli::cmd_pending(&state)?;
        }

        Commands::Validate => {
            cli::cmd_validate(&state)?;
        }

        Commands::Export { output } => {
            cli::cmd_export(&state, &output)?;
        }

        Commands::Import { input } => {
            cli::cmd_import(&mut state, &input)?;
        }
    }

    Ok(())
}
