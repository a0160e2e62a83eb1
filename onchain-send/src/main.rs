//! On-chain Send CLI
//!
//! Compose, confirm and submit on-chain sends and sweeps.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use onchain_send::{config::SendConfig, units::CurrencyUnit};

mod commands;

#[derive(Parser)]
#[command(name = "onchain-send")]
#[command(about = "Send and sweep on-chain funds through a node")]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Custom config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send funds to an address
    Send {
        /// Recipient address
        address: String,

        /// Amount to send, in --unit
        #[arg(required_unless_present = "sweep")]
        amount: Option<f64>,

        /// Unit of the amount: sats, btc or fiat
        #[arg(long, default_value = "sats")]
        unit: CurrencyUnit,

        /// Target confirmation blocks
        #[arg(long, required_unless_present = "fee_rate")]
        target_blocks: Option<u32>,

        /// Fee rate in sats per byte
        #[arg(long, conflicts_with = "target_blocks")]
        fee_rate: Option<u64>,

        /// Sweep the whole balance
        #[arg(long, requires = "sweep_balance")]
        sweep: bool,

        /// Sweepable balance in sats
        #[arg(long, requires = "sweep")]
        sweep_balance: Option<u64>,

        /// Skip confirmation prompt
        #[arg(long)]
        yes: bool,
    },

    /// Convert an amount between units
    Convert {
        amount: f64,

        /// Unit of the amount: sats, btc or fiat
        #[arg(long, default_value = "sats")]
        from: CurrencyUnit,

        /// Only show this unit
        #[arg(long)]
        to: Option<CurrencyUnit>,
    },

    /// Show the effective configuration
    ShowConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = SendConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Send {
            address,
            amount,
            unit,
            target_blocks,
            fee_rate,
            sweep,
            sweep_balance,
            yes,
        } => {
            let request = commands::send::SendRequest {
                address,
                amount,
                unit,
                target_blocks,
                fee_rate,
                sweep_balance: sweep_balance.filter(|_| sweep),
                skip_confirm: yes,
            };
            commands::send::run(&config, request).await
        }
        Commands::Convert { amount, from, to } => {
            commands::convert::run(&config, amount, from, to).await
        }
        Commands::ShowConfig => commands::config::run(&config, cli.config.as_deref()),
    }
}
