use actr::core::asset::AssetType;
use actr::core::log::init_logging;
use actr::{AppCommand, BasketCommand, DEFAULT_HISTORY_LIMIT, ReserveCommand};
use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use rust_decimal::Decimal;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP server with the cron endpoints
    Serve,
    /// Fetch prices and rates, then save a new ACT price snapshot
    Refresh {
        /// Only refresh the gold price and the ACT snapshot
        #[arg(long)]
        gold_only: bool,
    },
    /// Display the current ACT valuation
    Price,
    /// Display saved ACT price snapshots
    History {
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Recompute and save the ACT price (admin)
    ForceUpdate {
        #[arg(long)]
        actor: String,
    },
    /// Inspect or replace the basket composition
    #[command(subcommand)]
    Basket(BasketCommands),
    /// Inspect or change reserve balances
    #[command(subcommand)]
    Reserve(ReserveCommands),
}

#[derive(Subcommand)]
enum BasketCommands {
    /// Show the active basket, or the full history with --actor (admin)
    Show {
        #[arg(long)]
        actor: Option<String>,
    },
    /// Activate new basket weights (super_admin)
    Set {
        #[arg(long)]
        actor: String,
        #[arg(long)]
        gold: Decimal,
        #[arg(long)]
        usd: Decimal,
        #[arg(long)]
        eur: Decimal,
        #[arg(long, default_value = "")]
        notes: String,
    },
}

#[derive(Subcommand)]
enum ReserveCommands {
    /// List reserve balances (admin)
    List {
        #[arg(long)]
        actor: String,
    },
    /// Deposit into a reserve (super_admin)
    Add {
        #[arg(long)]
        actor: String,
        /// gold, usd or eur
        asset: AssetType,
        /// Native amount (troy ounces for gold)
        amount: Decimal,
        /// USD value of the deposit
        amount_usd: Decimal,
        #[arg(long)]
        location: Option<String>,
        #[arg(long)]
        custody_provider: Option<String>,
    },
    /// Withdraw from a reserve (super_admin)
    Withdraw {
        #[arg(long)]
        actor: String,
        asset: AssetType,
        amount: Decimal,
        amount_usd: Decimal,
        #[arg(long, default_value = "")]
        reason: String,
    },
    /// Show recent reserve transactions (admin)
    Log {
        #[arg(long)]
        actor: String,
    },
}

impl From<Commands> for AppCommand {
    fn from(cmd: Commands) -> AppCommand {
        match cmd {
            Commands::Serve => AppCommand::Serve,
            Commands::Refresh { gold_only } => AppCommand::Refresh { gold_only },
            Commands::Price => AppCommand::Price,
            Commands::History { limit } => AppCommand::History { limit },
            Commands::ForceUpdate { actor } => AppCommand::ForceUpdate { actor },
            Commands::Basket(BasketCommands::Show { actor }) => {
                AppCommand::Basket(BasketCommand::Show { actor })
            }
            Commands::Basket(BasketCommands::Set {
                actor,
                gold,
                usd,
                eur,
                notes,
            }) => AppCommand::Basket(BasketCommand::Set {
                actor,
                gold,
                usd,
                eur,
                notes,
            }),
            Commands::Reserve(ReserveCommands::List { actor }) => {
                AppCommand::Reserve(ReserveCommand::List { actor })
            }
            Commands::Reserve(ReserveCommands::Add {
                actor,
                asset,
                amount,
                amount_usd,
                location,
                custody_provider,
            }) => AppCommand::Reserve(ReserveCommand::Add {
                actor,
                asset,
                amount,
                amount_usd,
                location,
                custody_provider,
            }),
            Commands::Reserve(ReserveCommands::Withdraw {
                actor,
                asset,
                amount,
                amount_usd,
                reason,
            }) => AppCommand::Reserve(ReserveCommand::Withdraw {
                actor,
                asset,
                amount,
                amount_usd,
                reason,
            }),
            Commands::Reserve(ReserveCommands::Log { actor }) => {
                AppCommand::Reserve(ReserveCommand::Log { actor })
            }
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => actr::cli::setup::setup(),
        Some(cmd) => actr::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
