//! CLI interface for ema-trail
//!
//! Provides subcommands for:
//! - `run`: Start the trailing loop with an interactive chat console
//! - `bind` / `list` / `remove` / `prune`: Manage tracked orders
//! - `ema` / `price` / `balance`: Market and account queries
//! - `status`: Show tracked-order counts
//! - `place`: Rest an order on the paper venue
//! - `config`: Show configuration

mod args;
mod place;
mod run;

pub use args::{BindArgs, EmaArgs};
pub use place::PlaceArgs;
pub use run::RunArgs;

use crate::command::{Command, TrailService};
use crate::config::{Config, ExecutionMode};
use crate::exchange::{BinanceMarketData, ExchangeGateway, PaperExchange};
use crate::notify::{FanoutNotifier, LogNotifier, TelegramNotifier};
use crate::tracking::OrderStore;
use clap::{Parser, Subcommand};
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(name = "ema-trail")]
#[command(about = "Keeps resting futures limit orders trailing an EMA")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: String,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the trailing loop with a chat console on stdin
    Run(RunArgs),
    /// Track a resting limit order
    Bind(BindArgs),
    /// List tracked orders
    List,
    /// Cancel a tracked order and stop tracking it
    Remove {
        /// Tracking id, e.g. BTCUSDT_4h_EMA21_BUY
        id: String,
    },
    /// Drop filled and cancelled records
    Prune,
    /// Show EMA values for a symbol
    Ema(EmaArgs),
    /// Show the last price of a symbol
    Price {
        /// Trading pair, e.g. BTC or BTCUSDT
        symbol: String,
    },
    /// Show account balances
    Balance,
    /// Show tracked-order counts
    Status,
    /// Rest a limit order on the paper venue
    Place(PlaceArgs),
    /// Show configuration
    Config,
}

impl Commands {
    /// The core command for one-shot subcommands
    pub fn to_command(&self) -> Option<Command> {
        let command = match self {
            Commands::Bind(args) => args.to_command(),
            Commands::List => Command::List,
            Commands::Remove { id } => Command::Remove { id: id.clone() },
            Commands::Prune => Command::Prune,
            Commands::Ema(args) => args.to_command(),
            Commands::Price { symbol } => Command::Price {
                symbol: symbol.clone(),
            },
            Commands::Balance => Command::Balance,
            Commands::Status => Command::Status,
            Commands::Run(_) | Commands::Place(_) | Commands::Config => return None,
        };
        Some(command)
    }
}

/// Paper venue over Binance public market data
pub fn paper_venue(config: &Config) -> anyhow::Result<PaperExchange<BinanceMarketData>> {
    if config.exchange.mode == ExecutionMode::Live {
        anyhow::bail!(
            "live mode needs an authenticated exchange binding, which this build does not include; \
             set exchange.mode = \"paper\""
        );
    }
    let market = BinanceMarketData::with_config(config.exchange.binance())?;
    Ok(PaperExchange::new(market, config.paper.paper()))
}

/// Log sink plus Telegram when configured
pub fn notifier(config: &Config) -> anyhow::Result<FanoutNotifier> {
    let mut fanout = FanoutNotifier::new().with(Arc::new(LogNotifier));
    if let Some(telegram) = config.notify.telegram() {
        tracing::info!(chat_id = %telegram.chat_id, "Telegram notifications enabled");
        fanout = fanout.with(Arc::new(TelegramNotifier::new(telegram)?));
    }
    Ok(fanout)
}

/// Wire store, venue and notifiers into the core service
pub fn build_service(config: &Config) -> anyhow::Result<TrailService> {
    let gateway: Arc<dyn ExchangeGateway> = Arc::new(paper_venue(config)?);
    let store = Arc::new(OrderStore::open(&config.store.path));

    tracing::debug!(
        store = %config.store.path.display(),
        mode = ?config.exchange.mode,
        "Service configured"
    );

    Ok(TrailService::new(
        store,
        gateway,
        Arc::new(notifier(config)?),
        config.reconcile.reconcile(),
    )
    .with_loop_interval(config.reconcile.interval()))
}

/// Execute a one-shot subcommand and print its output
pub async fn execute_once(command: Command, config: &Config) -> anyhow::Result<()> {
    let service = build_service(config)?;
    let output = service.execute(command).await?;
    println!("{}", output);
    Ok(())
}
