use clap::Parser;
use ema_trail::cli::{self, Cli, Commands};
use ema_trail::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config from {}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::from_env()
    });

    // Initialize telemetry
    let _telemetry = ema_trail::telemetry::init_telemetry(&config.telemetry)?;

    match &cli.command {
        Commands::Run(args) => {
            tracing::info!(mode = ?config.exchange.mode, "Starting EMA trailing");
            args.execute(&config).await?;
        }
        Commands::Place(args) => {
            args.execute(&config).await?;
        }
        Commands::Config => {
            println!("Current configuration:");
            println!(
                "  Exchange: {:?} {} (timeout {}s)",
                config.exchange.mode, config.exchange.base_url, config.exchange.timeout_secs
            );
            println!(
                "  Paper: book={} {}x {} hedge={}",
                config.paper.book_path.display(),
                config.paper.leverage,
                config.paper.margin_type,
                config.paper.hedge_mode
            );
            println!(
                "  Reconcile: every {}s, threshold={}%, scale={}",
                config.reconcile.interval_secs,
                config.reconcile.price_threshold * rust_decimal_macros::dec!(100),
                config.reconcile.price_scale
            );
            println!("  Store: {}", config.store.path.display());
            println!(
                "  Telegram: {}",
                if config.notify.telegram().is_some() { "enabled" } else { "disabled" }
            );
        }
        other => {
            if let Some(command) = other.to_command() {
                cli::execute_once(command, &config).await?;
            }
        }
    }

    Ok(())
}
