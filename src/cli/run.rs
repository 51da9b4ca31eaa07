//! Run command implementation

use super::build_service;
use crate::command::{Command, TrailService};
use crate::config::Config;
use clap::Args;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Seconds between reconciliation cycles (overrides config)
    #[arg(short, long)]
    pub interval: Option<u64>,

    /// Start with the loop stopped; use /start_bot from the console
    #[arg(long)]
    pub paused: bool,

    /// Do not read chat commands from stdin
    #[arg(long)]
    pub no_console: bool,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let mut service = build_service(config)?;
        if let Some(secs) = self.interval {
            service = service.with_loop_interval(Duration::from_secs(secs));
        }

        if !self.paused {
            let interval = service.start_loop(None).await?;
            println!("Trailing loop started, every {}s", interval.as_secs());
        }
        if !self.no_console {
            println!("Type /help for commands, Ctrl+C to exit");
        }

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut console_open = !self.no_console;

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received shutdown signal");
                    break;
                }
                line = lines.next_line(), if console_open => match line {
                    Ok(Some(line)) => handle_line(&service, &line).await,
                    Ok(None) => {
                        tracing::debug!("Console closed, running until Ctrl+C");
                        console_open = false;
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Console read failed");
                        console_open = false;
                    }
                },
            }
        }

        service.shutdown().await;
        Ok(())
    }
}

async fn handle_line(service: &TrailService, line: &str) {
    if line.trim().is_empty() {
        return;
    }
    let result = match Command::parse_chat(line) {
        Ok(command) => service.execute(command).await,
        Err(e) => Err(e.into()),
    };
    match result {
        Ok(output) => println!("{}", output),
        Err(e) => println!("Error: {}", e),
    }
}
