//! Arguments of the one-shot order and query subcommands

use crate::command::Command;
use crate::tracking::{EmaPeriod, Interval, Side};
use clap::Args;

#[derive(Args, Debug)]
pub struct BindArgs {
    /// Trading pair, e.g. BTC or BTCUSDT
    pub symbol: String,
    /// Candle interval: 15m, 1h, 4h, 1d, 1w or 1M
    pub interval: Interval,
    /// EMA period: 21, 55, 100 or 200
    pub ema: EmaPeriod,
    /// Order side: BUY or SELL
    pub side: Side,
    /// Exchange order id, required when several orders match
    #[arg(long)]
    pub order_id: Option<u64>,
}

impl BindArgs {
    pub fn to_command(&self) -> Command {
        Command::Bind {
            symbol: self.symbol.clone(),
            interval: self.interval,
            ema_period: self.ema,
            side: self.side,
            exchange_order_id: self.order_id,
        }
    }
}

#[derive(Args, Debug)]
pub struct EmaArgs {
    /// Trading pair, e.g. BTC or BTCUSDT
    pub symbol: String,
    /// Candle interval: 15m, 1h, 4h, 1d, 1w or 1M
    pub interval: Interval,
    /// Single EMA period; every supported period when omitted
    pub ema: Option<EmaPeriod>,
}

impl EmaArgs {
    pub fn to_command(&self) -> Command {
        Command::Ema {
            symbol: self.symbol.clone(),
            interval: self.interval,
            ema_period: self.ema,
        }
    }
}
