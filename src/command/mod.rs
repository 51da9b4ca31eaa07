//! Command surface
//!
//! Every front end (argument-list CLI, chat console) turns its input into a
//! [`Command`] and hands it to [`TrailService::execute`].

mod output;
mod service;

pub use output::{CommandOutput, EmaReading, ServiceStatus};
pub use service::{TrailService, DEFAULT_LOOP_INTERVAL};

use crate::error::TrailError;
use crate::tracking::{normalize_symbol, EmaPeriod, ExchangeOrderId, Interval, Side};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Chat command parse errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("empty command")]
    Empty,
    #[error("unknown command '/{0}' (try /help)")]
    Unknown(String),
    #[error("missing {argument}; usage: {usage}")]
    MissingArgument {
        argument: &'static str,
        usage: &'static str,
    },
    #[error("invalid {argument}: {reason}")]
    InvalidArgument {
        argument: &'static str,
        reason: String,
    },
    #[error("too many arguments; usage: {0}")]
    TooManyArguments(&'static str),
}

impl From<CommandError> for TrailError {
    fn from(err: CommandError) -> Self {
        TrailError::InvalidCommand(err.to_string())
    }
}

/// A validated request to the core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Start tracking a resting limit order
    Bind {
        symbol: String,
        interval: Interval,
        ema_period: EmaPeriod,
        side: Side,
        /// Pick this order when several match
        exchange_order_id: Option<ExchangeOrderId>,
    },
    List,
    Remove {
        id: String,
    },
    /// Drop filled and cancelled records
    Prune,
    /// One EMA, or every supported period when `ema_period` is `None`
    Ema {
        symbol: String,
        interval: Interval,
        ema_period: Option<EmaPeriod>,
    },
    Price {
        symbol: String,
    },
    Balance,
    Status,
    StartLoop {
        interval: Option<Duration>,
    },
    StopLoop,
    Help,
}

const BIND_USAGE: &str = "/bind SYMBOL INTERVAL EMA SIDE [ORDER_ID]";
const REMOVE_USAGE: &str = "/remove ID";
const EMA_USAGE: &str = "/ema SYMBOL INTERVAL [EMA]";
const PRICE_USAGE: &str = "/price SYMBOL";
const START_USAGE: &str = "/start_bot [SECONDS]";

/// Chat help text
pub const HELP: &str = "\
/bind SYMBOL INTERVAL EMA SIDE [ORDER_ID]  track a resting limit order
/list                                     tracked orders
/remove ID                                cancel and stop tracking
/prune                                    drop filled and cancelled records
/ema SYMBOL INTERVAL [EMA]                EMA values and distance from price
/price SYMBOL                             last price
/balance                                  account balances
/status                                   loop state and tracked counts
/start_bot [SECONDS]                      start the trailing loop
/stop_bot                                 stop the trailing loop
/help                                     this message

Intervals: 15m 1h 4h 1d 1w 1M. EMA periods: 21 55 100 200. Sides: BUY SELL.";

impl Command {
    /// Parse one chat line such as `/bind btc 4h 21 buy`
    pub fn parse_chat(line: &str) -> Result<Self, CommandError> {
        let mut tokens = line.split_whitespace();
        let head = tokens.next().ok_or(CommandError::Empty)?;
        let name = head.trim_start_matches('/');
        // Telegram group syntax: /list@SomeBot
        let name = name.split('@').next().unwrap_or(name).to_lowercase();
        let args: Vec<&str> = tokens.collect();

        let command = match name.as_str() {
            "bind" => {
                let [symbol, interval, period, side, rest @ ..] = args.as_slice() else {
                    return Err(missing(&args, &["SYMBOL", "INTERVAL", "EMA", "SIDE"], BIND_USAGE));
                };
                let exchange_order_id = match rest {
                    [] => None,
                    [id] => Some(id.parse().map_err(|_| CommandError::InvalidArgument {
                        argument: "ORDER_ID",
                        reason: format!("'{}' is not an order id", id),
                    })?),
                    _ => return Err(CommandError::TooManyArguments(BIND_USAGE)),
                };
                Command::Bind {
                    symbol: parse_symbol(symbol)?,
                    interval: parse_arg("INTERVAL", interval)?,
                    ema_period: parse_arg("EMA", period)?,
                    side: parse_arg("SIDE", side)?,
                    exchange_order_id,
                }
            }
            "list" => Command::List,
            "remove" | "unbind" => match args.as_slice() {
                [id] => Command::Remove { id: id.to_string() },
                [] => {
                    return Err(CommandError::MissingArgument {
                        argument: "ID",
                        usage: REMOVE_USAGE,
                    })
                }
                _ => return Err(CommandError::TooManyArguments(REMOVE_USAGE)),
            },
            "prune" => Command::Prune,
            "ema" => match args.as_slice() {
                [symbol, interval] => Command::Ema {
                    symbol: parse_symbol(symbol)?,
                    interval: parse_arg("INTERVAL", interval)?,
                    ema_period: None,
                },
                [symbol, interval, period] => Command::Ema {
                    symbol: parse_symbol(symbol)?,
                    interval: parse_arg("INTERVAL", interval)?,
                    ema_period: Some(parse_arg("EMA", period)?),
                },
                [_, _, _, ..] => return Err(CommandError::TooManyArguments(EMA_USAGE)),
                _ => return Err(missing(&args, &["SYMBOL", "INTERVAL"], EMA_USAGE)),
            },
            "price" => match args.as_slice() {
                [symbol] => Command::Price {
                    symbol: parse_symbol(symbol)?,
                },
                [] => {
                    return Err(CommandError::MissingArgument {
                        argument: "SYMBOL",
                        usage: PRICE_USAGE,
                    })
                }
                _ => return Err(CommandError::TooManyArguments(PRICE_USAGE)),
            },
            "balance" => Command::Balance,
            "status" => Command::Status,
            "start_bot" => match args.as_slice() {
                [] => Command::StartLoop { interval: None },
                [secs] => {
                    let secs: u64 = secs.parse().map_err(|_| CommandError::InvalidArgument {
                        argument: "SECONDS",
                        reason: format!("'{}' is not a number of seconds", secs),
                    })?;
                    Command::StartLoop {
                        interval: Some(Duration::from_secs(secs)),
                    }
                }
                _ => return Err(CommandError::TooManyArguments(START_USAGE)),
            },
            "stop_bot" => Command::StopLoop,
            "help" | "start" => Command::Help,
            other => return Err(CommandError::Unknown(other.to_string())),
        };

        Ok(command)
    }
}

fn missing(args: &[&str], names: &[&'static str], usage: &'static str) -> CommandError {
    CommandError::MissingArgument {
        argument: names.get(args.len()).copied().unwrap_or("argument"),
        usage,
    }
}

fn parse_symbol(raw: &str) -> Result<String, CommandError> {
    normalize_symbol(raw).ok_or_else(|| CommandError::InvalidArgument {
        argument: "SYMBOL",
        reason: format!("'{}' is not a symbol", raw),
    })
}

fn parse_arg<T: FromStr<Err = String>>(argument: &'static str, raw: &str) -> Result<T, CommandError> {
    raw.parse()
        .map_err(|reason| CommandError::InvalidArgument { argument, reason })
}
