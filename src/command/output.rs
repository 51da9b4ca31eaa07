//! Command results and their text rendering

use super::HELP;
use crate::exchange::AssetBalance;
use crate::reconcile::LoopStatus;
use crate::tracking::{EmaPeriod, Interval, OrderStatus, TrackedOrder};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;

/// EMA for one period; `None` when history is too short
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmaReading {
    pub period: EmaPeriod,
    pub value: Option<Decimal>,
}

impl EmaReading {
    /// Signed distance of `price` above the EMA, in percent
    pub fn distance_pct(&self, price: Decimal) -> Option<Decimal> {
        let ema = self.value.filter(|v| !v.is_zero())?;
        Some(((price - ema) / ema * Decimal::ONE_HUNDRED).round_dp(2))
    }
}

/// Loop state plus tracked-order counts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStatus {
    pub loop_status: LoopStatus,
    pub active: usize,
    pub errored: usize,
    /// Filled or cancelled, awaiting prune
    pub finished: usize,
}

/// Result of a successfully executed command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    Bound(TrackedOrder),
    Orders(Vec<TrackedOrder>),
    Removed(TrackedOrder),
    Pruned(Vec<TrackedOrder>),
    Ema {
        symbol: String,
        interval: Interval,
        price: Decimal,
        readings: Vec<EmaReading>,
    },
    Price {
        symbol: String,
        price: Decimal,
    },
    Balances(Vec<AssetBalance>),
    Status(ServiceStatus),
    LoopStarted {
        interval: Duration,
    },
    LoopStopped,
    Help,
}

fn write_order(f: &mut fmt::Formatter<'_>, order: &TrackedOrder) -> fmt::Result {
    writeln!(
        f,
        "{} [{}] {} {} | {}x {} {} | exchange order {}",
        order.id,
        order.status,
        order.side,
        order.quantity,
        order.leverage,
        order.margin_type,
        order.position_side,
        order.exchange_order_id
    )
}

impl fmt::Display for CommandOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandOutput::Bound(order) => {
                writeln!(f, "Bound {}", order.id)?;
                write!(
                    f,
                    "exchange order {}, {} {} @ {}x {} {}",
                    order.exchange_order_id,
                    order.side,
                    order.quantity,
                    order.leverage,
                    order.margin_type,
                    order.position_side
                )
            }
            CommandOutput::Orders(orders) if orders.is_empty() => write!(f, "No tracked orders"),
            CommandOutput::Orders(orders) => {
                writeln!(f, "Tracked orders ({})", orders.len())?;
                orders.iter().try_for_each(|o| write_order(f, o))
            }
            CommandOutput::Removed(order) => write!(f, "Removed {}", order.id),
            CommandOutput::Pruned(orders) => {
                write!(f, "Pruned {} finished order(s)", orders.len())?;
                for order in orders {
                    write!(f, "\n  {} ({})", order.id, order.status)?;
                }
                Ok(())
            }
            CommandOutput::Ema {
                symbol,
                interval,
                price,
                readings,
            } => {
                write!(f, "{} ({}) = {}", symbol, interval, price)?;
                for reading in readings {
                    match (reading.value, reading.distance_pct(*price)) {
                        (Some(value), Some(pct)) => {
                            let sign = if pct.is_sign_negative() { "" } else { "+" };
                            write!(f, "\nEMA{}: {} ({}{}%)", reading.period, value, sign, pct)?
                        }
                        (Some(value), None) => write!(f, "\nEMA{}: {}", reading.period, value)?,
                        (None, _) => write!(f, "\nEMA{}: not enough history", reading.period)?,
                    }
                }
                Ok(())
            }
            CommandOutput::Price { symbol, price } => write!(f, "{}: {}", symbol, price),
            CommandOutput::Balances(balances) if balances.is_empty() => write!(f, "No balances"),
            CommandOutput::Balances(balances) => {
                let lines: Vec<String> = balances
                    .iter()
                    .map(|b| format!("{}: {} (available {})", b.asset, b.balance, b.available))
                    .collect();
                write!(f, "{}", lines.join("\n"))
            }
            CommandOutput::Status(ServiceStatus {
                loop_status,
                active,
                errored,
                finished,
            }) => {
                match loop_status.interval.filter(|_| loop_status.running) {
                    Some(interval) => write!(f, "Trailing loop running every {}s", interval.as_secs())?,
                    None => write!(f, "Trailing loop stopped")?,
                }
                write!(
                    f,
                    "\nOrders: {} {}, {} {}, {} finished",
                    active,
                    OrderStatus::Active,
                    errored,
                    OrderStatus::Error,
                    finished
                )?;
                let stats = &loop_status.stats;
                if stats.cycles > 0 {
                    write!(f, "\nCycles: {} ({} failed)", stats.cycles, stats.failed_cycles)?;
                }
                if let Some(report) = &stats.last_report {
                    write!(f, "\nLast cycle: {}", report)?;
                }
                Ok(())
            }
            CommandOutput::LoopStarted { interval } => {
                write!(f, "Trailing loop started, every {}s", interval.as_secs())
            }
            CommandOutput::LoopStopped => write!(f, "Trailing loop stopped"),
            CommandOutput::Help => write!(f, "{}", HELP),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reconcile::LoopStats;
    use rust_decimal_macros::dec;

    #[test]
    fn test_distance_pct() {
        let reading = EmaReading {
            period: EmaPeriod::P21,
            value: Some(dec!(50000)),
        };
        assert_eq!(reading.distance_pct(dec!(50500)), Some(dec!(1.00)));
        assert_eq!(reading.distance_pct(dec!(49000)), Some(dec!(-2.00)));

        let missing = EmaReading {
            period: EmaPeriod::P200,
            value: None,
        };
        assert_eq!(missing.distance_pct(dec!(1)), None);
    }

    #[test]
    fn test_render_ema_table() {
        let output = CommandOutput::Ema {
            symbol: "BTCUSDT".to_string(),
            interval: Interval::H4,
            price: dec!(50500),
            readings: vec![
                EmaReading {
                    period: EmaPeriod::P21,
                    value: Some(dec!(50000)),
                },
                EmaReading {
                    period: EmaPeriod::P200,
                    value: None,
                },
            ],
        };
        let text = output.to_string();
        assert!(text.starts_with("BTCUSDT (4h) = 50500"));
        assert!(text.contains("EMA21: 50000 (+1.00%)"));
        assert!(text.contains("EMA200: not enough history"));
    }

    #[test]
    fn test_render_status() {
        let output = CommandOutput::Status(ServiceStatus {
            loop_status: LoopStatus {
                running: false,
                interval: None,
                started_at: None,
                stats: LoopStats::default(),
            },
            active: 2,
            errored: 1,
            finished: 3,
        });
        let text = output.to_string();
        assert!(text.contains("Trailing loop stopped"));
        assert!(text.contains("2 active, 1 error, 3 finished"));
    }

    #[test]
    fn test_render_empty_list() {
        assert_eq!(CommandOutput::Orders(vec![]).to_string(), "No tracked orders");
    }
}
