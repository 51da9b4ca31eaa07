//! Core entry points shared by every front end

use super::{Command, CommandOutput, EmaReading, ServiceStatus};
use crate::error::{Result, TrailError};
use crate::exchange::{AssetBalance, ExchangeGateway, ExchangeOrderType};
use crate::indicator::{calculate_ema, IndicatorError};
use crate::notify::Notifier;
use crate::reconcile::{ReconcileConfig, Reconciler, TrailingLoop};
use crate::tracking::{
    normalize_symbol, AccountContext, EmaPeriod, ExchangeOrderId, Interval, OrderStatus,
    OrderStore, Side, TrackedOrder,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;

/// Loop interval used when a start request names none
pub const DEFAULT_LOOP_INTERVAL: Duration = Duration::from_secs(60);

/// Bind, query and loop control over one store and one exchange
pub struct TrailService {
    store: Arc<OrderStore>,
    gateway: Arc<dyn ExchangeGateway>,
    reconciler: Arc<Reconciler>,
    trailing: TrailingLoop,
    loop_interval: Duration,
}

impl TrailService {
    pub fn new(
        store: Arc<OrderStore>,
        gateway: Arc<dyn ExchangeGateway>,
        notifier: Arc<dyn Notifier>,
        config: ReconcileConfig,
    ) -> Self {
        let reconciler = Arc::new(Reconciler::new(
            store.clone(),
            gateway.clone(),
            notifier,
            config,
        ));
        Self {
            store,
            gateway,
            trailing: TrailingLoop::new(reconciler.clone()),
            reconciler,
            loop_interval: DEFAULT_LOOP_INTERVAL,
        }
    }

    /// Interval used by [`TrailService::start_loop`] when none is given
    pub fn with_loop_interval(mut self, interval: Duration) -> Self {
        self.loop_interval = interval;
        self
    }

    pub fn reconciler(&self) -> &Arc<Reconciler> {
        &self.reconciler
    }

    /// Start tracking the open `side` limit order on `symbol`.
    ///
    /// `exchange_order_id` picks one order when several match. Leverage and
    /// margin type come from the account; the quantity is the order's own.
    pub async fn bind(
        &self,
        symbol: &str,
        interval: Interval,
        ema_period: EmaPeriod,
        side: Side,
        exchange_order_id: Option<ExchangeOrderId>,
    ) -> Result<TrackedOrder> {
        let symbol = symbol_arg(symbol)?;
        let id = TrackedOrder::derive_id(&symbol, interval, ema_period, side);
        let tracked = self.store.list().await?;
        if let Some(existing) = tracked.iter().find(|o| o.id == id) {
            if existing.status == OrderStatus::Active {
                return Err(TrailError::AlreadyTracked(id));
            }
        }

        // Exchange orders another live record is already trailing
        let owner_of = |order_id: ExchangeOrderId| {
            tracked.iter().find(|o| {
                o.id != id
                    && o.status.is_live()
                    && o.symbol == symbol
                    && o.exchange_order_id == order_id
            })
        };
        if let Some(owner) = exchange_order_id.and_then(owner_of) {
            return Err(TrailError::InvalidBinding(format!(
                "exchange order {} is already tracked by {}",
                owner.exchange_order_id, owner.id
            )));
        }

        let candidates: Vec<_> = self
            .gateway
            .open_orders(&symbol)
            .await?
            .into_iter()
            .filter(|o| o.side == side)
            .filter(|o| exchange_order_id.map_or(true, |wanted| o.order_id == wanted))
            .filter(|o| owner_of(o.order_id).is_none())
            .collect();

        let live = match candidates.as_slice() {
            [] => {
                return Err(TrailError::InvalidBinding(match exchange_order_id {
                    Some(wanted) => format!("no open {} order {} on {}", side, wanted, symbol),
                    None => format!("no open {} order on {}", side, symbol),
                }))
            }
            [one] => one.clone(),
            many => {
                let ids: Vec<String> = many.iter().map(|o| o.order_id.to_string()).collect();
                return Err(TrailError::InvalidBinding(format!(
                    "{} open {} orders on {} ({}); pass an order id",
                    many.len(),
                    side,
                    symbol,
                    ids.join(", ")
                )));
            }
        };

        if live.order_type != ExchangeOrderType::Limit {
            return Err(TrailError::InvalidBinding(format!(
                "order {} is {:?}, only limit orders can be tracked",
                live.order_id, live.order_type
            )));
        }
        if live.orig_qty <= Decimal::ZERO {
            return Err(TrailError::InvalidBinding(format!(
                "order {} has no quantity",
                live.order_id
            )));
        }

        let mode = self.gateway.position_mode().await?;
        if !mode.accepts(live.position_side) {
            return Err(TrailError::InvalidBinding(format!(
                "order {} uses position side {} but the account is in {} mode",
                live.order_id, live.position_side, mode
            )));
        }

        let settings = self.gateway.symbol_settings(&symbol).await?;
        let order = TrackedOrder::new(
            symbol,
            interval,
            ema_period,
            side,
            live.orig_qty,
            live.order_id,
            AccountContext {
                leverage: settings.leverage,
                margin_type: settings.margin_type,
                position_side: live.position_side,
            },
        );

        self.store.bind(order).await
    }

    pub async fn list(&self) -> Result<Vec<TrackedOrder>> {
        self.store.list().await
    }

    /// Cancel the exchange order if it may still rest, then forget the record
    pub async fn remove(&self, id: &str) -> Result<TrackedOrder> {
        self.store.remove(id, self.gateway.as_ref()).await
    }

    /// Drop filled and cancelled records
    pub async fn prune(&self) -> Result<Vec<TrackedOrder>> {
        self.store.prune().await
    }

    pub async fn query_ema(
        &self,
        symbol: &str,
        interval: Interval,
        ema_period: EmaPeriod,
    ) -> Result<Decimal> {
        let symbol = symbol_arg(symbol)?;
        let now = self.reconciler.evaluation_time().await;
        self.reconciler.ema(&symbol, interval, ema_period, now).await
    }

    /// Current price and the EMA for every supported period
    pub async fn ema_table(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<(Decimal, Vec<EmaReading>)> {
        let symbol = symbol_arg(symbol)?;
        let now = self.reconciler.evaluation_time().await;
        let limit = EmaPeriod::ALL
            .iter()
            .map(|p| self.reconciler.config().candle_limit(*p))
            .max()
            .unwrap_or_default();

        let candles = self.gateway.candles(&symbol, interval, limit).await?;
        let price = self.gateway.current_price(&symbol).await?;

        let readings = EmaPeriod::ALL
            .iter()
            .map(|&period| {
                let value = match calculate_ema(&candles, period.value() as usize, now) {
                    Ok(value) => Some(value),
                    Err(IndicatorError::InsufficientData { .. }) => None,
                };
                EmaReading { period, value }
            })
            .collect();

        Ok((price, readings))
    }

    pub async fn query_price(&self, symbol: &str) -> Result<Decimal> {
        let symbol = symbol_arg(symbol)?;
        Ok(self.gateway.current_price(&symbol).await?)
    }

    pub async fn query_balance(&self) -> Result<Vec<AssetBalance>> {
        Ok(self.gateway.balances().await?)
    }

    pub async fn status(&self) -> Result<ServiceStatus> {
        let orders = self.store.list().await?;
        let count = |status: OrderStatus| orders.iter().filter(|o| o.status == status).count();
        Ok(ServiceStatus {
            loop_status: self.trailing.status().await,
            active: count(OrderStatus::Active),
            errored: count(OrderStatus::Error),
            finished: orders.iter().filter(|o| o.status.is_terminal()).count(),
        })
    }

    /// Start the trailing loop, returning the interval in use
    pub async fn start_loop(&self, interval: Option<Duration>) -> Result<Duration> {
        let interval = interval.unwrap_or(self.loop_interval);
        self.trailing.start(interval).await?;
        Ok(interval)
    }

    pub async fn stop_loop(&self) -> Result<()> {
        self.trailing.stop().await
    }

    /// Stop the loop if it is running
    pub async fn shutdown(&self) {
        self.trailing.shutdown().await
    }

    /// Run one command
    pub async fn execute(&self, command: Command) -> Result<CommandOutput> {
        tracing::debug!(?command, "Executing command");

        let output = match command {
            Command::Bind {
                symbol,
                interval,
                ema_period,
                side,
                exchange_order_id,
            } => CommandOutput::Bound(
                self.bind(&symbol, interval, ema_period, side, exchange_order_id)
                    .await?,
            ),
            Command::List => CommandOutput::Orders(self.list().await?),
            Command::Remove { id } => CommandOutput::Removed(self.remove(&id).await?),
            Command::Prune => CommandOutput::Pruned(self.prune().await?),
            Command::Ema {
                symbol,
                interval,
                ema_period: Some(period),
            } => {
                let value = self.query_ema(&symbol, interval, period).await?;
                let price = self.query_price(&symbol).await?;
                CommandOutput::Ema {
                    symbol: symbol_arg(&symbol)?,
                    interval,
                    price,
                    readings: vec![EmaReading {
                        period,
                        value: Some(value),
                    }],
                }
            }
            Command::Ema {
                symbol,
                interval,
                ema_period: None,
            } => {
                let (price, readings) = self.ema_table(&symbol, interval).await?;
                CommandOutput::Ema {
                    symbol: symbol_arg(&symbol)?,
                    interval,
                    price,
                    readings,
                }
            }
            Command::Price { symbol } => {
                let price = self.query_price(&symbol).await?;
                CommandOutput::Price {
                    symbol: symbol_arg(&symbol)?,
                    price,
                }
            }
            Command::Balance => CommandOutput::Balances(self.query_balance().await?),
            Command::Status => CommandOutput::Status(self.status().await?),
            Command::StartLoop { interval } => CommandOutput::LoopStarted {
                interval: self.start_loop(interval).await?,
            },
            Command::StopLoop => {
                self.stop_loop().await?;
                CommandOutput::LoopStopped
            }
            Command::Help => CommandOutput::Help,
        };

        Ok(output)
    }
}

fn symbol_arg(raw: &str) -> Result<String> {
    normalize_symbol(raw).ok_or_else(|| TrailError::InvalidCommand(format!("invalid symbol '{}'", raw)))
}
