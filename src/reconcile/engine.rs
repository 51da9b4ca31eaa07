//! One reconciliation cycle over every live tracked order

use crate::error::{Result, TrailError};
use crate::exchange::{
    ExchangeGateway, ExchangeOrder, ExchangeOrderStatus, ExchangeOrderType, GatewayError,
    LimitOrderRequest, MAX_KLINE_LIMIT,
};
use crate::indicator::calculate_ema;
use crate::notify::{Event, Notifier};
use crate::telemetry::{self, CounterMetric, GaugeMetric};
use crate::tracking::{EmaPeriod, ExchangeOrderId, Interval, OrderStatus, OrderStore, TrackedOrder};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Reconciliation parameters
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Relative deviation that must be exceeded before an order is re-priced
    pub price_threshold: Decimal,
    /// Decimal places of replacement prices
    pub price_scale: u32,
    /// Candles fetched per EMA = period * history_factor + 1
    pub history_factor: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            price_threshold: dec!(0.003),
            price_scale: 8,
            history_factor: 3,
        }
    }
}

impl ReconcileConfig {
    /// Number of candles to request for `period`
    pub fn candle_limit(&self, period: EmaPeriod) -> usize {
        let period = period.value() as usize;
        (period * self.history_factor.max(1) + 1).min(MAX_KLINE_LIMIT)
    }
}

/// Relative distance of `ema` from `order_price`
pub fn deviation(order_price: Decimal, ema: Decimal) -> Decimal {
    if order_price.is_zero() {
        return Decimal::MAX;
    }
    ((order_price - ema) / order_price).abs()
}

/// What happened to each order during a cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Live records looked at
    pub examined: usize,
    /// Re-priced at the EMA
    pub replaced: usize,
    /// Within threshold or partially filled
    pub kept: usize,
    /// Moved to filled or cancelled
    pub finalized: usize,
    /// Not enough candle history
    pub skipped: usize,
    /// Gateway failures
    pub errors: usize,
}

impl CycleReport {
    fn record(&mut self, outcome: Outcome) {
        let counter = match outcome {
            Outcome::Kept => &mut self.kept,
            Outcome::Replaced => &mut self.replaced,
            Outcome::Finalized => &mut self.finalized,
            Outcome::Skipped => &mut self.skipped,
            Outcome::Failed => &mut self.errors,
            Outcome::Vanished => return,
        };
        *counter += 1;
        self.examined += 1;
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} examined, {} replaced, {} kept, {} finalized, {} skipped, {} errors",
            self.examined, self.replaced, self.kept, self.finalized, self.skipped, self.errors
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Kept,
    Replaced,
    Finalized,
    Skipped,
    Failed,
    /// Removed by a concurrent command before its turn
    Vanished,
}

/// Decision for one order, reached without touching the store
#[derive(Debug)]
enum Decision {
    Keep {
        deviation: Option<Decimal>,
    },
    Finalize {
        status: OrderStatus,
        event: Event,
    },
    Replaced {
        old_price: Decimal,
        new_price: Decimal,
        new_exchange_order_id: ExchangeOrderId,
    },
    /// The tracked order is gone but its unsaved replacement still rests
    Adopt {
        old_price: Decimal,
        orphan: ExchangeOrder,
    },
    Skip {
        needed: usize,
        available: usize,
    },
    /// Read failed; the record is left untouched
    ReadFailed(GatewayError),
    /// Cancel or place failed; the record moves to `error`
    WriteFailed(GatewayError),
}

/// Drives cancel/replace decisions for tracked orders
pub struct Reconciler {
    store: Arc<OrderStore>,
    gateway: Arc<dyn ExchangeGateway>,
    notifier: Arc<dyn Notifier>,
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(
        store: Arc<OrderStore>,
        gateway: Arc<dyn ExchangeGateway>,
        notifier: Arc<dyn Notifier>,
        config: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<OrderStore> {
        &self.store
    }

    pub fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    /// Deliver an event; delivery failures are logged and dropped
    pub async fn notify(&self, event: &Event) {
        if let Err(e) = self.notifier.notify(event).await {
            tracing::warn!(event = event.name(), error = %e, "Notification failed");
        }
    }

    /// Exchange clock, or the local clock when the exchange cannot be reached
    pub async fn evaluation_time(&self) -> DateTime<Utc> {
        match self.gateway.server_time().await {
            Ok(now) => now,
            Err(e) => {
                tracing::warn!(error = %e, "Server time unavailable, using local clock");
                Utc::now()
            }
        }
    }

    /// EMA of the closed candles for `(symbol, interval)` as of `now`
    pub async fn ema(
        &self,
        symbol: &str,
        interval: Interval,
        period: EmaPeriod,
        now: DateTime<Utc>,
    ) -> Result<Decimal> {
        let candles = self
            .gateway
            .candles(symbol, interval, self.config.candle_limit(period))
            .await?;
        Ok(calculate_ema(&candles, period.value() as usize, now)?)
    }

    /// Run one cycle over every live record.
    ///
    /// Per-order gateway failures become [`Event::OrderError`]; only a store
    /// failure aborts the cycle.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let started = Instant::now();
        let now = self.evaluation_time().await;

        let ids: Vec<String> = self
            .store
            .list()
            .await?
            .into_iter()
            .filter(|o| o.status.is_live())
            .map(|o| o.id)
            .collect();

        let mut report = CycleReport::default();
        for id in &ids {
            let (outcome, events) = match self.reconcile_order(id, now).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(order_id = %id, error = %e, "Store failure, aborting cycle");
                    return Err(e);
                }
            };
            for event in &events {
                self.notify(event).await;
            }
            report.record(outcome);
        }

        let live = self
            .store
            .list()
            .await?
            .iter()
            .filter(|o| o.status.is_live())
            .count();

        telemetry::increment(CounterMetric::Cycles);
        telemetry::record_cycle_duration(started.elapsed());
        telemetry::set_gauge(GaugeMetric::ActiveOrders, live as f64);

        tracing::info!(
            examined = report.examined,
            replaced = report.replaced,
            kept = report.kept,
            finalized = report.finalized,
            skipped = report.skipped,
            errors = report.errors,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Reconciliation cycle complete"
        );
        Ok(report)
    }

    /// Process one record while holding the store lock
    async fn reconcile_order(
        &self,
        id: &str,
        now: DateTime<Utc>,
    ) -> Result<(Outcome, Vec<Event>)> {
        let mut guard = self.store.lock().await?;
        let Some(mut order) = guard.get(id).cloned() else {
            return Ok((Outcome::Vanished, vec![]));
        };
        if !order.status.is_live() {
            return Ok((Outcome::Vanished, vec![]));
        }

        let claimed: Vec<ExchangeOrderId> = guard
            .orders()
            .iter()
            .filter(|o| o.status.is_live() && o.symbol == order.symbol)
            .map(|o| o.exchange_order_id)
            .collect();

        let decision = self.decide(&order, &claimed, now).await;
        let mut events = vec![];

        let outcome = match decision {
            Decision::Keep { deviation } => {
                tracing::debug!(
                    order_id = %order.id,
                    deviation = ?deviation,
                    "Order within threshold"
                );
                if order.status == OrderStatus::Error {
                    order.status = OrderStatus::Active;
                    guard.put(order.clone());
                    guard.commit().await?;
                    tracing::info!(order_id = %order.id, "Order recovered");
                }
                Outcome::Kept
            }
            Decision::Finalize { status, event } => {
                order.status = status;
                guard.put(order.clone());
                guard.commit().await?;
                telemetry::record_finalized(match status {
                    OrderStatus::Filled => "filled",
                    _ => "cancelled",
                });
                tracing::info!(order_id = %order.id, %status, "Order finalized");
                events.push(event);
                Outcome::Finalized
            }
            Decision::Replaced {
                old_price,
                new_price,
                new_exchange_order_id,
            } => {
                let old_exchange_order_id = order.exchange_order_id;
                order.exchange_order_id = new_exchange_order_id;
                order.status = OrderStatus::Active;
                guard.put(order.clone());
                if let Err(e) = guard.commit().await {
                    drop(guard);
                    telemetry::increment(CounterMetric::OrderErrors);
                    tracing::error!(
                        order_id = %order.id,
                        old_exchange_order_id,
                        new_exchange_order_id,
                        %new_price,
                        error = %e,
                        "Replacement placed but not saved"
                    );
                    self.notify(&Event::OrderError {
                        id: order.id.clone(),
                        detail: format!(
                            "replacement order {} at {} placed but not saved: {}",
                            new_exchange_order_id, new_price, e
                        ),
                    })
                    .await;
                    return Err(e.into());
                }
                telemetry::increment(CounterMetric::Replacements);
                tracing::info!(
                    order_id = %order.id,
                    %old_price,
                    %new_price,
                    old_exchange_order_id,
                    new_exchange_order_id,
                    "Order re-priced at EMA"
                );
                events.push(Event::OrderUpdated {
                    id: order.id.clone(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    old_price,
                    new_price,
                    old_exchange_order_id,
                    new_exchange_order_id,
                });
                Outcome::Replaced
            }
            Decision::Adopt { old_price, orphan } => {
                let old_exchange_order_id = order.exchange_order_id;
                order.exchange_order_id = orphan.order_id;
                order.status = OrderStatus::Active;
                guard.put(order.clone());
                guard.commit().await?;
                tracing::warn!(
                    order_id = %order.id,
                    old_exchange_order_id,
                    new_exchange_order_id = orphan.order_id,
                    price = %orphan.price,
                    "Adopted untracked replacement order"
                );
                events.push(Event::OrderUpdated {
                    id: order.id.clone(),
                    symbol: order.symbol.clone(),
                    side: order.side,
                    old_price,
                    new_price: orphan.price,
                    old_exchange_order_id,
                    new_exchange_order_id: orphan.order_id,
                });
                Outcome::Kept
            }
            Decision::Skip { needed, available } => {
                tracing::info!(
                    order_id = %order.id,
                    needed,
                    available,
                    "Not enough closed candles, skipping"
                );
                Outcome::Skipped
            }
            Decision::ReadFailed(e) => {
                telemetry::increment(CounterMetric::OrderErrors);
                tracing::warn!(order_id = %order.id, error = %e, "Exchange read failed");
                events.push(Event::OrderError {
                    id: order.id.clone(),
                    detail: e.to_string(),
                });
                Outcome::Failed
            }
            Decision::WriteFailed(e) => {
                order.status = OrderStatus::Error;
                guard.put(order.clone());
                guard.commit().await?;
                telemetry::increment(CounterMetric::OrderErrors);
                tracing::warn!(order_id = %order.id, error = %e, "Replace failed, order marked error");
                events.push(Event::OrderError {
                    id: order.id.clone(),
                    detail: format!("replace failed: {}", e),
                });
                Outcome::Failed
            }
        };

        Ok((outcome, events))
    }

    /// Query the exchange and act on it, without touching the store
    async fn decide(
        &self,
        order: &TrackedOrder,
        claimed: &[ExchangeOrderId],
        now: DateTime<Utc>,
    ) -> Decision {
        let live = match self
            .gateway
            .order(&order.symbol, order.exchange_order_id)
            .await
        {
            Ok(live) => live,
            Err(e) => return Decision::ReadFailed(e),
        };

        if live.status == ExchangeOrderStatus::Canceled {
            match self.find_orphan(order, &live, claimed).await {
                Ok(Some(orphan)) => {
                    return Decision::Adopt {
                        old_price: live.price,
                        orphan,
                    }
                }
                Ok(None) => {}
                Err(e) => return Decision::ReadFailed(e),
            }
        }

        // A failed replace whose cancel went through is re-placed unconditionally
        let replace_cancelled =
            order.status == OrderStatus::Error && live.status == ExchangeOrderStatus::Canceled;

        if !replace_cancelled {
            match live.status {
                ExchangeOrderStatus::Filled => {
                    return Decision::Finalize {
                        status: OrderStatus::Filled,
                        event: Event::OrderFilled {
                            id: order.id.clone(),
                            symbol: order.symbol.clone(),
                            side: order.side,
                            quantity: live.executed_qty,
                            avg_price: live.avg_price,
                        },
                    }
                }
                ExchangeOrderStatus::Canceled
                | ExchangeOrderStatus::Expired
                | ExchangeOrderStatus::Rejected => {
                    return Decision::Finalize {
                        status: OrderStatus::Cancelled,
                        event: Event::OrderCancelledExternally {
                            id: order.id.clone(),
                            symbol: order.symbol.clone(),
                            exchange_status: live.status,
                        },
                    }
                }
                // Re-posting would place the full quantity again
                ExchangeOrderStatus::PartiallyFilled => {
                    tracing::info!(
                        order_id = %order.id,
                        executed = %live.executed_qty,
                        "Order partially filled, not re-pricing"
                    );
                    return Decision::Keep { deviation: None };
                }
                ExchangeOrderStatus::New => {}
            }
        }

        let ema = match self
            .ema(&order.symbol, order.interval, order.ema_period, now)
            .await
        {
            Ok(ema) => ema,
            Err(TrailError::InsufficientData { needed, available }) => {
                return Decision::Skip { needed, available }
            }
            Err(TrailError::ExchangeUnavailable(e)) => return Decision::ReadFailed(e),
            Err(e) => return Decision::ReadFailed(GatewayError::Unavailable(e.to_string())),
        };

        if !replace_cancelled {
            let drift = deviation(live.price, ema);
            if drift <= self.config.price_threshold {
                return Decision::Keep {
                    deviation: Some(drift),
                };
            }
            tracing::info!(
                order_id = %order.id,
                price = %live.price,
                %ema,
                deviation = %drift,
                "Deviation above threshold"
            );
        }

        self.replace(order, &live, ema, !replace_cancelled).await
    }

    /// A replacement placed for `order` whose new id never reached the store.
    ///
    /// Matches an unclaimed open limit order with the same side, position side
    /// and quantity that was placed after the cancelled one. Only a single
    /// match is adopted.
    async fn find_orphan(
        &self,
        order: &TrackedOrder,
        cancelled: &ExchangeOrder,
        claimed: &[ExchangeOrderId],
    ) -> std::result::Result<Option<ExchangeOrder>, GatewayError> {
        let mut matches: Vec<ExchangeOrder> = self
            .gateway
            .open_orders(&order.symbol)
            .await?
            .into_iter()
            .filter(|o| {
                o.order_id > cancelled.order_id
                    && !claimed.contains(&o.order_id)
                    && o.order_type == ExchangeOrderType::Limit
                    && o.side == order.side
                    && o.position_side == order.position_side
                    && o.orig_qty == order.quantity
            })
            .collect();

        if matches.len() > 1 {
            tracing::warn!(
                order_id = %order.id,
                candidates = matches.len(),
                "Several untracked orders could be the replacement, adopting none"
            );
            return Ok(None);
        }
        Ok(matches.pop())
    }

    /// Cancel (when still resting) and re-place at the EMA
    async fn replace(
        &self,
        order: &TrackedOrder,
        live: &ExchangeOrder,
        ema: Decimal,
        cancel_first: bool,
    ) -> Decision {
        if cancel_first {
            if let Err(e) = self
                .gateway
                .cancel_order(&order.symbol, order.exchange_order_id)
                .await
            {
                return Decision::WriteFailed(e);
            }
        }

        let new_price = ema.round_dp(self.config.price_scale);
        let request = LimitOrderRequest {
            symbol: order.symbol.clone(),
            side: order.side,
            price: new_price,
            quantity: order.quantity,
            leverage: order.leverage,
            margin_type: order.margin_type,
            position_side: order.position_side,
        };

        match self.gateway.place_limit_order(&request).await {
            Ok(new_exchange_order_id) => Decision::Replaced {
                old_price: live.price,
                new_price,
                new_exchange_order_id,
            },
            Err(e) => Decision::WriteFailed(e),
        }
    }
}
