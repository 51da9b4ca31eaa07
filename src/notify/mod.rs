//! Notification module
//!
//! Status-change events delivered to log output and chat

mod log;
mod telegram;

pub use log::LogNotifier;
pub use telegram::{TelegramConfig, TelegramNotifier, TELEGRAM_API_URL};

use crate::exchange::ExchangeOrderStatus;
use crate::tracking::{ExchangeOrderId, Side};
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::fmt;
use std::sync::Arc;

/// Status-change event
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Reconciliation loop started
    BotStarted {
        interval_secs: u64,
        price_threshold: Decimal,
        tracked_orders: usize,
    },
    /// Reconciliation loop stopped
    BotStopped,
    /// Order re-priced at the EMA
    OrderUpdated {
        id: String,
        symbol: String,
        side: Side,
        old_price: Decimal,
        new_price: Decimal,
        old_exchange_order_id: ExchangeOrderId,
        new_exchange_order_id: ExchangeOrderId,
    },
    /// Exchange reports the order filled
    OrderFilled {
        id: String,
        symbol: String,
        side: Side,
        quantity: Decimal,
        avg_price: Decimal,
    },
    /// Order closed on the exchange by someone else
    OrderCancelledExternally {
        id: String,
        symbol: String,
        exchange_status: ExchangeOrderStatus,
    },
    /// Per-order failure; the order is retried next cycle
    OrderError { id: String, detail: String },
}

impl Event {
    /// Tracking id of the affected order
    pub fn order_id(&self) -> Option<&str> {
        match self {
            Event::OrderUpdated { id, .. }
            | Event::OrderFilled { id, .. }
            | Event::OrderCancelledExternally { id, .. }
            | Event::OrderError { id, .. } => Some(id),
            Event::BotStarted { .. } | Event::BotStopped => None,
        }
    }

    /// Event name as used in logs and metrics
    pub fn name(&self) -> &'static str {
        match self {
            Event::BotStarted { .. } => "bot_started",
            Event::BotStopped => "bot_stopped",
            Event::OrderUpdated { .. } => "order_updated",
            Event::OrderFilled { .. } => "order_filled",
            Event::OrderCancelledExternally { .. } => "order_cancelled_externally",
            Event::OrderError { .. } => "order_error",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::BotStarted {
                interval_secs,
                price_threshold,
                tracked_orders,
            } => write!(
                f,
                "EMA trailing started: every {}s, threshold {}%, {} tracked",
                interval_secs,
                (price_threshold * Decimal::ONE_HUNDRED).normalize(),
                tracked_orders
            ),
            Event::BotStopped => write!(f, "EMA trailing stopped"),
            Event::OrderUpdated {
                id,
                symbol,
                side,
                old_price,
                new_price,
                new_exchange_order_id,
                ..
            } => {
                let change = if old_price.is_zero() {
                    Decimal::ZERO
                } else {
                    ((new_price - old_price) / old_price * Decimal::ONE_HUNDRED).round_dp(2)
                };
                let sign = if change.is_sign_negative() { "" } else { "+" };
                write!(
                    f,
                    "Order updated {} ({} {}): {} -> {} ({}{}%), exchange order {}",
                    id, side, symbol, old_price, new_price, sign, change, new_exchange_order_id
                )
            }
            Event::OrderFilled {
                id,
                symbol,
                side,
                quantity,
                avg_price,
            } => write!(
                f,
                "Order filled {} ({} {} {}) @ {}",
                id, side, quantity, symbol, avg_price
            ),
            Event::OrderCancelledExternally {
                id,
                symbol,
                exchange_status,
            } => write!(
                f,
                "Order {} on {} closed outside the bot ({:?}); tracking stopped",
                id, symbol, exchange_status
            ),
            Event::OrderError { id, detail } => write!(f, "Order {} error: {}", id, detail),
        }
    }
}

/// Event delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one event
    async fn notify(&self, event: &Event) -> anyhow::Result<()>;
}

/// Delivers to every sink; a failing sink never blocks the others
#[derive(Default, Clone)]
pub struct FanoutNotifier {
    sinks: Vec<Arc<dyn Notifier>>,
}

impl FanoutNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: Arc<dyn Notifier>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

#[async_trait]
impl Notifier for FanoutNotifier {
    async fn notify(&self, event: &Event) -> anyhow::Result<()> {
        for sink in &self.sinks {
            if let Err(e) = sink.notify(event).await {
                tracing::warn!(event = event.name(), error = %e, "Notification delivery failed");
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    struct Recorder(Mutex<Vec<Event>>);

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, event: &Event) -> anyhow::Result<()> {
            self.0.lock().unwrap().push(event.clone());
            Ok(())
        }
    }

    struct Broken;

    #[async_trait]
    impl Notifier for Broken {
        async fn notify(&self, _event: &Event) -> anyhow::Result<()> {
            anyhow::bail!("sink down")
        }
    }

    fn updated() -> Event {
        Event::OrderUpdated {
            id: "BTCUSDT_4h_EMA21_BUY".to_string(),
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            old_price: dec!(50000),
            new_price: dec!(50200),
            old_exchange_order_id: 1,
            new_exchange_order_id: 2,
        }
    }

    #[test]
    fn test_order_id() {
        assert_eq!(updated().order_id(), Some("BTCUSDT_4h_EMA21_BUY"));
        assert_eq!(Event::BotStopped.order_id(), None);
    }

    #[test]
    fn test_render_update() {
        let text = updated().to_string();
        assert!(text.contains("50000 -> 50200"));
        assert!(text.contains("+0.40%"));
    }

    #[test]
    fn test_render_started() {
        let text = Event::BotStarted {
            interval_secs: 60,
            price_threshold: dec!(0.003),
            tracked_orders: 2,
        }
        .to_string();
        assert!(text.contains("every 60s"));
        assert!(text.contains("threshold 0.3%"));
    }

    #[tokio::test]
    async fn test_fanout_survives_failing_sink() {
        let recorder = Arc::new(Recorder(Mutex::new(vec![])));
        let fanout = FanoutNotifier::new()
            .with(Arc::new(Broken))
            .with(recorder.clone());

        fanout.notify(&updated()).await.unwrap();

        assert_eq!(fanout.len(), 2);
        assert_eq!(recorder.0.lock().unwrap().len(), 1);
    }
}
