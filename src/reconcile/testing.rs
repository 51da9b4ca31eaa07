//! Scripted exchange and recording notifier shared by unit tests

use crate::exchange::{
    AssetBalance, ExchangeGateway, ExchangeOrder, ExchangeOrderStatus, ExchangeOrderType,
    GatewayError, LimitOrderRequest, MarketData, PositionMode, SymbolSettings,
};
use crate::indicator::Candle;
use crate::notify::{Event, Notifier};
use crate::tracking::{
    AccountContext, ExchangeOrderId, Interval, MarginType, PositionSide, Side,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Mutex;

pub(crate) fn account() -> AccountContext {
    AccountContext {
        leverage: 20,
        margin_type: MarginType::Crossed,
        position_side: PositionSide::Both,
    }
}

#[derive(Default)]
struct Failures {
    order_symbols: Vec<String>,
    cancels: bool,
    places: bool,
}

/// In-memory exchange with a fixed clock and uniform candle history
pub(crate) struct ScriptedGateway {
    now: DateTime<Utc>,
    candles: Mutex<Vec<Candle>>,
    price: Mutex<Decimal>,
    orders: Mutex<Vec<ExchangeOrder>>,
    placed: Mutex<Vec<LimitOrderRequest>>,
    cancelled: Mutex<Vec<ExchangeOrderId>>,
    failures: Mutex<Failures>,
    position_mode: Mutex<PositionMode>,
    next_id: Mutex<ExchangeOrderId>,
}

impl ScriptedGateway {
    pub(crate) fn new() -> Self {
        Self {
            now: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            candles: Mutex::new(vec![]),
            price: Mutex::new(dec!(50000)),
            orders: Mutex::new(vec![]),
            placed: Mutex::new(vec![]),
            cancelled: Mutex::new(vec![]),
            failures: Mutex::new(Failures::default()),
            position_mode: Mutex::new(PositionMode::OneWay),
            next_id: Mutex::new(1000),
        }
    }

    /// History of 600 closed bars at `close`, plus one open bar far away
    pub(crate) fn set_ema(&self, close: Decimal) {
        self.set_history(close, 600);
    }

    /// `count` closed hourly bars at `close` followed by an open bar at twice that
    pub(crate) fn set_history(&self, close: Decimal, count: usize) {
        let step = Duration::hours(1);
        let open_bar_start = self.now - Duration::minutes(30);
        let bar = |open_time: DateTime<Utc>, close: Decimal| Candle {
            open_time,
            close_time: open_time + step - Duration::milliseconds(1),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        };

        let mut candles: Vec<Candle> = (1..=count as i32)
            .rev()
            .map(|i| bar(open_bar_start - step * i, close))
            .collect();
        candles.push(bar(open_bar_start, close * dec!(2)));
        *self.candles.lock().unwrap() = candles;
    }

    pub(crate) fn set_price(&self, price: Decimal) {
        *self.price.lock().unwrap() = price;
    }

    pub(crate) fn set_position_mode(&self, mode: PositionMode) {
        *self.position_mode.lock().unwrap() = mode;
    }

    /// Rest a new limit order and return its id
    pub(crate) fn resting(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
    ) -> ExchangeOrderId {
        self.push_order(symbol, side, price, quantity, ExchangeOrderType::Limit)
    }

    pub(crate) fn push_order(
        &self,
        symbol: &str,
        side: Side,
        price: Decimal,
        quantity: Decimal,
        order_type: ExchangeOrderType,
    ) -> ExchangeOrderId {
        let mut next = self.next_id.lock().unwrap();
        *next += 1;
        self.orders.lock().unwrap().push(ExchangeOrder {
            order_id: *next,
            symbol: symbol.to_string(),
            side,
            order_type,
            position_side: PositionSide::Both,
            price,
            avg_price: Decimal::ZERO,
            orig_qty: quantity,
            executed_qty: Decimal::ZERO,
            status: ExchangeOrderStatus::New,
        });
        *next
    }

    pub(crate) fn set_status(&self, order_id: ExchangeOrderId, status: ExchangeOrderStatus) {
        if let Some(order) = self
            .orders
            .lock()
            .unwrap()
            .iter_mut()
            .find(|o| o.order_id == order_id)
        {
            order.status = status;
        }
    }

    pub(crate) fn fill(&self, order_id: ExchangeOrderId) {
        if let Some(order) = self
            .orders
            .lock()
            .unwrap()
            .iter_mut()
            .find(|o| o.order_id == order_id)
        {
            order.status = ExchangeOrderStatus::Filled;
            order.executed_qty = order.orig_qty;
            order.avg_price = order.price;
        }
    }

    pub(crate) fn fail_order_queries(&self, symbol: &str) {
        self.failures
            .lock()
            .unwrap()
            .order_symbols
            .push(symbol.to_string());
    }

    pub(crate) fn fail_cancels(&self, fail: bool) {
        self.failures.lock().unwrap().cancels = fail;
    }

    pub(crate) fn fail_places(&self, fail: bool) {
        self.failures.lock().unwrap().places = fail;
    }

    pub(crate) fn placed(&self) -> Vec<LimitOrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub(crate) fn cancelled(&self) -> Vec<ExchangeOrderId> {
        self.cancelled.lock().unwrap().clone()
    }

    fn down() -> GatewayError {
        GatewayError::Unavailable("scripted outage".to_string())
    }
}

#[async_trait]
impl MarketData for ScriptedGateway {
    async fn server_time(&self) -> Result<DateTime<Utc>, GatewayError> {
        Ok(self.now)
    }

    async fn candles(
        &self,
        _symbol: &str,
        _interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let candles = self.candles.lock().unwrap();
        let start = candles.len().saturating_sub(limit);
        Ok(candles[start..].to_vec())
    }

    async fn current_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(*self.price.lock().unwrap())
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    async fn order(
        &self,
        symbol: &str,
        order_id: ExchangeOrderId,
    ) -> Result<ExchangeOrder, GatewayError> {
        if self
            .failures
            .lock()
            .unwrap()
            .order_symbols
            .iter()
            .any(|s| s == symbol)
        {
            return Err(Self::down());
        }
        self.orders
            .lock()
            .unwrap()
            .iter()
            .find(|o| o.order_id == order_id && o.symbol == symbol)
            .cloned()
            .ok_or_else(|| GatewayError::UnknownOrder {
                symbol: symbol.to_string(),
                order_id,
            })
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<ExchangeOrder>, GatewayError> {
        Ok(self
            .orders
            .lock()
            .unwrap()
            .iter()
            .filter(|o| o.symbol == symbol && o.status.is_open())
            .cloned()
            .collect())
    }

    async fn place_limit_order(
        &self,
        request: &LimitOrderRequest,
    ) -> Result<ExchangeOrderId, GatewayError> {
        if self.failures.lock().unwrap().places {
            return Err(Self::down());
        }
        let id = self.resting(&request.symbol, request.side, request.price, request.quantity);
        self.placed.lock().unwrap().push(request.clone());
        Ok(id)
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        order_id: ExchangeOrderId,
    ) -> Result<(), GatewayError> {
        if self.failures.lock().unwrap().cancels {
            return Err(Self::down());
        }
        let mut orders = self.orders.lock().unwrap();
        let order = orders
            .iter_mut()
            .find(|o| o.order_id == order_id && o.symbol == symbol && o.status.is_open())
            .ok_or_else(|| GatewayError::UnknownOrder {
                symbol: symbol.to_string(),
                order_id,
            })?;
        order.status = ExchangeOrderStatus::Canceled;
        self.cancelled.lock().unwrap().push(order_id);
        Ok(())
    }

    async fn position_mode(&self) -> Result<PositionMode, GatewayError> {
        Ok(*self.position_mode.lock().unwrap())
    }

    async fn symbol_settings(&self, _symbol: &str) -> Result<SymbolSettings, GatewayError> {
        Ok(SymbolSettings {
            leverage: 20,
            margin_type: MarginType::Crossed,
        })
    }

    async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        Ok(vec![AssetBalance {
            asset: "USDT".to_string(),
            balance: dec!(1000),
            available: dec!(800),
        }])
    }
}

/// Notifier that keeps every event
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    events: Mutex<Vec<Event>>,
}

impl RecordingNotifier {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(|e| e.name()).collect()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &Event) -> anyhow::Result<()> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}
