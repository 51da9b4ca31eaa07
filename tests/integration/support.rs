//! Scripted market data behind the paper venue

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use ema_trail::exchange::{GatewayError, MarketData, PaperConfig, PaperExchange};
use ema_trail::indicator::Candle;
use ema_trail::tracking::Interval;
use rust_decimal::Decimal;
use std::sync::{Arc, Mutex};

#[derive(Debug)]
struct State {
    close: Decimal,
    price: Decimal,
}

/// Flat closed history at `close` plus an open bar far away from it
#[derive(Debug, Clone)]
pub struct ScriptedMarket {
    now: DateTime<Utc>,
    state: Arc<Mutex<State>>,
}

impl ScriptedMarket {
    pub fn new(close: Decimal, price: Decimal) -> Self {
        Self {
            now: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap(),
            state: Arc::new(Mutex::new(State { close, price })),
        }
    }

    pub fn set_close(&self, close: Decimal) {
        self.state.lock().unwrap().close = close;
    }

    pub fn set_price(&self, price: Decimal) {
        self.state.lock().unwrap().price = price;
    }
}

#[async_trait]
impl MarketData for ScriptedMarket {
    async fn server_time(&self) -> Result<DateTime<Utc>, GatewayError> {
        Ok(self.now)
    }

    async fn candles(
        &self,
        _symbol: &str,
        _interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let close = self.state.lock().unwrap().close;
        let bar = Duration::hours(4);
        let open_bar_start = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let mut candles: Vec<Candle> = (1..limit as i32)
            .rev()
            .map(|back| {
                let open_time = open_bar_start - bar * back;
                Candle {
                    open_time,
                    close_time: open_time + bar - Duration::milliseconds(1),
                    open: close,
                    high: close,
                    low: close,
                    close,
                    volume: Decimal::ONE,
                }
            })
            .collect();
        candles.push(Candle {
            open_time: open_bar_start,
            close_time: open_bar_start + bar - Duration::milliseconds(1),
            open: close,
            high: close * Decimal::TWO,
            low: close,
            close: close * Decimal::TWO,
            volume: Decimal::ONE,
        });
        Ok(candles)
    }

    async fn current_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
        Ok(self.state.lock().unwrap().price)
    }
}

/// In-memory paper venue over `market`
pub fn venue(market: &ScriptedMarket) -> Arc<PaperExchange<ScriptedMarket>> {
    Arc::new(PaperExchange::new(market.clone(), PaperConfig::default()))
}
