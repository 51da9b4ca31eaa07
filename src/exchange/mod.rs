//! Exchange gateway module
//!
//! Candle, order and account operations against a USDⓈ-M futures venue.
//! Public market data comes from Binance; order handling is simulated by
//! the paper venue.

mod binance;
mod paper;
mod types;

pub use binance::{BinanceConfig, BinanceMarketData, BINANCE_FUTURES_URL, MAX_KLINE_LIMIT};
pub use paper::{PaperBook, PaperConfig, PaperExchange, DEFAULT_CLOSED_ORDER_HISTORY};
pub use types::{
    AssetBalance, ExchangeOrder, ExchangeOrderStatus, ExchangeOrderType, GatewayError,
    LimitOrderRequest, PositionMode, SymbolSettings,
};

use crate::indicator::Candle;
use crate::tracking::{ExchangeOrderId, Interval};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Public market data
#[async_trait]
pub trait MarketData: Send + Sync {
    /// Exchange clock
    async fn server_time(&self) -> Result<DateTime<Utc>, GatewayError>;
    /// Most recent `limit` candles, oldest first (the last one may still be open)
    async fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError>;
    /// Last traded price
    async fn current_price(&self, symbol: &str) -> Result<Decimal, GatewayError>;
}

/// Everything the core needs from the exchange
#[async_trait]
pub trait ExchangeGateway: MarketData {
    /// Look up one order
    async fn order(
        &self,
        symbol: &str,
        order_id: ExchangeOrderId,
    ) -> Result<ExchangeOrder, GatewayError>;
    /// Orders currently resting on the book for `symbol`
    async fn open_orders(&self, symbol: &str) -> Result<Vec<ExchangeOrder>, GatewayError>;
    /// Place a GTC limit order
    async fn place_limit_order(
        &self,
        request: &LimitOrderRequest,
    ) -> Result<ExchangeOrderId, GatewayError>;
    /// Cancel a resting order
    async fn cancel_order(
        &self,
        symbol: &str,
        order_id: ExchangeOrderId,
    ) -> Result<(), GatewayError>;
    /// Account position mode
    async fn position_mode(&self) -> Result<PositionMode, GatewayError>;
    /// Leverage and margin type for `symbol`
    async fn symbol_settings(&self, symbol: &str) -> Result<SymbolSettings, GatewayError>;
    /// Account balances
    async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError>;
}
