//! Exchange types

use crate::tracking::{ExchangeOrderId, MarginType, PositionSide, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Exchange-side order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeOrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
}

impl ExchangeOrderStatus {
    /// Order still rests on the book
    pub fn is_open(&self) -> bool {
        matches!(
            self,
            ExchangeOrderStatus::New | ExchangeOrderStatus::PartiallyFilled
        )
    }
}

/// Order type as reported by the exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeOrderType {
    Limit,
    Market,
    Stop,
    TakeProfit,
    StopMarket,
    TakeProfitMarket,
    TrailingStopMarket,
}

/// An order as seen on the exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeOrder {
    pub order_id: ExchangeOrderId,
    pub symbol: String,
    pub side: Side,
    pub order_type: ExchangeOrderType,
    pub position_side: PositionSide,
    /// Limit price
    pub price: Decimal,
    /// Average fill price (zero until something fills)
    pub avg_price: Decimal,
    pub orig_qty: Decimal,
    pub executed_qty: Decimal,
    pub status: ExchangeOrderStatus,
}

/// A new limit order
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrderRequest {
    pub symbol: String,
    pub side: Side,
    pub price: Decimal,
    pub quantity: Decimal,
    pub leverage: u32,
    pub margin_type: MarginType,
    pub position_side: PositionSide,
}

/// Account position mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionMode {
    /// Separate LONG and SHORT positions per symbol
    Hedge,
    /// Single net position per symbol (position side BOTH)
    OneWay,
}

impl PositionMode {
    /// Whether an order placed under `position_side` is valid in this mode
    pub fn accepts(&self, position_side: PositionSide) -> bool {
        match self {
            PositionMode::Hedge => position_side != PositionSide::Both,
            PositionMode::OneWay => position_side == PositionSide::Both,
        }
    }
}

impl fmt::Display for PositionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionMode::Hedge => f.write_str("hedge"),
            PositionMode::OneWay => f.write_str("one-way"),
        }
    }
}

/// Per-symbol account settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolSettings {
    pub leverage: u32,
    pub margin_type: MarginType,
}

/// Balance of one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub asset: String,
    pub balance: Decimal,
    pub available: Decimal,
}

/// Gateway errors
#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    /// Network or server failure
    #[error("exchange unavailable: {0}")]
    Unavailable(String),
    /// Request rejected by the exchange
    #[error("request rejected ({code}): {message}")]
    Rejected { code: i64, message: String },
    /// Order id unknown to the exchange
    #[error("unknown order {order_id} on {symbol}")]
    UnknownOrder {
        symbol: String,
        order_id: ExchangeOrderId,
    },
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Unavailable(err.to_string())
    }
}
