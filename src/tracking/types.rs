//! Tracked order types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exchange-assigned order identifier
pub type ExchangeOrderId = u64;

/// Quote asset appended to bare base symbols
pub const QUOTE_ASSET: &str = "USDT";

/// Normalize a user-supplied symbol (`btc` -> `BTCUSDT`)
pub fn normalize_symbol(raw: &str) -> Option<String> {
    let symbol = raw.trim().to_uppercase();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    if symbol.ends_with(QUOTE_ASSET) && symbol.len() > QUOTE_ASSET.len() {
        Some(symbol)
    } else {
        Some(format!("{}{}", symbol, QUOTE_ASSET))
    }
}

/// Candle interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "15m")]
    M15,
    #[serde(rename = "1h")]
    H1,
    #[serde(rename = "4h")]
    H4,
    #[serde(rename = "1d")]
    D1,
    #[serde(rename = "1w")]
    W1,
    #[serde(rename = "1M")]
    Month1,
}

impl Interval {
    pub const ALL: [Interval; 6] = [
        Interval::M15,
        Interval::H1,
        Interval::H4,
        Interval::D1,
        Interval::W1,
        Interval::Month1,
    ];

    /// Exchange wire code
    pub fn as_str(&self) -> &'static str {
        match self {
            Interval::M15 => "15m",
            Interval::H1 => "1h",
            Interval::H4 => "4h",
            Interval::D1 => "1d",
            Interval::W1 => "1w",
            Interval::Month1 => "1M",
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Interval {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "1M" is the month; "1m" (minute) is not supported
        if s == "1M" {
            return Ok(Interval::Month1);
        }
        match s.to_lowercase().as_str() {
            "15m" | "15min" => Ok(Interval::M15),
            "1h" => Ok(Interval::H1),
            "4h" => Ok(Interval::H4),
            "1d" => Ok(Interval::D1),
            "1w" => Ok(Interval::W1),
            _ => Err(format!(
                "unsupported interval '{}' (expected 15m, 1h, 4h, 1d, 1w or 1M)",
                s
            )),
        }
    }
}

/// Supported EMA period
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum EmaPeriod {
    P21,
    P55,
    P100,
    P200,
}

impl EmaPeriod {
    pub const ALL: [EmaPeriod; 4] = [EmaPeriod::P21, EmaPeriod::P55, EmaPeriod::P100, EmaPeriod::P200];

    pub fn value(&self) -> u32 {
        match self {
            EmaPeriod::P21 => 21,
            EmaPeriod::P55 => 55,
            EmaPeriod::P100 => 100,
            EmaPeriod::P200 => 200,
        }
    }
}

impl TryFrom<u32> for EmaPeriod {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            21 => Ok(EmaPeriod::P21),
            55 => Ok(EmaPeriod::P55),
            100 => Ok(EmaPeriod::P100),
            200 => Ok(EmaPeriod::P200),
            other => Err(format!(
                "unsupported EMA period {} (expected 21, 55, 100 or 200)",
                other
            )),
        }
    }
}

impl From<EmaPeriod> for u32 {
    fn from(period: EmaPeriod) -> Self {
        period.value()
    }
}

impl FromStr for EmaPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_start_matches("EMA").trim_start_matches("ema");
        let value: u32 = trimmed
            .parse()
            .map_err(|_| format!("EMA period must be a number, got '{}'", s))?;
        EmaPeriod::try_from(value)
    }
}

impl fmt::Display for EmaPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(format!("side must be BUY or SELL, got '{}'", s)),
        }
    }
}

/// Collateral mode of the position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginType {
    Crossed,
    Isolated,
}

impl fmt::Display for MarginType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MarginType::Crossed => f.write_str("CROSSED"),
            MarginType::Isolated => f.write_str("ISOLATED"),
        }
    }
}

/// Position side an order is placed under
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => f.write_str("LONG"),
            PositionSide::Short => f.write_str("SHORT"),
            PositionSide::Both => f.write_str("BOTH"),
        }
    }
}

impl FromStr for PositionSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LONG" => Ok(PositionSide::Long),
            "SHORT" => Ok(PositionSide::Short),
            "BOTH" => Ok(PositionSide::Both),
            _ => Err(format!("position side must be LONG, SHORT or BOTH, got '{}'", s)),
        }
    }
}

/// Tracking status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Active,
    Filled,
    Cancelled,
    Error,
}

impl OrderStatus {
    /// Filled and cancelled records are never re-priced
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::Cancelled)
    }

    /// Whether the reconciliation loop still works on this record
    pub fn is_live(&self) -> bool {
        matches!(self, OrderStatus::Active | OrderStatus::Error)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Active => "active",
            OrderStatus::Filled => "filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Account context captured at bind time and reused for every replacement
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountContext {
    pub leverage: u32,
    pub margin_type: MarginType,
    pub position_side: PositionSide,
}

/// An exchange order kept aligned with an EMA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackedOrder {
    /// Derived from (symbol, interval, ema_period, side)
    pub id: String,
    pub symbol: String,
    pub interval: Interval,
    pub ema_period: EmaPeriod,
    pub side: Side,
    pub quantity: Decimal,
    /// Current live order on the exchange
    pub exchange_order_id: ExchangeOrderId,
    pub status: OrderStatus,
    pub leverage: u32,
    pub margin_type: MarginType,
    pub position_side: PositionSide,
}

impl TrackedOrder {
    /// Derive the tracking id
    pub fn derive_id(symbol: &str, interval: Interval, ema_period: EmaPeriod, side: Side) -> String {
        format!("{}_{}_EMA{}_{}", symbol, interval, ema_period, side)
    }

    /// Create a new active record
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        ema_period: EmaPeriod,
        side: Side,
        quantity: Decimal,
        exchange_order_id: ExchangeOrderId,
        account: AccountContext,
    ) -> Self {
        let symbol = symbol.into();
        Self {
            id: Self::derive_id(&symbol, interval, ema_period, side),
            symbol,
            interval,
            ema_period,
            side,
            quantity,
            exchange_order_id,
            status: OrderStatus::Active,
            leverage: account.leverage,
            margin_type: account.margin_type,
            position_side: account.position_side,
        }
    }

    pub fn account(&self) -> AccountContext {
        AccountContext {
            leverage: self.leverage,
            margin_type: self.margin_type,
            position_side: self.position_side,
        }
    }
}
