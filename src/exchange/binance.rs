//! Binance USDⓈ-M futures public REST client
//!
//! Only unauthenticated endpoints are used: server time, klines and the
//! ticker price.

use super::{GatewayError, MarketData};
use crate::indicator::Candle;
use crate::tracking::Interval;
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::str::FromStr;
use std::time::Duration;

/// Binance USDⓈ-M futures REST base URL
pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";

/// Largest kline page the endpoint serves
pub const MAX_KLINE_LIMIT: usize = 1500;

/// Configuration for the Binance client
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    /// REST base URL
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_FUTURES_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: i64,
    msg: String,
}

/// Raw kline row: `[openTime, open, high, low, close, volume, closeTime, ...]`
type KlineRow = Vec<serde_json::Value>;

/// Public market data client
pub struct BinanceMarketData {
    config: BinanceConfig,
    client: Client,
}

impl BinanceMarketData {
    /// Create a client with default configuration
    pub fn new() -> Result<Self, GatewayError> {
        Self::with_config(BinanceConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: BinanceConfig) -> Result<Self, GatewayError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    async fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GatewayError> {
        let url = format!("{}{}", self.config.base_url, path);
        tracing::debug!(url = %url, "Binance request");

        let response = self.client.get(&url).query(query).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<ApiError>(&body) {
                Ok(api) if status.is_client_error() => GatewayError::Rejected {
                    code: api.code,
                    message: api.msg,
                },
                _ => GatewayError::Unavailable(format!("HTTP {}: {}", status, body)),
            });
        }

        Ok(response.json().await?)
    }

    /// Parse one kline row
    fn parse_kline(row: &KlineRow) -> Option<Candle> {
        let millis = |i: usize| -> Option<DateTime<Utc>> {
            Utc.timestamp_millis_opt(row.get(i)?.as_i64()?).single()
        };
        let decimal = |i: usize| -> Option<Decimal> { Decimal::from_str(row.get(i)?.as_str()?).ok() };

        Some(Candle {
            open_time: millis(0)?,
            open: decimal(1)?,
            high: decimal(2)?,
            low: decimal(3)?,
            close: decimal(4)?,
            volume: decimal(5)?,
            close_time: millis(6)?,
        })
    }
}

#[async_trait]
impl MarketData for BinanceMarketData {
    async fn server_time(&self) -> Result<DateTime<Utc>, GatewayError> {
        let time: ServerTime = self.get("/fapi/v1/time", &[]).await?;
        Utc.timestamp_millis_opt(time.server_time)
            .single()
            .ok_or_else(|| GatewayError::Unavailable("invalid server time".to_string()))
    }

    async fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        let limit = limit.clamp(1, MAX_KLINE_LIMIT);
        let rows: Vec<KlineRow> = self
            .get(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;

        let candles = rows
            .iter()
            .map(Self::parse_kline)
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| GatewayError::Unavailable("malformed kline payload".to_string()))?;

        tracing::debug!(symbol, %interval, count = candles.len(), "Fetched klines");
        Ok(candles)
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        let ticker: TickerPrice = self
            .get("/fapi/v1/ticker/price", &[("symbol", symbol.to_string())])
            .await?;
        Decimal::from_str(&ticker.price)
            .map_err(|e| GatewayError::Unavailable(format!("invalid price '{}': {}", ticker.price, e)))
    }
}
