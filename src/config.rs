//! Configuration types for ema-trail

use crate::exchange::{
    BinanceConfig, PaperConfig, BINANCE_FUTURES_URL, DEFAULT_CLOSED_ORDER_HISTORY,
};
use crate::notify::TelegramConfig;
use crate::reconcile::ReconcileConfig;
use crate::telemetry::LogFormat;
use crate::tracking::MarginType;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub paper: PaperVenueConfig,
    #[serde(default)]
    pub reconcile: ReconcileSection,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Exchange connection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    #[serde(default)]
    pub mode: ExecutionMode,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Execution mode: paper trading or live
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    #[default]
    Paper,
    Live,
}

/// Simulated venue configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PaperVenueConfig {
    #[serde(default = "default_book_path")]
    pub book_path: PathBuf,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    #[serde(default = "default_initial_balance")]
    pub initial_balance: Decimal,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default = "default_margin_type")]
    pub margin_type: MarginType,
    /// Hedge mode (LONG/SHORT) instead of one-way (BOTH)
    #[serde(default)]
    pub hedge_mode: bool,
    /// Filled and cancelled paper orders kept in the book
    #[serde(default = "default_closed_order_history")]
    pub closed_order_history: usize,
}

/// Reconciliation loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ReconcileSection {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Relative deviation, 0.003 = 0.3%
    #[serde(default = "default_price_threshold")]
    pub price_threshold: Decimal,
    #[serde(default = "default_price_scale")]
    pub price_scale: u32,
    #[serde(default = "default_history_factor")]
    pub history_factor: usize,
}

/// Order store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

/// Notification configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifyConfig {
    pub telegram_token: Option<String>,
    pub telegram_chat_id: Option<String>,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    /// Prometheus exporter port; disabled when unset
    pub metrics_port: Option<u16>,
}

fn default_base_url() -> String {
    BINANCE_FUTURES_URL.to_string()
}
fn default_timeout_secs() -> u64 {
    10
}
fn default_book_path() -> PathBuf {
    PathBuf::from("paper_book.json")
}
fn default_quote_asset() -> String {
    "USDT".to_string()
}
fn default_initial_balance() -> Decimal {
    Decimal::new(10000, 0)
}
fn default_leverage() -> u32 {
    20
}
fn default_margin_type() -> MarginType {
    MarginType::Crossed
}
fn default_closed_order_history() -> usize {
    DEFAULT_CLOSED_ORDER_HISTORY
}
fn default_interval_secs() -> u64 {
    60
}
fn default_price_threshold() -> Decimal {
    Decimal::new(3, 3) // 0.003 = 0.3%
}
fn default_price_scale() -> u32 {
    8
}
fn default_history_factor() -> usize {
    3
}
fn default_store_path() -> PathBuf {
    PathBuf::from("orders.json")
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::Paper,
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl Default for PaperVenueConfig {
    fn default() -> Self {
        Self {
            book_path: default_book_path(),
            quote_asset: default_quote_asset(),
            initial_balance: default_initial_balance(),
            leverage: default_leverage(),
            margin_type: default_margin_type(),
            hedge_mode: false,
            closed_order_history: default_closed_order_history(),
        }
    }
}

impl Default for ReconcileSection {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            price_threshold: default_price_threshold(),
            price_scale: default_price_scale(),
            history_factor: default_history_factor(),
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::Pretty,
            metrics_port: None,
        }
    }
}

impl ExchangeConfig {
    pub fn binance(&self) -> BinanceConfig {
        BinanceConfig {
            base_url: self.base_url.clone(),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

impl PaperVenueConfig {
    pub fn paper(&self) -> PaperConfig {
        PaperConfig {
            book_path: Some(self.book_path.clone()),
            quote_asset: self.quote_asset.clone(),
            initial_balance: self.initial_balance,
            leverage: self.leverage,
            margin_type: self.margin_type,
            hedge_mode: self.hedge_mode,
            closed_order_history: self.closed_order_history,
        }
    }
}

impl ReconcileSection {
    pub fn reconcile(&self) -> ReconcileConfig {
        ReconcileConfig {
            price_threshold: self.price_threshold,
            price_scale: self.price_scale,
            history_factor: self.history_factor,
        }
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl NotifyConfig {
    /// Telegram settings when both token and chat id are present
    pub fn telegram(&self) -> Option<TelegramConfig> {
        match (&self.telegram_token, &self.telegram_chat_id) {
            (Some(token), Some(chat_id)) if !token.is_empty() && !chat_id.is_empty() => {
                Some(TelegramConfig::new(token.clone(), chat_id.clone()))
            }
            _ => None,
        }
    }

    /// Override from `TELEGRAM_TOKEN` / `TELEGRAM_CHAT_ID`
    fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("TELEGRAM_TOKEN") {
            self.telegram_token = Some(token);
        }
        if let Ok(chat_id) = std::env::var("TELEGRAM_CHAT_ID") {
            self.telegram_chat_id = Some(chat_id);
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&content)?;
        config.validate()?;
        config.notify.apply_env();
        Ok(config)
    }

    /// Defaults plus environment overrides
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.notify.apply_env();
        config
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.reconcile.interval_secs == 0 {
            anyhow::bail!("reconcile.interval_secs must be positive");
        }
        if self.reconcile.price_threshold < Decimal::ZERO {
            anyhow::bail!("reconcile.price_threshold must not be negative");
        }
        Ok(())
    }
}
