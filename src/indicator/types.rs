//! Candle types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A fixed-interval price bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bar open time
    pub open_time: DateTime<Utc>,
    /// Last instant covered by the bar
    pub close_time: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

impl Candle {
    /// Whether the bar is complete at `now`.
    ///
    /// The exchange stamps `close_time` with the last millisecond of the
    /// interval, so a bar is final only once `now` is strictly past it.
    pub fn is_closed_at(&self, now: DateTime<Utc>) -> bool {
        self.close_time < now
    }
}

/// Indicator errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndicatorError {
    /// Fewer closed candles than the period requires
    #[error("Insufficient data: need {needed} closed candles, have {available}")]
    InsufficientData { needed: usize, available: usize },
}
