//! Exponential moving average
//!
//! Seeded with the simple average of the first `period` closes, then updated
//! with `ema += (close - ema) * alpha` where `alpha = 2 / (period + 1)`.

use super::{Candle, IndicatorError};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

/// Incremental EMA state
#[derive(Debug, Clone)]
pub struct Ema {
    period: usize,
    alpha: Decimal,
    /// Running sum while seeding
    seed_sum: Decimal,
    samples: usize,
    value: Option<Decimal>,
}

impl Ema {
    /// Create an EMA for the given period (must be non-zero)
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: Decimal::TWO / Decimal::from(period + 1),
            seed_sum: Decimal::ZERO,
            samples: 0,
            value: None,
        }
    }

    /// Smoothing factor
    pub fn alpha(&self) -> Decimal {
        self.alpha
    }

    /// Feed the next close
    pub fn update(&mut self, close: Decimal) -> Option<Decimal> {
        self.samples += 1;
        match self.value {
            Some(prev) => {
                self.value = Some(prev + (close - prev) * self.alpha);
            }
            None => {
                self.seed_sum += close;
                if self.samples == self.period {
                    self.value = Some(self.seed_sum / Decimal::from(self.period));
                }
            }
        }
        self.value
    }

    /// Current estimate, `None` until `period` closes were seen
    pub fn value(&self) -> Option<Decimal> {
        self.value
    }

    /// Number of closes consumed
    pub fn samples(&self) -> usize {
        self.samples
    }
}

/// Keep only candles that have closed at `now`, preserving order
pub fn closed_candles(candles: &[Candle], now: DateTime<Utc>) -> impl Iterator<Item = &Candle> {
    candles.iter().filter(move |c| c.is_closed_at(now))
}

/// EMA of the closed candles in `candles` (oldest first) as of `now`
pub fn calculate_ema(
    candles: &[Candle],
    period: usize,
    now: DateTime<Utc>,
) -> Result<Decimal, IndicatorError> {
    let mut ema = Ema::new(period);
    for candle in closed_candles(candles, now) {
        ema.update(candle.close);
    }

    ema.value().ok_or(IndicatorError::InsufficientData {
        needed: period,
        available: ema.samples(),
    })
}
