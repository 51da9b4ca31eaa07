//! Indicator module
//!
//! Moving-average signal computed from closed candles only

mod ema;
mod types;

pub use ema::{calculate_ema, closed_candles, Ema};
pub use types::{Candle, IndicatorError};
