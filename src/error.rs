//! Error taxonomy returned by the core entry points

use crate::data::DocumentError;
use crate::exchange::GatewayError;
use crate::indicator::IndicatorError;
use thiserror::Error;

/// Core result type
pub type Result<T> = std::result::Result<T, TrailError>;

/// Errors surfaced to the loop and the command front ends
#[derive(Debug, Error)]
pub enum TrailError {
    /// Not enough closed candles for the requested period
    #[error("Insufficient data: need {needed} closed candles, have {available}")]
    InsufficientData { needed: usize, available: usize },
    /// Bind of an id that is already being tracked
    #[error("Order already tracked: {0}")]
    AlreadyTracked(String),
    /// Unknown tracking id
    #[error("Order not found: {0}")]
    OrderNotFound(String),
    /// Live exchange order does not match the requested binding
    #[error("Invalid binding: {0}")]
    InvalidBinding(String),
    /// Transient exchange failure
    #[error("Exchange unavailable: {0}")]
    ExchangeUnavailable(#[from] GatewayError),
    /// Store could not be read or written
    #[error("Persistence error: {0}")]
    Persistence(#[from] DocumentError),
    /// Malformed front-end command
    #[error("Invalid command: {0}")]
    InvalidCommand(String),
    /// Start requested while the loop is running
    #[error("Reconciliation loop already running")]
    LoopAlreadyRunning,
    /// Stop requested while the loop is stopped
    #[error("Reconciliation loop not running")]
    LoopNotRunning,
}

impl From<IndicatorError> for TrailError {
    fn from(err: IndicatorError) -> Self {
        match err {
            IndicatorError::InsufficientData { needed, available } => {
                TrailError::InsufficientData { needed, available }
            }
        }
    }
}

impl TrailError {
    /// Short machine-readable kind, stable across front ends
    pub fn kind(&self) -> &'static str {
        match self {
            TrailError::InsufficientData { .. } => "insufficient_data",
            TrailError::AlreadyTracked(_) => "already_tracked",
            TrailError::OrderNotFound(_) => "order_not_found",
            TrailError::InvalidBinding(_) => "invalid_binding",
            TrailError::ExchangeUnavailable(_) => "exchange_unavailable",
            TrailError::Persistence(_) => "persistence_error",
            TrailError::InvalidCommand(_) => "invalid_command",
            TrailError::LoopAlreadyRunning => "loop_already_running",
            TrailError::LoopNotRunning => "loop_not_running",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_error_conversion() {
        let err: TrailError = IndicatorError::InsufficientData {
            needed: 21,
            available: 5,
        }
        .into();
        assert!(matches!(
            err,
            TrailError::InsufficientData {
                needed: 21,
                available: 5
            }
        ));
        assert_eq!(err.kind(), "insufficient_data");
    }

    #[test]
    fn test_gateway_error_is_exchange_unavailable() {
        let err: TrailError = GatewayError::Unavailable("timeout".to_string()).into();
        assert_eq!(err.kind(), "exchange_unavailable");
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_display() {
        let err = TrailError::AlreadyTracked("BTCUSDT_4h_EMA21_BUY".to_string());
        assert_eq!(err.to_string(), "Order already tracked: BTCUSDT_4h_EMA21_BUY");
    }
}
