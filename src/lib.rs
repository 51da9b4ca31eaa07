//! ema-trail: keeps resting futures limit orders trailing an EMA
//!
//! This library provides the core components for:
//! - Exponential moving averages over closed exchange candles
//! - A persistent registry of tracked limit orders
//! - Periodic reconciliation that re-prices drifted orders at the EMA
//! - Binance public market data and a paper futures venue
//! - A chat-style command surface and status notifications
//! - Structured logging and Prometheus metrics

pub mod cli;
pub mod command;
pub mod config;
pub mod data;
pub mod error;
pub mod exchange;
pub mod indicator;
pub mod notify;
pub mod reconcile;
pub mod telemetry;
pub mod tracking;
