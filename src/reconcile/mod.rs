//! Reconciliation module
//!
//! Keeps tracked exchange orders aligned with their EMA: one cycle re-reads
//! every live order, finalizes fills and external cancels, and re-prices
//! orders that drifted past the threshold. [`TrailingLoop`] runs cycles on a
//! fixed interval.

mod engine;
mod lifecycle;
#[cfg(test)]
pub(crate) mod testing;

pub use engine::{deviation, CycleReport, ReconcileConfig, Reconciler};
pub use lifecycle::{LoopStats, LoopStatus, TrailingLoop};
