//! Order tracking module
//!
//! Tracked-order model and the durable store that holds it

mod store;
mod types;

pub use store::{OrderStore, StoreGuard};
pub use types::{
    normalize_symbol, AccountContext, EmaPeriod, ExchangeOrderId, Interval, MarginType,
    OrderStatus, PositionSide, Side, TrackedOrder, QUOTE_ASSET,
};
