//! Place command implementation

use super::paper_venue;
use crate::config::Config;
use crate::exchange::{ExchangeGateway, LimitOrderRequest};
use crate::tracking::{normalize_symbol, PositionSide, Side};
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub struct PlaceArgs {
    /// Trading pair, e.g. BTC or BTCUSDT
    pub symbol: String,
    /// Order side: BUY or SELL
    pub side: Side,
    /// Limit price
    pub price: Decimal,
    /// Order quantity in base asset
    pub quantity: Decimal,
    /// Position side: BOTH in one-way mode, LONG or SHORT in hedge mode
    #[arg(long, default_value = "BOTH")]
    pub position_side: PositionSide,
}

impl PlaceArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let symbol = normalize_symbol(&self.symbol)
            .ok_or_else(|| anyhow::anyhow!("invalid symbol '{}'", self.symbol))?;
        let venue = paper_venue(config)?;
        let settings = venue.symbol_settings(&symbol).await?;

        let order_id = venue
            .place_limit_order(&LimitOrderRequest {
                symbol: symbol.clone(),
                side: self.side,
                price: self.price,
                quantity: self.quantity,
                leverage: settings.leverage,
                margin_type: settings.margin_type,
                position_side: self.position_side,
            })
            .await?;

        println!(
            "Placed paper order {}: {} {} {} @ {}",
            order_id, self.side, self.quantity, symbol, self.price
        );
        Ok(())
    }
}
