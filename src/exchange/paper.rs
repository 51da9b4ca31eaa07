//! Paper trading venue with simulated resting orders
//!
//! Market data is delegated to a real [`MarketData`] source; limit orders
//! rest in a local book and fill once the market trades through them.

use super::{
    AssetBalance, ExchangeGateway, ExchangeOrder, ExchangeOrderStatus, ExchangeOrderType,
    GatewayError, LimitOrderRequest, MarketData, PositionMode, SymbolSettings,
};
use crate::data::{read_document, write_document};
use crate::indicator::Candle;
use crate::tracking::{ExchangeOrderId, Interval, MarginType, Side};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Closed orders retained by default
pub const DEFAULT_CLOSED_ORDER_HISTORY: usize = 500;

/// Paper venue configuration
#[derive(Debug, Clone)]
pub struct PaperConfig {
    /// Where the simulated book is persisted (`None` keeps it in memory)
    pub book_path: Option<PathBuf>,
    pub quote_asset: String,
    pub initial_balance: Decimal,
    pub leverage: u32,
    pub margin_type: MarginType,
    pub hedge_mode: bool,
    /// Filled and cancelled orders kept queryable; older ones are dropped
    pub closed_order_history: usize,
}

impl Default for PaperConfig {
    fn default() -> Self {
        Self {
            book_path: None,
            quote_asset: "USDT".to_string(),
            initial_balance: dec!(10000),
            leverage: 20,
            margin_type: MarginType::Crossed,
            hedge_mode: false,
            closed_order_history: DEFAULT_CLOSED_ORDER_HISTORY,
        }
    }
}

/// Simulated order book state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperBook {
    pub next_order_id: ExchangeOrderId,
    pub orders: Vec<ExchangeOrder>,
}

impl PaperBook {
    fn find_mut(&mut self, symbol: &str, order_id: ExchangeOrderId) -> Option<&mut ExchangeOrder> {
        self.orders
            .iter_mut()
            .find(|o| o.order_id == order_id && o.symbol == symbol)
    }

    /// Fill resting orders the market has traded through
    fn apply_price(&mut self, symbol: &str, price: Decimal) -> usize {
        let mut filled = 0;
        for order in self
            .orders
            .iter_mut()
            .filter(|o| o.symbol == symbol && o.status.is_open())
        {
            let crossed = match order.side {
                Side::Buy => price <= order.price,
                Side::Sell => price >= order.price,
            };
            if crossed {
                order.status = ExchangeOrderStatus::Filled;
                order.executed_qty = order.orig_qty;
                order.avg_price = order.price;
                filled += 1;
                tracing::info!(
                    order_id = order.order_id,
                    symbol,
                    price = %order.price,
                    "Paper order filled"
                );
            }
        }
        filled
    }

    /// Drop the oldest closed orders beyond `keep_closed`; returns how many went
    fn compact(&mut self, keep_closed: usize) -> usize {
        let closed = self.orders.iter().filter(|o| !o.status.is_open()).count();
        let excess = closed.saturating_sub(keep_closed);
        if excess == 0 {
            return 0;
        }

        // Orders are appended in id order, so the first closed ones are the oldest
        let mut dropped = 0;
        self.orders.retain(|o| {
            if dropped < excess && !o.status.is_open() {
                dropped += 1;
                false
            } else {
                true
            }
        });
        excess
    }

    /// Margin held by resting orders
    fn locked_margin(&self, leverage: u32) -> Decimal {
        let leverage = Decimal::from(leverage.max(1));
        self.orders
            .iter()
            .filter(|o| o.status.is_open())
            .map(|o| (o.orig_qty - o.executed_qty) * o.price / leverage)
            .sum()
    }
}

/// Paper futures venue
pub struct PaperExchange<M: MarketData> {
    market: M,
    config: PaperConfig,
    book: Mutex<PaperBook>,
}

impl<M: MarketData> PaperExchange<M> {
    /// Create a paper venue over the given market data source
    pub fn new(market: M, config: PaperConfig) -> Self {
        Self {
            market,
            config,
            book: Mutex::new(PaperBook::default()),
        }
    }

    /// Run `f` against the current book, persisting it afterwards when file-backed
    async fn with_book<T>(
        &self,
        f: impl FnOnce(&mut PaperBook) -> Result<T, GatewayError>,
    ) -> Result<T, GatewayError> {
        let mut book = self.book.lock().await;

        if let Some(path) = &self.config.book_path {
            *book = read_document(path)
                .await
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        }

        let result = f(&mut book)?;
        let dropped = book.compact(self.config.closed_order_history);
        if dropped > 0 {
            tracing::debug!(dropped, "Dropped old closed paper orders");
        }

        if let Some(path) = &self.config.book_path {
            write_document(path, &*book)
                .await
                .map_err(|e| GatewayError::Unavailable(e.to_string()))?;
        }

        Ok(result)
    }

    /// Fill any resting orders on `symbol` at the current market price
    async fn sync_fills(&self, symbol: &str) -> Result<(), GatewayError> {
        let price = self.market.current_price(symbol).await?;
        self.with_book(|book| Ok(book.apply_price(symbol, price)))
            .await
            .map(|_| ())
    }

    fn position_mode_setting(&self) -> PositionMode {
        if self.config.hedge_mode {
            PositionMode::Hedge
        } else {
            PositionMode::OneWay
        }
    }
}

#[async_trait]
impl<M: MarketData> MarketData for PaperExchange<M> {
    async fn server_time(&self) -> Result<DateTime<Utc>, GatewayError> {
        self.market.server_time().await
    }

    async fn candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, GatewayError> {
        self.market.candles(symbol, interval, limit).await
    }

    async fn current_price(&self, symbol: &str) -> Result<Decimal, GatewayError> {
        self.market.current_price(symbol).await
    }
}

#[async_trait]
impl<M: MarketData> ExchangeGateway for PaperExchange<M> {
    async fn order(
        &self,
        symbol: &str,
        order_id: ExchangeOrderId,
    ) -> Result<ExchangeOrder, GatewayError> {
        self.sync_fills(symbol).await?;
        self.with_book(|book| {
            book.find_mut(symbol, order_id)
                .map(|o| o.clone())
                .ok_or_else(|| GatewayError::UnknownOrder {
                    symbol: symbol.to_string(),
                    order_id,
                })
        })
        .await
    }

    async fn open_orders(&self, symbol: &str) -> Result<Vec<ExchangeOrder>, GatewayError> {
        self.sync_fills(symbol).await?;
        self.with_book(|book| {
            Ok(book
                .orders
                .iter()
                .filter(|o| o.symbol == symbol && o.status.is_open())
                .cloned()
                .collect())
        })
        .await
    }

    async fn place_limit_order(
        &self,
        request: &LimitOrderRequest,
    ) -> Result<ExchangeOrderId, GatewayError> {
        if request.quantity <= Decimal::ZERO {
            return Err(GatewayError::Rejected {
                code: -4003,
                message: "Quantity less than or equal to zero.".to_string(),
            });
        }
        if request.price <= Decimal::ZERO {
            return Err(GatewayError::Rejected {
                code: -4001,
                message: "Price less than 0.".to_string(),
            });
        }
        if !self.position_mode_setting().accepts(request.position_side) {
            return Err(GatewayError::Rejected {
                code: -4061,
                message: "Order's position side does not match user's setting.".to_string(),
            });
        }

        let order_id = self
            .with_book(|book| {
                book.next_order_id += 1;
                let order_id = book.next_order_id;
                book.orders.push(ExchangeOrder {
                    order_id,
                    symbol: request.symbol.clone(),
                    side: request.side,
                    order_type: ExchangeOrderType::Limit,
                    position_side: request.position_side,
                    price: request.price,
                    avg_price: Decimal::ZERO,
                    orig_qty: request.quantity,
                    executed_qty: Decimal::ZERO,
                    status: ExchangeOrderStatus::New,
                });
                Ok(order_id)
            })
            .await?;

        tracing::info!(
            order_id,
            symbol = %request.symbol,
            side = %request.side,
            price = %request.price,
            quantity = %request.quantity,
            "Paper order placed"
        );
        Ok(order_id)
    }

    async fn cancel_order(
        &self,
        symbol: &str,
        order_id: ExchangeOrderId,
    ) -> Result<(), GatewayError> {
        self.with_book(|book| {
            let unknown = || GatewayError::UnknownOrder {
                symbol: symbol.to_string(),
                order_id,
            };
            let order = book.find_mut(symbol, order_id).ok_or_else(unknown)?;
            if !order.status.is_open() {
                return Err(unknown());
            }
            order.status = ExchangeOrderStatus::Canceled;
            Ok(())
        })
        .await?;

        tracing::info!(order_id, symbol, "Paper order cancelled");
        Ok(())
    }

    async fn position_mode(&self) -> Result<PositionMode, GatewayError> {
        Ok(self.position_mode_setting())
    }

    async fn symbol_settings(&self, _symbol: &str) -> Result<SymbolSettings, GatewayError> {
        Ok(SymbolSettings {
            leverage: self.config.leverage,
            margin_type: self.config.margin_type,
        })
    }

    async fn balances(&self) -> Result<Vec<AssetBalance>, GatewayError> {
        let leverage = self.config.leverage;
        let locked = self.with_book(|book| Ok(book.locked_margin(leverage))).await?;

        Ok(vec![AssetBalance {
            asset: self.config.quote_asset.clone(),
            balance: self.config.initial_balance,
            available: self.config.initial_balance - locked,
        }])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tracking::PositionSide;
    use std::sync::Mutex as StdMutex;

    struct TestMarket {
        price: StdMutex<Decimal>,
    }

    impl TestMarket {
        fn at(price: Decimal) -> Self {
            Self {
                price: StdMutex::new(price),
            }
        }
    }

    #[async_trait]
    impl MarketData for TestMarket {
        async fn server_time(&self) -> Result<DateTime<Utc>, GatewayError> {
            Ok(Utc::now())
        }

        async fn candles(
            &self,
            _symbol: &str,
            _interval: Interval,
            _limit: usize,
        ) -> Result<Vec<Candle>, GatewayError> {
            Ok(vec![])
        }

        async fn current_price(&self, _symbol: &str) -> Result<Decimal, GatewayError> {
            Ok(*self.price.lock().unwrap())
        }
    }

    fn request(side: Side, price: Decimal) -> LimitOrderRequest {
        LimitOrderRequest {
            symbol: "BTCUSDT".to_string(),
            side,
            price,
            quantity: dec!(0.01),
            leverage: 20,
            margin_type: MarginType::Crossed,
            position_side: PositionSide::Both,
        }
    }

    #[tokio::test]
    async fn test_place_and_query() {
        let venue = PaperExchange::new(TestMarket::at(dec!(51000)), PaperConfig::default());

        let id = venue.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();
        let order = venue.order("BTCUSDT", id).await.unwrap();

        assert_eq!(order.status, ExchangeOrderStatus::New);
        assert_eq!(order.price, dec!(50000));
        assert_eq!(venue.open_orders("BTCUSDT").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_buy_fills_when_price_drops() {
        let venue = PaperExchange::new(TestMarket::at(dec!(51000)), PaperConfig::default());
        let id = venue.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();

        *venue.market.price.lock().unwrap() = dec!(49990);
        let order = venue.order("BTCUSDT", id).await.unwrap();

        assert_eq!(order.status, ExchangeOrderStatus::Filled);
        assert_eq!(order.avg_price, dec!(50000));
        assert_eq!(order.executed_qty, dec!(0.01));
        assert!(venue.open_orders("BTCUSDT").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_sell_rests_below_market() {
        let venue = PaperExchange::new(TestMarket::at(dec!(49000)), PaperConfig::default());
        let id = venue.place_limit_order(&request(Side::Sell, dec!(50000))).await.unwrap();

        let order = venue.order("BTCUSDT", id).await.unwrap();
        assert_eq!(order.status, ExchangeOrderStatus::New);
    }

    #[tokio::test]
    async fn test_cancel() {
        let venue = PaperExchange::new(TestMarket::at(dec!(51000)), PaperConfig::default());
        let id = venue.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();

        venue.cancel_order("BTCUSDT", id).await.unwrap();
        let order = venue.order("BTCUSDT", id).await.unwrap();
        assert_eq!(order.status, ExchangeOrderStatus::Canceled);

        let again = venue.cancel_order("BTCUSDT", id).await;
        assert!(matches!(again, Err(GatewayError::UnknownOrder { .. })));
    }

    #[tokio::test]
    async fn test_rejects_bad_requests() {
        let venue = PaperExchange::new(TestMarket::at(dec!(51000)), PaperConfig::default());

        let mut zero_qty = request(Side::Buy, dec!(50000));
        zero_qty.quantity = dec!(0);
        assert!(matches!(
            venue.place_limit_order(&zero_qty).await,
            Err(GatewayError::Rejected { code: -4003, .. })
        ));

        let mut hedge_side = request(Side::Buy, dec!(50000));
        hedge_side.position_side = PositionSide::Long;
        assert!(matches!(
            venue.place_limit_order(&hedge_side).await,
            Err(GatewayError::Rejected { code: -4061, .. })
        ));
    }

    #[tokio::test]
    async fn test_balance_reserves_margin() {
        let venue = PaperExchange::new(TestMarket::at(dec!(51000)), PaperConfig::default());
        venue.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();

        let balances = venue.balances().await.unwrap();
        assert_eq!(balances[0].asset, "USDT");
        assert_eq!(balances[0].balance, dec!(10000));
        // 0.01 * 50000 / 20
        assert_eq!(balances[0].available, dec!(9975));
    }

    #[test]
    fn test_compact_keeps_open_and_newest_closed() {
        let mut book = PaperBook::default();
        for (order_id, status) in [
            (1, ExchangeOrderStatus::Canceled),
            (2, ExchangeOrderStatus::New),
            (3, ExchangeOrderStatus::Filled),
            (4, ExchangeOrderStatus::Canceled),
        ] {
            book.orders.push(ExchangeOrder {
                order_id,
                symbol: "BTCUSDT".to_string(),
                side: Side::Buy,
                order_type: ExchangeOrderType::Limit,
                position_side: PositionSide::Both,
                price: dec!(50000),
                avg_price: Decimal::ZERO,
                orig_qty: dec!(0.01),
                executed_qty: Decimal::ZERO,
                status,
            });
        }

        assert_eq!(book.compact(1), 2);
        let ids: Vec<_> = book.orders.iter().map(|o| o.order_id).collect();
        assert_eq!(ids, vec![2, 4]);
        assert_eq!(book.compact(1), 0);
    }

    #[tokio::test]
    async fn test_closed_order_history_is_bounded() {
        let config = PaperConfig {
            closed_order_history: 2,
            ..Default::default()
        };
        let venue = PaperExchange::new(TestMarket::at(dec!(51000)), config);

        let mut ids = vec![];
        for _ in 0..5 {
            let id = venue.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();
            venue.cancel_order("BTCUSDT", id).await.unwrap();
            ids.push(id);
        }

        assert!(venue.order("BTCUSDT", ids[0]).await.is_err());
        let last = venue.order("BTCUSDT", ids[4]).await.unwrap();
        assert_eq!(last.status, ExchangeOrderStatus::Canceled);
        assert_eq!(venue.book.lock().await.orders.len(), 2);

        // Ids keep increasing after old orders are dropped
        let next = venue.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();
        assert_eq!(next, ids[4] + 1);
    }

    #[tokio::test]
    async fn test_file_backed_book_is_shared() {
        let dir = tempfile::tempdir().unwrap();
        let config = PaperConfig {
            book_path: Some(dir.path().join("paper_book.json")),
            ..Default::default()
        };

        let first = PaperExchange::new(TestMarket::at(dec!(51000)), config.clone());
        let id = first.place_limit_order(&request(Side::Buy, dec!(50000))).await.unwrap();

        let second = PaperExchange::new(TestMarket::at(dec!(51000)), config);
        let order = second.order("BTCUSDT", id).await.unwrap();
        assert_eq!(order.price, dec!(50000));

        let next = second.place_limit_order(&request(Side::Buy, dec!(49000))).await.unwrap();
        assert_eq!(next, id + 1);
    }
}
