//! End-to-end trailing against the paper venue

use crate::support::{venue, ScriptedMarket};
use ema_trail::command::{Command, CommandOutput, TrailService};
use ema_trail::exchange::{
    ExchangeGateway, ExchangeOrderStatus, LimitOrderRequest, PaperExchange,
};
use ema_trail::notify::LogNotifier;
use ema_trail::reconcile::ReconcileConfig;
use ema_trail::tracking::{
    EmaPeriod, ExchangeOrderId, Interval, MarginType, OrderStatus, OrderStore, PositionSide, Side,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

const ID: &str = "BTCUSDT_4h_EMA21_BUY";

struct Harness {
    dir: tempfile::TempDir,
    market: ScriptedMarket,
    venue: Arc<PaperExchange<ScriptedMarket>>,
    service: TrailService,
}

fn harness(close: Decimal, price: Decimal) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let market = ScriptedMarket::new(close, price);
    let venue = venue(&market);
    let service = service_at(&dir, venue.clone());
    Harness {
        dir,
        market,
        venue,
        service,
    }
}

fn service_at(dir: &tempfile::TempDir, venue: Arc<PaperExchange<ScriptedMarket>>) -> TrailService {
    TrailService::new(
        Arc::new(OrderStore::open(dir.path().join("orders.json"))),
        venue,
        Arc::new(LogNotifier),
        ReconcileConfig::default(),
    )
}

async fn rest_buy(venue: &PaperExchange<ScriptedMarket>, price: Decimal) -> ExchangeOrderId {
    venue
        .place_limit_order(&LimitOrderRequest {
            symbol: "BTCUSDT".to_string(),
            side: Side::Buy,
            price,
            quantity: dec!(0.01),
            leverage: 20,
            margin_type: MarginType::Crossed,
            position_side: PositionSide::Both,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_bind_trail_fill_prune() {
    let h = harness(dec!(50500), dec!(51000));
    let first = rest_buy(&h.venue, dec!(50000)).await;

    let output = h
        .service
        .execute(Command::parse_chat("/bind btc 4h 21 buy").unwrap())
        .await
        .unwrap();
    let CommandOutput::Bound(order) = output else {
        panic!("unexpected output: {:?}", output);
    };
    assert_eq!(order.id, ID);
    assert_eq!(order.exchange_order_id, first);
    assert_eq!(order.quantity, dec!(0.01));
    assert_eq!(order.leverage, 20);

    // 1% away from the EMA: re-priced
    let report = h.service.reconciler().run_cycle().await.unwrap();
    assert_eq!(report.replaced, 1);

    let open = h.venue.open_orders("BTCUSDT").await.unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0].price, dec!(50500));
    assert_eq!(open[0].orig_qty, dec!(0.01));
    let old = h.venue.order("BTCUSDT", first).await.unwrap();
    assert_eq!(old.status, ExchangeOrderStatus::Canceled);

    let tracked = h.service.list().await.unwrap();
    assert_eq!(tracked[0].exchange_order_id, open[0].order_id);
    assert_eq!(tracked[0].status, OrderStatus::Active);

    // Within threshold: nothing to do
    let report = h.service.reconciler().run_cycle().await.unwrap();
    assert_eq!(report.kept, 1);
    assert_eq!(h.venue.open_orders("BTCUSDT").await.unwrap().len(), 1);

    // Market trades through the order
    h.market.set_price(dec!(50400));
    let report = h.service.reconciler().run_cycle().await.unwrap();
    assert_eq!(report.finalized, 1);
    assert_eq!(h.service.list().await.unwrap()[0].status, OrderStatus::Filled);

    // Terminal records are no longer examined
    let report = h.service.reconciler().run_cycle().await.unwrap();
    assert_eq!(report.examined, 0);

    let pruned = h.service.prune().await.unwrap();
    assert_eq!(pruned.len(), 1);
    assert!(h.service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_external_cancel_stops_tracking() {
    let h = harness(dec!(50500), dec!(51000));
    let exchange_order_id = rest_buy(&h.venue, dec!(50000)).await;
    h.service
        .bind("BTCUSDT", Interval::H4, EmaPeriod::P21, Side::Buy, None)
        .await
        .unwrap();

    h.venue
        .cancel_order("BTCUSDT", exchange_order_id)
        .await
        .unwrap();

    let report = h.service.reconciler().run_cycle().await.unwrap();
    assert_eq!(report.finalized, 1);
    assert_eq!(
        h.service.list().await.unwrap()[0].status,
        OrderStatus::Cancelled
    );
    assert!(h.venue.open_orders("BTCUSDT").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_records_survive_restart() {
    let h = harness(dec!(50500), dec!(51000));
    rest_buy(&h.venue, dec!(50000)).await;
    h.service
        .bind("btc", Interval::H4, EmaPeriod::P21, Side::Buy, None)
        .await
        .unwrap();

    let restarted = service_at(&h.dir, h.venue.clone());
    let orders = restarted.list().await.unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, ID);

    h.market.set_close(dec!(50100));
    let report = restarted.reconciler().run_cycle().await.unwrap();
    assert_eq!(report.replaced, 0);
    assert_eq!(report.kept, 1);
}

#[tokio::test]
async fn test_remove_cancels_on_exchange() {
    let h = harness(dec!(50500), dec!(51000));
    let exchange_order_id = rest_buy(&h.venue, dec!(50000)).await;
    h.service
        .bind("BTCUSDT", Interval::H4, EmaPeriod::P21, Side::Buy, None)
        .await
        .unwrap();

    let output = h
        .service
        .execute(Command::parse_chat(&format!("/remove {}", ID)).unwrap())
        .await
        .unwrap();
    assert_eq!(output.to_string(), format!("Removed {}", ID));

    let order = h.venue.order("BTCUSDT", exchange_order_id).await.unwrap();
    assert_eq!(order.status, ExchangeOrderStatus::Canceled);
    assert!(h.service.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_queries_through_chat() {
    let h = harness(dec!(50000), dec!(50500));

    let text = h
        .service
        .execute(Command::parse_chat("/ema btc 4h").unwrap())
        .await
        .unwrap()
        .to_string();
    assert!(text.starts_with("BTCUSDT (4h) = 50500"));
    assert!(text.contains("EMA21: 50000 (+1.00%)"));
    assert!(text.contains("EMA200: 50000"));

    let text = h
        .service
        .execute(Command::parse_chat("/price btc").unwrap())
        .await
        .unwrap()
        .to_string();
    assert_eq!(text, "BTCUSDT: 50500");

    let text = h
        .service
        .execute(Command::Balance)
        .await
        .unwrap()
        .to_string();
    assert!(text.starts_with("USDT: 10000"));
}
