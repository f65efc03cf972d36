//! SPEC_FULL §8 scenario 6: with the fill channel capacity 1 and no
//! consumer, a second fill's ingestion blocks rather than drops, and
//! position accounting never diverges from the fills actually applied.

use hft_core::config::OmsConfig;
use hft_core::monitoring::{LoggingAlertSink, MetricsRegistry};
use hft_core::oms::venue::SimulatedExecutionVenue;
use hft_core::types::{Order, OrderStatus, OrderType, Side, TimeInForce};
use hft_core::Oms;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

fn order_intent(qty: Decimal, price: Decimal) -> Order {
    Order {
        id: String::new(),
        client_order_id: String::new(),
        strategy_id: "s1".to_string(),
        symbol: "BTCUSDT".to_string(),
        exchange: "sim".to_string(),
        side: Side::Buy,
        order_type: OrderType::Limit,
        qty,
        price: Some(price),
        stop_price: None,
        tif: TimeInForce::GTC,
        status: OrderStatus::New,
        filled_qty: Decimal::ZERO,
        avg_fill_px: None,
        created_ts: 0,
        updated_ts: 0,
    }
}

#[tokio::test]
async fn second_fill_blocks_instead_of_dropping_and_position_stays_consistent() {
    let registry = MetricsRegistry::new().unwrap();
    let config = OmsConfig {
        fill_channel_capacity: 1,
        ..OmsConfig::default()
    };
    let oms = Oms::new(
        config,
        registry.oms.clone(),
        Arc::new(LoggingAlertSink),
        Box::new(SimulatedExecutionVenue::new("sim")),
    );

    // No consumer for the fill channel yet: two orders arrive, each filling
    // instantly through the simulated venue.
    let first = oms.place_order(order_intent(dec!(0.01), dec!(30000))).await.unwrap();
    let second = oms.place_order(order_intent(dec!(0.02), dec!(30000))).await.unwrap();

    // Give the fill-ingestion task time to process both fills. The first
    // occupies the capacity-1 channel; ingesting the second blocks on
    // `send().await` inside that task, but position state for both fills
    // must already be applied regardless.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let positions = oms.get_all_positions("s1");
    let position = positions.iter().find(|p| p.symbol == "BTCUSDT").expect("position exists");
    assert_eq!(position.qty, dec!(0.03), "both fills must be reflected even though the channel is blocked");

    // Now drain: both fills must still be delivered, not dropped.
    let mut fill_channel = oms.fill_channel().await;
    let fill_one = tokio::time::timeout(Duration::from_secs(1), fill_channel.recv())
        .await
        .expect("should not time out")
        .expect("first fill delivered");
    let fill_two = tokio::time::timeout(Duration::from_secs(1), fill_channel.recv())
        .await
        .expect("should not time out")
        .expect("second fill delivered");

    let delivered_qty = fill_one.qty + fill_two.qty;
    assert_eq!(delivered_qty, dec!(0.03), "no fill may be silently dropped");

    let _ = (first.id, second.id);
}
