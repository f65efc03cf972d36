//! End-to-end scenarios from SPEC_FULL §8: happy-path order, risk block on
//! oversized notional, and the daily-loss stop propagating through the
//! assembler into a strategy transition.

use hft_core::config::{HftConfig, RiskConfig};
use hft_core::engine::strategy::Strategy;
use hft_core::oms::venue::SimulatedExecutionVenue;
use hft_core::types::{Order, OrderStatus, OrderType, Side, TimeInForce};
use hft_core::Assembler;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::time::Duration;

struct NoopStrategy {
    id: String,
    symbols: Vec<String>,
}

impl Strategy for NoopStrategy {
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        "noop"
    }
    fn strategy_type(&self) -> &str {
        "noop"
    }
    fn symbols(&self) -> &[String] {
        &self.symbols
    }
}

fn order_intent(strategy_id: &str, side: Side, qty: Decimal, price: Decimal) -> Order {
    Order {
        id: String::new(),
        client_order_id: String::new(),
        strategy_id: strategy_id.to_string(),
        symbol: "BTCUSDT".to_string(),
        exchange: "sim".to_string(),
        side,
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

async fn assembler_with(config: HftConfig) -> std::sync::Arc<Assembler> {
    let assembler = Assembler::new(config, Box::new(SimulatedExecutionVenue::new("sim")))
        .await
        .expect("assembler construction");
    assembler
        .register_strategy(Box::new(NoopStrategy {
            id: "s1".to_string(),
            symbols: vec!["BTCUSDT".to_string()],
        }))
        .expect("register");
    assembler.start_strategy("s1").expect("start");
    assembler
}

/// Scenario 1: happy-path order fills in full at the requested price.
#[tokio::test]
async fn happy_path_order_fills_and_updates_position() {
    let assembler = assembler_with(HftConfig::default()).await;

    let placed = assembler
        .place_order(order_intent("s1", Side::Buy, dec!(0.01), dec!(30000)))
        .await
        .expect("order should be accepted");

    // Give the fill-ingestion bridge task a beat to process the instant fill.
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(placed.status, OrderStatus::New);

    let positions = assembler.get_all_positions("s1");
    let position = positions
        .iter()
        .find(|p| p.symbol == "BTCUSDT")
        .expect("position should exist after fill");
    assert_eq!(position.qty, dec!(0.01));
    assert_eq!(position.avg_entry_px, dec!(30000));

    assembler.shutdown().await;
}

/// Scenario 2: an oversized notional is blocked before it ever reaches OMS.
#[tokio::test]
async fn oversized_notional_is_blocked_by_risk() {
    let config = HftConfig {
        risk: RiskConfig {
            max_exposure: dec!(100),
            ..RiskConfig::default()
        },
        ..HftConfig::default()
    };
    let assembler = assembler_with(config).await;

    let result = assembler
        .place_order(order_intent("s1", Side::Buy, dec!(1), dec!(30000)))
        .await;

    assert!(result.is_err(), "a 30000-notional order must be rejected under max_exposure=100");
    assert!(assembler.get_active_orders("s1").is_empty(), "no order should have reached OMS");

    assembler.shutdown().await;
}

/// Scenario 3: realising a loss past `max_daily_loss` is a Critical
/// violation that stops the strategy via the risk-event bridge.
#[tokio::test]
async fn daily_loss_breach_stops_the_strategy() {
    let config = HftConfig {
        risk: RiskConfig {
            max_daily_loss: dec!(50),
            max_exposure: dec!(1_000_000),
            max_position_size: dec!(1_000_000),
            ..RiskConfig::default()
        },
        ..HftConfig::default()
    };
    let assembler = assembler_with(config).await;

    // Buy high, sell low, repeatedly, to realise a loss past the cap.
    assembler
        .place_order(order_intent("s1", Side::Buy, dec!(1), dec!(30000)))
        .await
        .expect("buy should be accepted");
    tokio::time::sleep(Duration::from_millis(50)).await;

    assembler
        .place_order(order_intent("s1", Side::Sell, dec!(1), dec!(29949)))
        .await
        .expect("sell should be accepted even though it realises a loss");
    tokio::time::sleep(Duration::from_millis(50)).await;

    // The position is flat again; the next order must be rejected as the
    // strategy is no longer Running (Risk stopped it after the loss breach).
    let result = assembler
        .place_order(order_intent("s1", Side::Buy, dec!(0.01), dec!(30000)))
        .await;
    assert!(result.is_err(), "orders for a daily-loss-stopped strategy must be rejected");

    tokio::time::sleep(Duration::from_millis(50)).await;
    let summaries = assembler.get_strategy_summaries();
    let s1 = summaries.iter().find(|s| s.id == "s1").expect("strategy exists");
    assert_eq!(s1.status, hft_core::types::StrategyStatus::Stopped);

    assembler.shutdown().await;
}
