//! Risk: pre-trade validation and exposure tracking (§4.4).
//!
//! `validate_order` is the one synchronous, non-blocking, non-allocating
//! (beyond its `Result`) function that crosses a component boundary in this
//! design — mirrors the teacher's `risk::RiskManager::validate_signal`
//! being a ~25ns pure check, generalised from the teacher's single
//! const-generic position to a per-strategy, per-symbol ledger behind a
//! `DashMap`. Daily P&L accounting and the high-water-mark drawdown check
//! are adapted near-verbatim from `risk::RiskManager::{check_daily_reset,
//! validate_signal}` (UTC calendar day boundary, `daily_pnl` reset at each
//! new day, drawdown measured against the running high-water mark).

use crate::config::RiskConfig;
use crate::error::RiskViolation;
use crate::monitoring::{Alert, AlertSeverity, AlertSink, RiskMetrics};
use crate::types::{Fill, Order, Position, RiskAction, RiskEvent, RiskSeverity, Tick};
use dashmap::DashMap;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::warn;

const SECONDS_PER_DAY: u64 = 86_400;

fn day_start_ts(now_secs: u64) -> u64 {
    (now_secs / SECONDS_PER_DAY) * SECONDS_PER_DAY
}

struct StrategyLedger {
    positions: DashMap<String, Position>,
    daily_realised_pnl: Mutex<Decimal>,
    high_water_mark: Mutex<Decimal>,
    day_start: Mutex<u64>,
    violation_count: AtomicU32,
}

impl StrategyLedger {
    fn new() -> Self {
        Self {
            positions: DashMap::new(),
            daily_realised_pnl: Mutex::new(Decimal::ZERO),
            high_water_mark: Mutex::new(Decimal::ZERO),
            day_start: Mutex::new(day_start_ts(crate::ids::now_ns() / 1_000_000_000)),
            violation_count: AtomicU32::new(0),
        }
    }

    fn check_daily_reset(&self) {
        let current_day = day_start_ts(crate::ids::now_ns() / 1_000_000_000);
        let mut day_start = self.day_start.lock();
        if current_day > *day_start {
            *self.daily_realised_pnl.lock() = Decimal::ZERO;
            *self.high_water_mark.lock() = Decimal::ZERO;
            *day_start = current_day;
        }
    }

    fn notional_exposure(&self) -> Decimal {
        self.positions.iter().map(|p| p.notional_exposure()).sum()
    }

    fn projected_position_qty(&self, symbol: &str, signed_delta: Decimal) -> Decimal {
        self.positions
            .get(symbol)
            .map(|p| p.qty + signed_delta)
            .unwrap_or(signed_delta)
    }
}

/// Pre-trade validation and exposure-tracking component.
pub struct Risk {
    config: RiskConfig,
    metrics: Arc<RiskMetrics>,
    alerts: Arc<dyn AlertSink>,
    ledgers: DashMap<String, Arc<StrategyLedger>>,
    running: DashMap<String, ()>,
    last_price: DashMap<String, Decimal>,
    event_tx: mpsc::Sender<RiskEvent>,
    event_rx: AsyncMutex<Option<mpsc::Receiver<RiskEvent>>>,
    audit_task: parking_lot::Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl Risk {
    pub fn new(config: RiskConfig, metrics: Arc<RiskMetrics>, alerts: Arc<dyn AlertSink>) -> Arc<Self> {
        let (event_tx, event_rx) = mpsc::channel(1024);
        let risk = Arc::new(Self {
            config,
            metrics,
            alerts,
            ledgers: DashMap::new(),
            running: DashMap::new(),
            last_price: DashMap::new(),
            event_tx,
            event_rx: AsyncMutex::new(Some(event_rx)),
            audit_task: parking_lot::Mutex::new(None),
        });
        let task = risk.clone().spawn_audit_loop();
        *risk.audit_task.lock() = Some(task);
        risk
    }

    /// Aborts the periodic exposure-audit task. Part of the assembler's
    /// cooperative shutdown sequence (§5: Risk, Engine, OMS, Feeds).
    pub fn shutdown(&self) {
        if let Some(task) = self.audit_task.lock().take() {
            task.abort();
        }
    }

    /// Consumes the risk-event receiver. Panics if called more than once.
    pub async fn risk_event_channel(&self) -> mpsc::Receiver<RiskEvent> {
        self.event_rx.lock().await.take().expect("risk_event_channel already taken")
    }

    /// The assembling layer calls this on every Engine lifecycle transition
    /// so `validate_order` can apply rule 1 without depending on Engine.
    pub fn set_strategy_running(&self, strategy_id: &str, running: bool) {
        if running {
            self.running.insert(strategy_id.to_string(), ());
        } else {
            self.running.remove(strategy_id);
        }
    }

    pub fn on_tick(&self, tick: &Tick) {
        self.last_price.insert(tick.symbol.clone(), tick.price);
    }

    fn ledger_for(&self, strategy_id: &str) -> Arc<StrategyLedger> {
        self.ledgers
            .entry(strategy_id.to_string())
            .or_insert_with(|| Arc::new(StrategyLedger::new()))
            .clone()
    }

    /// Applies the §4.4 rules in order; the first failure returns.
    /// Synchronous, non-blocking, no `.await` — safe to call from a hot path.
    pub fn validate_order(&self, order: &Order) -> Result<(), RiskViolation> {
        if !self.running.contains_key(&order.strategy_id) {
            return self.reject(order, RiskViolation::StrategyNotRunning);
        }

        let ledger = self.ledger_for(&order.strategy_id);
        ledger.check_daily_reset();

        let signed_delta = order.side.sign() * order.qty;
        let projected_qty = ledger.projected_position_qty(&order.symbol, signed_delta);

        if projected_qty.abs() > self.config.max_position_size {
            return self.reject(
                order,
                RiskViolation::PositionLimitExceeded {
                    projected: projected_qty.to_string(),
                    limit: self.config.max_position_size.to_string(),
                },
            );
        }

        let reference_price = order
            .price
            .or_else(|| self.last_price.get(&order.symbol).map(|p| *p))
            .unwrap_or(Decimal::ZERO);
        let projected_notional = projected_qty.abs() * reference_price;
        if projected_notional > self.config.max_exposure {
            return self.reject(
                order,
                RiskViolation::ExposureLimitExceeded {
                    projected: projected_notional.to_string(),
                    limit: self.config.max_exposure.to_string(),
                },
            );
        }

        let daily_pnl = *ledger.daily_realised_pnl.lock();
        if daily_pnl < -self.config.max_daily_loss {
            return self.reject(
                order,
                RiskViolation::DailyLossLimitBreached {
                    pnl: daily_pnl.to_string(),
                    limit: self.config.max_daily_loss.to_string(),
                },
            );
        }

        let high_water_mark = *ledger.high_water_mark.lock();
        let drawdown = high_water_mark - daily_pnl;
        if drawdown > self.config.max_drawdown {
            return self.reject(
                order,
                RiskViolation::DrawdownLimitBreached {
                    drawdown: drawdown.to_string(),
                    limit: self.config.max_drawdown.to_string(),
                },
            );
        }

        if order.qty <= Decimal::ZERO {
            return self.reject(
                order,
                RiskViolation::OrderSanityFailed {
                    reason: "non-positive quantity".to_string(),
                },
            );
        }

        if let (Some(price), Some(last)) = (order.price, self.last_price.get(&order.symbol).map(|p| *p)) {
            if !last.is_zero() {
                let deviation = (price - last).abs() / last;
                if deviation > self.config.sanity_price_band {
                    return self.reject(
                        order,
                        RiskViolation::OrderSanityFailed {
                            reason: format!("price {price} deviates {deviation} from last tick {last}"),
                        },
                    );
                }
            }
        }

        Ok(())
    }

    fn reject(&self, order: &Order, violation: RiskViolation) -> Result<(), RiskViolation> {
        self.metrics
            .violations_total
            .with_label_values(&[violation_kind(&violation)])
            .inc();

        let ledger = self.ledger_for(&order.strategy_id);
        let count = ledger.violation_count.fetch_add(1, Ordering::Relaxed) + 1;
        let escalate = violation.always_critical() || count >= self.config.violation_threshold;

        let (severity, action) = if escalate {
            (RiskSeverity::Critical, RiskAction::StopStrategy)
        } else {
            (RiskSeverity::Warn, RiskAction::BlockOrder)
        };

        if escalate {
            self.metrics.strategies_stopped.inc();
            ledger.violation_count.store(0, Ordering::Relaxed);
        }

        self.publish_event(RiskEvent {
            id: crate::ids::generate("rskevt"),
            event_type: "validation_failure".to_string(),
            severity,
            strategy_id: Some(order.strategy_id.clone()),
            action,
            description: violation.to_string(),
            ts: crate::ids::now_ns(),
        });

        Err(violation)
    }

    /// Updates the exposure ledger from a confirmed fill.
    pub fn on_fill(&self, fill: &Fill) {
        let ledger = self.ledger_for(&fill.strategy_id);
        ledger.check_daily_reset();

        let before = ledger
            .positions
            .get(&fill.symbol)
            .map(|p| p.realised_pnl)
            .unwrap_or(Decimal::ZERO);

        ledger
            .positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::flat(fill.strategy_id.clone(), fill.symbol.clone(), fill.exchange.clone()))
            .apply_fill(fill);

        let after = ledger
            .positions
            .get(&fill.symbol)
            .map(|p| p.realised_pnl)
            .unwrap_or(Decimal::ZERO);

        let mut daily_pnl = ledger.daily_realised_pnl.lock();
        *daily_pnl += after - before;
        let mut hwm = ledger.high_water_mark.lock();
        if *daily_pnl > *hwm {
            *hwm = *daily_pnl;
        }
    }

    fn publish_event(&self, event: RiskEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(event_type = %event.event_type, "risk: event channel full, dropping event");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("risk: event channel closed");
            }
        }
    }

    fn spawn_audit_loop(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.check_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(std::time::Duration::from_millis(100)));
            loop {
                ticker.tick().await;
                self.audit_exposure();
            }
        })
    }

    fn audit_exposure(&self) {
        const MARGIN: Decimal = Decimal::from_parts(9, 0, 0, false, 1); // 0.9
        for entry in self.ledgers.iter() {
            let strategy_id = entry.key().clone();
            let exposure = entry.value().notional_exposure();
            self.metrics
                .active_exposure
                .set(i64::try_from(exposure).unwrap_or(i64::MAX));

            if exposure > self.config.max_exposure * MARGIN {
                self.publish_event(RiskEvent {
                    id: crate::ids::generate("rskevt"),
                    event_type: "exposure_audit".to_string(),
                    severity: RiskSeverity::Warn,
                    strategy_id: Some(strategy_id.clone()),
                    action: RiskAction::ReduceExposure,
                    description: format!("exposure {exposure} within margin of max_exposure {}", self.config.max_exposure),
                    ts: crate::ids::now_ns(),
                });
                self.alerts.emit(
                    Alert::new(AlertSeverity::Warning, "strategy exposure approaching cap")
                        .with_detail("strategy_id", strategy_id),
                );
            }
        }
    }
}

fn violation_kind(violation: &RiskViolation) -> &'static str {
    match violation {
        RiskViolation::StrategyNotRunning => "strategy_not_running",
        RiskViolation::PositionLimitExceeded { .. } => "position_limit_exceeded",
        RiskViolation::ExposureLimitExceeded { .. } => "exposure_limit_exceeded",
        RiskViolation::DailyLossLimitBreached { .. } => "daily_loss_limit_breached",
        RiskViolation::DrawdownLimitBreached { .. } => "drawdown_limit_breached",
        RiskViolation::OrderSanityFailed { .. } => "order_sanity_failed",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{LoggingAlertSink, MetricsRegistry};
    use crate::types::{OrderStatus, OrderType, Side, TimeInForce};
    use rust_decimal_macros::dec;

    fn test_risk(config: RiskConfig) -> Arc<Risk> {
        let registry = MetricsRegistry::new().unwrap();
        Risk::new(config, registry.risk.clone(), Arc::new(LoggingAlertSink))
    }

    fn order(strategy_id: &str, qty: Decimal, price: Decimal) -> Order {
        Order {
            id: "o1".into(),
            client_order_id: "c1".into(),
            strategy_id: strategy_id.into(),
            symbol: "BTCUSDT".into(),
            exchange: "sim".into(),
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

    #[test]
    fn rejects_when_strategy_not_running() {
        let risk = test_risk(RiskConfig::default());
        let err = risk.validate_order(&order("s1", dec!(1), dec!(100))).unwrap_err();
        assert_eq!(err, RiskViolation::StrategyNotRunning);
    }

    #[test]
    fn allows_order_within_limits() {
        let risk = test_risk(RiskConfig::default());
        risk.set_strategy_running("s1", true);
        assert!(risk.validate_order(&order("s1", dec!(1), dec!(100))).is_ok());
    }

    #[test]
    fn rejects_position_over_limit() {
        let mut config = RiskConfig::default();
        config.max_position_size = dec!(1);
        let risk = test_risk(config);
        risk.set_strategy_running("s1", true);
        let err = risk.validate_order(&order("s1", dec!(5), dec!(100))).unwrap_err();
        assert!(matches!(err, RiskViolation::PositionLimitExceeded { .. }));
    }

    #[test]
    fn daily_loss_breach_blocks_further_orders() {
        let mut config = RiskConfig::default();
        config.max_daily_loss = dec!(100);
        let risk = test_risk(config);
        risk.set_strategy_running("s1", true);

        let fill = Fill {
            id: "f1".into(),
            order_id: "o1".into(),
            strategy_id: "s1".into(),
            symbol: "BTCUSDT".into(),
            exchange: "sim".into(),
            side: Side::Sell,
            qty: dec!(1),
            price: dec!(0),
            fee: dec!(200),
            fee_asset: "USDT".into(),
            ts: 1,
        };
        risk.on_fill(&fill);

        let err = risk.validate_order(&order("s1", dec!(1), dec!(100))).unwrap_err();
        assert!(matches!(err, RiskViolation::DailyLossLimitBreached { .. }));
    }
}
