//! Wires Feeds, Engine, Risk, and OMS together behind typed channels and
//! owns the cooperative shutdown sequence (§5, §9).
//!
//! This is the one place in the crate that holds references to more than
//! one component — everywhere else, Engine has no dependency on OMS or
//! Risk, and OMS has no dependency on Risk. The bridging tasks here are
//! the sole crossing points, matching §9's "every link between components
//! is a typed, bounded channel" design note.

use crate::config::HftConfig;
use crate::engine::strategy::Strategy;
use crate::engine::Engine;
use crate::error::{CancelOrderError, InvalidState, PlaceOrderError};
use crate::feeds::connector::VenueConnector;
use crate::feeds::Feeds;
use crate::monitoring::{Alert, AlertSeverity, AlertSink, LoggingAlertSink, MetricsRegistry};
use crate::oms::venue::ExecutionVenue;
use crate::oms::Oms;
use crate::risk::Risk;
use crate::types::{Order, OrderStatus, OrderType, Position, RiskAction, RiskSeverity, Signal, StrategySummary, TimeInForce};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

fn signal_to_order(signal: &Signal) -> Order {
    Order {
        id: String::new(),
        client_order_id: String::new(),
        strategy_id: signal.strategy_id.clone(),
        symbol: signal.symbol.clone(),
        exchange: signal.exchange.clone(),
        side: signal.side,
        order_type: OrderType::Limit,
        qty: signal.qty,
        price: Some(signal.price),
        stop_price: None,
        tif: TimeInForce::GTC,
        status: OrderStatus::New,
        filled_qty: Decimal::ZERO,
        avg_fill_px: None,
        created_ts: signal.ts,
        updated_ts: signal.ts,
    }
}

/// Owns one instance each of Feeds, Engine, Risk, and OMS, plus the
/// bridging tasks that move events between them.
pub struct Assembler {
    feeds: Arc<Feeds>,
    engine: Arc<Engine>,
    risk: Arc<Risk>,
    oms: Arc<Oms>,
    metrics: MetricsRegistry,
    alerts: Arc<dyn AlertSink>,
    bridge_tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Assembler {
    pub async fn new(config: HftConfig, venue: Box<dyn ExecutionVenue>) -> anyhow::Result<Arc<Self>> {
        config.validate()?;
        let metrics = MetricsRegistry::new()?;
        let alerts: Arc<dyn AlertSink> = Arc::new(LoggingAlertSink);

        let feeds = Arc::new(Feeds::new(config.feeds.clone(), metrics.feeds.clone(), alerts.clone()));
        let engine = Arc::new(Engine::new(config.engine.clone(), metrics.engine.clone(), alerts.clone()));
        let risk = Risk::new(config.risk.clone(), metrics.risk.clone(), alerts.clone());
        let oms = Oms::new(config.oms.clone(), metrics.oms.clone(), alerts.clone(), venue);

        let assembler = Arc::new(Self {
            feeds,
            engine,
            risk,
            oms,
            metrics,
            alerts,
            bridge_tasks: Mutex::new(Vec::new()),
        });

        assembler.clone().spawn_bridges().await;
        info!("assembler: wiring complete");
        Ok(assembler)
    }

    async fn spawn_bridges(self: Arc<Self>) {
        let mut tasks = Vec::new();

        {
            let mut ticks = self.feeds.subscribe_ticks(Vec::new());
            let engine = self.engine.clone();
            let risk = self.risk.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(tick) = ticks.recv().await {
                    risk.on_tick(&tick);
                    engine.ingest_tick(&tick);
                }
            }));
        }

        {
            let mut books = self.feeds.subscribe_orderbook(Vec::new());
            let engine = self.engine.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(book) = books.recv().await {
                    engine.ingest_order_book(&book);
                }
            }));
        }

        {
            let mut signals = self.engine.signal_channel().await;
            let risk = self.risk.clone();
            let oms = self.oms.clone();
            let engine = self.engine.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(mut signal) = signals.recv().await {
                    let order = signal_to_order(&signal);
                    match risk.validate_order(&order) {
                        Ok(()) => {
                            signal.executed = true;
                            match oms.place_order(order).await {
                                Ok(placed) => {
                                    info!(order_id = %placed.id, strategy_id = %signal.strategy_id, "assembler: signal executed");
                                    engine.publish_ack(signal);
                                }
                                Err(err) => {
                                    warn!(strategy_id = %signal.strategy_id, error = %err, "assembler: place_order failed");
                                }
                            }
                        }
                        Err(violation) => {
                            warn!(strategy_id = %signal.strategy_id, error = %violation, "assembler: signal blocked by risk");
                        }
                    }
                }
            }));
        }

        {
            let mut updates = self.oms.order_update_channel().await;
            let engine = self.engine.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(order) = updates.recv().await {
                    engine.ingest_order_update(&order);
                }
            }));
        }

        {
            let mut fills = self.oms.fill_channel().await;
            let engine = self.engine.clone();
            let risk = self.risk.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(fill) = fills.recv().await {
                    risk.on_fill(&fill);
                    engine.ingest_fill(&fill);
                }
            }));
        }

        {
            let mut events = self.risk.risk_event_channel().await;
            let engine = self.engine.clone();
            let risk = self.risk.clone();
            let alerts = self.alerts.clone();
            tasks.push(tokio::spawn(async move {
                while let Some(event) = events.recv().await {
                    if event.severity == RiskSeverity::Critical {
                        alerts.emit(
                            Alert::new(AlertSeverity::Critical, event.description.clone())
                                .with_detail("strategy_id", event.strategy_id.clone().unwrap_or_default()),
                        );
                    }
                    if let (RiskAction::StopStrategy, Some(strategy_id)) = (event.action, &event.strategy_id) {
                        risk.set_strategy_running(strategy_id, false);
                        if let Err(err) = engine.stop_strategy(strategy_id) {
                            warn!(strategy_id = %strategy_id, error = %err, "assembler: failed to stop strategy after critical risk event");
                        }
                    }
                }
            }));
        }

        *self.bridge_tasks.lock() = tasks;
    }

    pub async fn spawn_venue(&self, connector: impl VenueConnector + 'static) {
        self.feeds.spawn_venue(connector).await;
    }

    pub fn register_strategy(&self, strategy: Box<dyn Strategy>) -> Result<(), InvalidState> {
        self.engine.register_strategy(strategy)
    }

    pub fn start_strategy(&self, id: &str) -> Result<(), InvalidState> {
        self.engine.start_strategy(id)?;
        self.risk.set_strategy_running(id, true);
        Ok(())
    }

    pub fn stop_strategy(&self, id: &str) -> Result<(), InvalidState> {
        self.engine.stop_strategy(id)?;
        self.risk.set_strategy_running(id, false);
        Ok(())
    }

    pub fn reset_strategy(&self, id: &str) -> Result<(), InvalidState> {
        self.engine.reset_strategy(id)
    }

    pub fn get_strategy_summaries(&self) -> Vec<StrategySummary> {
        self.engine.get_strategy_summaries()
    }

    /// Consumes the acknowledgement channel: every signal the assembler
    /// actually handed to OMS, with `executed=true` (§9.1). Panics if
    /// called more than once — same single-consumer contract as Engine's
    /// other channels.
    pub async fn signal_ack_channel(&self) -> crate::channel::DropOldestReceiver<Signal> {
        self.engine.signal_ack_channel().await
    }

    /// Places an order intent directly (the `POST /hft/orders` path), going
    /// through the same risk gate as strategy-emitted signals.
    pub async fn place_order(&self, order: Order) -> Result<Order, PlaceOrderError> {
        self.risk.validate_order(&order).map_err(PlaceOrderError::Risk)?;
        self.oms.place_order(order).await
    }

    pub async fn cancel_order(&self, order_id: &str) -> Result<(), CancelOrderError> {
        self.oms.cancel_order(order_id).await
    }

    pub fn get_active_orders(&self, strategy_id: &str) -> Vec<Order> {
        self.oms.get_active_orders(strategy_id)
    }

    pub fn get_all_positions(&self, strategy_id: &str) -> Vec<Position> {
        self.oms.get_all_positions(strategy_id)
    }

    /// `GET /hft/status`'s `services.feeds` field: false if any venue has
    /// gone quiet past `FeedsConfig::liveness_window`.
    pub fn feeds_healthy(&self) -> bool {
        self.feeds.health()
    }

    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// Cooperative shutdown in reverse dependency order (§5): Risk, Engine,
    /// OMS, Feeds. Each component stops producing/accepting new work before
    /// the next is torn down, then the bridging tasks are aborted.
    pub async fn shutdown(&self) {
        info!("assembler: shutdown sequence starting");
        self.risk.shutdown();
        self.engine.shutdown();
        self.oms.shutdown();
        self.feeds.shutdown().await;
        for task in self.bridge_tasks.lock().drain(..) {
            task.abort();
        }
        info!("assembler: shutdown complete");
    }
}
