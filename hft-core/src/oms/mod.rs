//! OMS: order management and venue dispatch (§4.2).
//!
//! Owns the authoritative order and position state, enforces a per-strategy
//! rate limit before dispatch, and republishes order/fill updates to the
//! rest of the system. The fill channel is never allowed to silently drop —
//! a full channel blocks the fill-ingestion task and raises an alert,
//! because a dropped fill would desynchronise position accounting.

pub mod rate_limiter;
pub mod venue;

use crate::channel::{drop_oldest_channel, DropOldestReceiver, DropOldestSender};
use crate::config::OmsConfig;
use crate::error::{CancelOrderError, NotFound, PlaceOrderError, TransportError, ValidationError};
use crate::feeds::backoff::{BackoffConfig, ExponentialBackoff};
use crate::monitoring::{Alert, AlertSeverity, AlertSink, OmsMetrics};
use crate::types::{Fill, Order, OrderStatus, OrderType, Position, TimeInForce};
use dashmap::DashMap;
use rate_limiter::PerStrategyRateLimiter;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tracing::{info, warn};
use venue::{ack_to_status, ExecutionVenue, VenueAck};

fn position_key(strategy_id: &str, symbol: &str) -> String {
    format!("{strategy_id}:{symbol}")
}

fn validate_intent(order: &Order) -> Result<(), ValidationError> {
    if order.symbol.is_empty() {
        return Err(ValidationError::EmptySymbol);
    }
    if order.strategy_id.is_empty() {
        return Err(ValidationError::EmptyStrategy);
    }
    if order.qty <= rust_decimal::Decimal::ZERO {
        return Err(ValidationError::NonPositiveQuantity);
    }
    if order.order_type != OrderType::Market && order.price.is_none() {
        return Err(ValidationError::MissingPrice);
    }
    if order.order_type == OrderType::Market && matches!(order.tif, TimeInForce::GTC | TimeInForce::DAY) {
        return Err(ValidationError::IncompatibleTimeInForce);
    }
    Ok(())
}

/// Order management and execution-venue dispatch component.
pub struct Oms {
    config: OmsConfig,
    metrics: Arc<OmsMetrics>,
    alerts: Arc<dyn AlertSink>,
    rate_limiter: PerStrategyRateLimiter,
    orders: DashMap<String, Order>,
    positions: DashMap<String, Position>,
    venue: AsyncMutex<Box<dyn ExecutionVenue>>,
    order_update_tx: DropOldestSender<Order>,
    order_update_rx: AsyncMutex<Option<DropOldestReceiver<Order>>>,
    fill_tx: mpsc::Sender<Fill>,
    fill_rx: AsyncMutex<Option<mpsc::Receiver<Fill>>>,
    tasks: parking_lot::Mutex<Vec<tokio::task::JoinHandle<()>>>,
}

impl Oms {
    pub fn new(
        config: OmsConfig,
        metrics: Arc<OmsMetrics>,
        alerts: Arc<dyn AlertSink>,
        venue: Box<dyn ExecutionVenue>,
    ) -> Arc<Self> {
        let (order_update_tx, order_update_rx) = drop_oldest_channel(config.order_update_channel_capacity);
        let (fill_tx, fill_rx) = mpsc::channel(config.fill_channel_capacity);
        let rate_limiter = PerStrategyRateLimiter::new(config.max_orders_per_second);

        let oms = Arc::new(Self {
            config,
            metrics,
            alerts,
            rate_limiter,
            orders: DashMap::new(),
            positions: DashMap::new(),
            venue: AsyncMutex::new(venue),
            order_update_tx,
            order_update_rx: AsyncMutex::new(Some(order_update_rx)),
            fill_tx,
            fill_rx: AsyncMutex::new(Some(fill_rx)),
            tasks: parking_lot::Mutex::new(Vec::new()),
        });

        let fill_task = oms.clone().spawn_fill_ingestion();
        let sweep_task = oms.clone().spawn_timeout_sweep();
        oms.tasks.lock().extend([fill_task, sweep_task]);
        oms
    }

    /// Aborts the background fill-ingestion and timeout-sweep tasks. Part of
    /// the assembler's cooperative shutdown sequence (§5: Risk, Engine, OMS,
    /// Feeds).
    pub fn shutdown(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    /// Consumes the order-update receiver. Panics if called more than once —
    /// this channel has exactly one logical consumer (the assembling layer).
    pub async fn order_update_channel(&self) -> DropOldestReceiver<Order> {
        self.order_update_rx
            .lock()
            .await
            .take()
            .expect("order_update_channel already taken")
    }

    /// Consumes the fill receiver. Panics if called more than once, same
    /// reasoning as [`Oms::order_update_channel`].
    pub async fn fill_channel(&self) -> mpsc::Receiver<Fill> {
        self.fill_rx.lock().await.take().expect("fill_channel already taken")
    }

    pub fn get_active_orders(&self, strategy_id: &str) -> Vec<Order> {
        self.orders
            .iter()
            .filter(|entry| entry.strategy_id == strategy_id && entry.is_active())
            .map(|entry| entry.clone())
            .collect()
    }

    pub fn get_all_positions(&self, strategy_id: &str) -> Vec<Position> {
        self.positions
            .iter()
            .filter(|entry| entry.strategy_id == strategy_id)
            .map(|entry| entry.clone())
            .collect()
    }

    /// Validates, rate-limits, assigns ids, and dispatches an order intent
    /// to the venue. Retries venue transport failures with capped backoff
    /// up to `OmsConfig::retry_attempts` before giving up.
    pub async fn place_order(&self, mut order: Order) -> Result<Order, PlaceOrderError> {
        validate_intent(&order).map_err(PlaceOrderError::Validation)?;

        if !self.rate_limiter.allow(&order.strategy_id) {
            self.metrics.orders_rate_limited.inc();
            return Err(PlaceOrderError::RateLimited(crate::error::RateLimited {
                strategy_id: order.strategy_id.clone(),
            }));
        }

        let now = crate::ids::now_ns();
        order.id = crate::ids::generate("ord");
        if order.client_order_id.is_empty() {
            order.client_order_id = crate::ids::generate("cli");
        }
        order.status = OrderStatus::New;
        order.filled_qty = rust_decimal::Decimal::ZERO;
        order.avg_fill_px = None;
        order.created_ts = now;
        order.updated_ts = now;

        let mut backoff = ExponentialBackoff::with_config(BackoffConfig {
            max_retries: Some(self.config.retry_attempts as usize),
            ..BackoffConfig::default_config()
        });

        let ack = loop {
            let result = {
                let mut venue = self.venue.lock().await;
                venue.submit_order(&order).await
            };
            match result {
                Ok(ack) => break ack,
                Err(err) => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(strategy_id = %order.strategy_id, error = %err, "oms: venue submit failed, retrying");
                        tokio::time::sleep(delay).await;
                    }
                    None => {
                        self.metrics.orders_rejected.inc();
                        return Err(PlaceOrderError::Transport(err));
                    }
                },
            }
        };

        order.status = ack_to_status(&ack);
        order.updated_ts = crate::ids::now_ns();

        if order.status == OrderStatus::Rejected {
            self.metrics.orders_rejected.inc();
        } else {
            self.metrics.orders_placed.inc();
        }
        self.metrics
            .orders_by_status
            .with_label_values(&[&order.status.to_string()])
            .inc();

        self.orders.insert(order.id.clone(), order.clone());
        self.publish_order_update(order.clone());
        Ok(order)
    }

    /// Requests cancellation. Idempotent: cancelling an already-terminal
    /// order succeeds without contacting the venue.
    pub async fn cancel_order(&self, order_id: &str) -> Result<(), CancelOrderError> {
        let Some(mut entry) = self.orders.get_mut(order_id) else {
            return Err(CancelOrderError::NotFound(NotFound {
                kind: "order",
                id: order_id.to_string(),
            }));
        };

        if entry.status.is_terminal() {
            return Ok(());
        }

        {
            let mut venue = self.venue.lock().await;
            venue
                .cancel_order(order_id)
                .await
                .map_err(CancelOrderError::Transport)?;
        }

        entry.status = OrderStatus::Cancelled;
        entry.updated_ts = crate::ids::now_ns();
        let updated = entry.clone();
        drop(entry);
        self.publish_order_update(updated);
        Ok(())
    }

    fn publish_order_update(&self, order: Order) {
        self.order_update_tx.send(order);
    }

    fn spawn_fill_ingestion(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let result = {
                    let mut venue = self.venue.lock().await;
                    venue.next_fill().await
                };
                match result {
                    Ok(fill) => self.ingest_fill(fill).await,
                    Err(err) => {
                        warn!(error = %err, "oms: fill stream transport error");
                    }
                }
            }
        })
    }

    async fn ingest_fill(&self, fill: Fill) {
        self.metrics.fills_processed.inc();

        if let Some(mut order) = self.orders.get_mut(&fill.order_id) {
            let prior_filled_qty = order.filled_qty;
            let prior_avg_px = order.avg_fill_px.unwrap_or(rust_decimal::Decimal::ZERO);
            order.filled_qty += fill.qty;
            let new_status = if order.remaining_qty() <= rust_decimal::Decimal::ZERO {
                OrderStatus::Filled
            } else {
                OrderStatus::PartiallyFilled
            };
            if order.status.can_transition_to(new_status) {
                order.status = new_status;
            }
            // Running volume-weighted mean across every fill on this order,
            // not just the latest one (§8: "weighted mean of fill prices
            // equals avg_fill_px").
            order.avg_fill_px = Some((prior_avg_px * prior_filled_qty + fill.price * fill.qty) / order.filled_qty);
            order.updated_ts = fill.ts;
            let updated = order.clone();
            drop(order);
            self.publish_order_update(updated);
        } else {
            warn!(order_id = %fill.order_id, "oms: fill for unknown order, dropping");
            return;
        }

        let key = position_key(&fill.strategy_id, &fill.symbol);
        self.positions
            .entry(key)
            .or_insert_with(|| Position::flat(fill.strategy_id.clone(), fill.symbol.clone(), fill.exchange.clone()))
            .apply_fill(&fill);

        self.send_fill(fill).await;
    }

    async fn send_fill(&self, fill: Fill) {
        match self.fill_tx.try_send(fill) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(fill)) => {
                self.alerts.emit(
                    Alert::new(AlertSeverity::Critical, "fill channel full, blocking fill ingestion")
                        .with_detail("strategy_id", fill.strategy_id.clone())
                        .with_detail("order_id", fill.order_id.clone()),
                );
                if self.fill_tx.send(fill).await.is_err() {
                    warn!("oms: fill channel closed while blocked sending");
                }
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("oms: fill channel closed, dropping fill");
            }
        }
    }

    fn spawn_timeout_sweep(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let interval = self.config.order_timeout;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval.max(std::time::Duration::from_millis(100)));
            loop {
                ticker.tick().await;
                self.expire_stale_orders();
            }
        })
    }

    fn expire_stale_orders(&self) {
        let now = crate::ids::now_ns();
        let timeout_ns = self.config.order_timeout.as_nanos() as u64;
        let mut expired = Vec::new();

        for mut entry in self.orders.iter_mut() {
            if entry.is_active() && now.saturating_sub(entry.created_ts) > timeout_ns {
                entry.status = OrderStatus::Expired;
                entry.updated_ts = now;
                expired.push(entry.clone());
            }
        }

        for order in expired {
            info!(order_id = %order.id, "oms: order expired without acknowledgement");
            self.publish_order_update(order);
        }
    }
}
