//! Execution-venue dispatch.
//!
//! Mirrors [`crate::feeds::connector::VenueConnector`]: venue connectivity
//! is injected through a trait so this crate carries no exchange-specific
//! adapter (§1 Non-goals), using native async-fn-in-trait rather than
//! `async-trait` for the same reason Feeds does.

use crate::error::TransportError;
use crate::types::{Fill, Order, OrderStatus};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use tokio::sync::{Mutex, Notify};

/// Venue's immediate response to an order submission. A real venue adapter
/// may also emit later status changes via [`ExecutionVenue::next_fill`];
/// this only covers accept/reject at submission time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VenueAck {
    Accepted,
    Rejected { reason: String },
}

/// Abstraction over a single venue's order-execution transport.
#[allow(async_fn_in_trait)]
pub trait ExecutionVenue: Send {
    fn venue(&self) -> &str;

    /// Establishes (or re-establishes) the connection.
    async fn connect(&mut self) -> Result<(), TransportError>;

    /// Submits a new order, returning the venue's immediate accept/reject.
    async fn submit_order(&mut self, order: &Order) -> Result<VenueAck, TransportError>;

    /// Requests cancellation of a previously submitted order.
    async fn cancel_order(&mut self, order_id: &str) -> Result<(), TransportError>;

    /// Blocks until the next fill is available from this venue.
    async fn next_fill(&mut self) -> Result<Fill, TransportError>;
}

/// Deterministic in-process venue: accepts every order immediately and
/// fills it in full at the requested price, matching the teacher lineage's
/// `SimulatedExecutor` precedent (instant fills, pessimistic for maker
/// strategies, used for paper trading and tests).
pub struct SimulatedExecutionVenue {
    venue: String,
    fee_bps: Decimal,
    pending: std::sync::Arc<Mutex<VecDeque<Fill>>>,
    notify: std::sync::Arc<Notify>,
}

impl SimulatedExecutionVenue {
    pub fn new(venue: impl Into<String>) -> Self {
        Self {
            venue: venue.into(),
            fee_bps: Decimal::new(2, 1), // 0.2 bps, matches teacher's taker-fee default order of magnitude
            pending: std::sync::Arc::new(Mutex::new(VecDeque::new())),
            notify: std::sync::Arc::new(Notify::new()),
        }
    }
}

impl ExecutionVenue for SimulatedExecutionVenue {
    fn venue(&self) -> &str {
        &self.venue
    }

    async fn connect(&mut self) -> Result<(), TransportError> {
        Ok(())
    }

    async fn submit_order(&mut self, order: &Order) -> Result<VenueAck, TransportError> {
        let fill_price = order.price.unwrap_or(Decimal::ZERO);
        let fee = fill_price * order.qty * self.fee_bps / Decimal::from(10_000);
        let fill = Fill {
            id: crate::ids::generate("fill"),
            order_id: order.id.clone(),
            strategy_id: order.strategy_id.clone(),
            symbol: order.symbol.clone(),
            exchange: self.venue.clone(),
            side: order.side,
            qty: order.qty,
            price: fill_price,
            fee,
            fee_asset: "USDT".to_string(),
            ts: crate::ids::now_ns(),
        };
        self.pending.lock().await.push_back(fill);
        self.notify.notify_one();
        Ok(VenueAck::Accepted)
    }

    async fn cancel_order(&mut self, _order_id: &str) -> Result<(), TransportError> {
        // Simulated fills are instantaneous, so by the time a cancel could
        // arrive the order is already terminal; OMS treats this as a no-op
        // success the same way it treats cancelling an already-filled order.
        Ok(())
    }

    async fn next_fill(&mut self) -> Result<Fill, TransportError> {
        loop {
            if let Some(fill) = self.pending.lock().await.pop_front() {
                return Ok(fill);
            }
            self.notify.notified().await;
        }
    }
}

/// Whether a rejection at submit time should be reflected as the order
/// going straight to `Rejected` rather than `New`.
pub fn ack_to_status(ack: &VenueAck) -> OrderStatus {
    match ack {
        VenueAck::Accepted => OrderStatus::New,
        VenueAck::Rejected { .. } => OrderStatus::Rejected,
    }
}
