//! Core data model: ticks, order books, orders, fills, positions, signals,
//! strategy status, and risk events.
//!
//! All money/quantity fields use `rust_decimal::Decimal`; all event
//! timestamps are monotonic nanoseconds. Entities are addressed by stable
//! string ids (see [`crate::ids`]), not by pointer or numeric handle.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Buy or sell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// +1 for Buy, -1 for Sell — used to sign quantity deltas.
    pub fn sign(self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => -Decimal::ONE,
        }
    }

    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

/// A single executed trade observed on a venue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub symbol: String,
    pub exchange: String,
    pub price: Decimal,
    pub qty: Decimal,
    pub side: Side,
    pub trade_id: String,
    pub exchange_ts: u64,
    pub local_ts: u64,
}

/// One price level: (price, qty).
pub type Level = (Decimal, Decimal);

/// A consistent snapshot of the resting bids/asks for an instrument at a
/// venue. Bids are sorted descending by price, asks ascending.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    pub symbol: String,
    pub exchange: String,
    pub bids: Vec<Level>,
    pub asks: Vec<Level>,
    pub seq: u64,
    pub ts: u64,
}

impl OrderBook {
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|(p, _)| *p)
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|(p, _)| *p)
    }

    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => Some((b + a) / Decimal::TWO),
            _ => None,
        }
    }

    pub fn spread_bps(&self) -> Option<Decimal> {
        let (bid, ask) = (self.best_bid()?, self.best_ask()?);
        let mid = (bid + ask) / Decimal::TWO;
        if mid.is_zero() {
            return None;
        }
        Some((ask - bid) / mid * Decimal::from(10_000))
    }

    /// True iff the book is not crossed and has at least one level per side.
    pub fn is_valid(&self) -> bool {
        match (self.best_bid(), self.best_ask()) {
            (Some(b), Some(a)) => b < a,
            _ => false,
        }
    }
}

/// Order type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
}

/// Time-in-force qualifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good-til-cancelled.
    GTC,
    /// Immediate-or-cancel.
    IOC,
    /// Fill-or-kill.
    FOK,
    /// Good for the current trading day.
    DAY,
}

/// Order status lattice. Transitions are monotonic: `New` is the only
/// entry point, `{Filled,Cancelled,Rejected,Expired}` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Cancelled,
    Rejected,
    Expired,
}

impl OrderStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Rejected | OrderStatus::Expired
        )
    }

    /// Whether `self -> next` is a legal transition along the status
    /// lattice (§3, §8: order status is monotonic).
    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        match (self, next) {
            (a, b) if a == b => true,
            (New, PartiallyFilled | Filled | Cancelled | Rejected | Expired) => true,
            (PartiallyFilled, Filled | Cancelled | Expired) => true,
            _ => false,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// A live trading instruction, post-risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub client_order_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub order_type: OrderType,
    pub qty: Decimal,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub tif: TimeInForce,
    pub status: OrderStatus,
    pub filled_qty: Decimal,
    pub avg_fill_px: Option<Decimal>,
    pub created_ts: u64,
    pub updated_ts: u64,
}

impl Order {
    pub fn remaining_qty(&self) -> Decimal {
        self.qty - self.filled_qty
    }

    pub fn is_active(&self) -> bool {
        !self.status.is_terminal()
    }
}

/// A (possibly partial) execution of an order. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Fill {
    pub id: String,
    pub order_id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub fee: Decimal,
    pub fee_asset: String,
    pub ts: u64,
}

impl Fill {
    pub fn notional(&self) -> Decimal {
        self.price * self.qty
    }

    /// Signed position delta this fill applies: positive for buys.
    pub fn signed_qty(&self) -> Decimal {
        self.side.sign() * self.qty
    }
}

/// Net signed exposure to an instrument within a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub strategy_id: String,
    pub symbol: String,
    pub exchange: String,
    pub qty: Decimal,
    pub avg_entry_px: Decimal,
    pub realised_pnl: Decimal,
    pub unrealised_pnl: Decimal,
    pub updated_ts: u64,
}

impl Position {
    pub fn flat(strategy_id: impl Into<String>, symbol: impl Into<String>, exchange: impl Into<String>) -> Self {
        Self {
            strategy_id: strategy_id.into(),
            symbol: symbol.into(),
            exchange: exchange.into(),
            qty: Decimal::ZERO,
            avg_entry_px: Decimal::ZERO,
            realised_pnl: Decimal::ZERO,
            unrealised_pnl: Decimal::ZERO,
            updated_ts: 0,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.qty.is_zero()
    }

    pub fn is_long(&self) -> bool {
        self.qty > Decimal::ZERO
    }

    pub fn is_short(&self) -> bool {
        self.qty < Decimal::ZERO
    }

    /// Notional exposure: |qty| * avg_entry_px.
    pub fn notional_exposure(&self) -> Decimal {
        self.qty.abs() * self.avg_entry_px
    }

    pub fn recompute_unrealised(&mut self, market_price: Decimal) {
        self.unrealised_pnl = (market_price - self.avg_entry_px) * self.qty;
    }

    pub fn total_pnl(&self) -> Decimal {
        self.realised_pnl + self.unrealised_pnl
    }

    /// Apply a fill to this position using volume-weighted-average
    /// accounting: the portion that reduces absolute exposure realises P&L
    /// against the current entry price; any remainder opens a new position
    /// at the fill price. Mirrors the teacher's
    /// `risk::RiskManager::update_position`.
    pub fn apply_fill(&mut self, fill: &Fill) {
        let delta = fill.signed_qty();
        let same_direction = self.qty.is_zero()
            || (self.qty > Decimal::ZERO) == (delta > Decimal::ZERO);

        if same_direction {
            let new_qty = self.qty + delta;
            if !new_qty.is_zero() {
                self.avg_entry_px =
                    (self.avg_entry_px * self.qty.abs() + fill.price * delta.abs()) / new_qty.abs();
            }
            self.qty = new_qty;
        } else {
            let closing_qty = delta.abs().min(self.qty.abs());
            let realised = (fill.price - self.avg_entry_px) * closing_qty * self.qty.signum();
            self.realised_pnl += realised;

            let remainder = delta.abs() - closing_qty;
            self.qty += delta;
            if self.qty.is_zero() {
                self.avg_entry_px = Decimal::ZERO;
            } else if remainder > Decimal::ZERO {
                // Position flipped sides; the remainder opens fresh at the fill price.
                self.avg_entry_px = fill.price;
            }
        }

        self.realised_pnl -= fill.fee;
        self.updated_ts = fill.ts;
    }
}

/// A strategy's intent to trade, pre-risk. Immutable once emitted; the
/// assembler hands a copy with `executed=true` to observers once the
/// signal results in a placed order (see SPEC_FULL §9.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Signal {
    pub id: String,
    pub strategy_id: String,
    pub symbol: String,
    pub exchange: String,
    pub side: Side,
    pub qty: Decimal,
    pub price: Decimal,
    pub strength: f64,
    pub confidence: f64,
    pub ts: u64,
    pub executed: bool,
}

/// Strategy lifecycle state machine: `Stopped -> Starting -> Running ->
/// Stopping -> Stopped`, plus `Running -> Faulted` (terminal until reset).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyStatus {
    Stopped,
    Starting,
    Running,
    Stopping,
    Faulted,
}

impl StrategyStatus {
    pub fn can_transition_to(self, next: StrategyStatus) -> bool {
        use StrategyStatus::*;
        matches!(
            (self, next),
            (Stopped, Starting)
                | (Starting, Running)
                | (Running, Stopping)
                | (Stopping, Stopped)
                | (Running, Faulted)
                | (Faulted, Stopped)
        )
    }
}

impl fmt::Display for StrategyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Per-strategy counters surfaced through `Strategy::get_metrics`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StrategyMetrics {
    pub signals_emitted: u64,
    pub ticks_processed: u64,
    pub order_updates_processed: u64,
    pub fills_processed: u64,
}

/// Read-only summary of a registered strategy, as exposed by Engine's
/// registry and the (out-of-scope) `/hft/strategies` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySummary {
    pub id: String,
    pub name: String,
    pub strategy_type: String,
    pub status: StrategyStatus,
    pub healthy: bool,
    pub metrics: StrategyMetrics,
}

/// Severity of a [`RiskEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RiskSeverity {
    Info,
    Warn,
    Critical,
}

/// Corrective action a [`RiskEvent`] recommends to the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskAction {
    BlockOrder,
    ReduceExposure,
    StopStrategy,
    Alert,
}

/// Emitted by Risk on a validation failure or periodic audit finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskEvent {
    pub id: String,
    pub event_type: String,
    pub severity: RiskSeverity,
    pub strategy_id: Option<String>,
    pub action: RiskAction,
    pub description: String,
    pub ts: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn fill(side: Side, qty: Decimal, price: Decimal) -> Fill {
        Fill {
            id: "f1".into(),
            order_id: "o1".into(),
            strategy_id: "s1".into(),
            symbol: "BTCUSDT".into(),
            exchange: "test".into(),
            side,
            qty,
            price,
            fee: Decimal::ZERO,
            fee_asset: "USDT".into(),
            ts: 1,
        }
    }

    #[test]
    fn position_opens_and_vwaps() {
        let mut pos = Position::flat("s1", "BTCUSDT", "test");
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(100)));
        assert_eq!(pos.qty, dec!(1));
        assert_eq!(pos.avg_entry_px, dec!(100));

        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(200)));
        assert_eq!(pos.qty, dec!(2));
        assert_eq!(pos.avg_entry_px, dec!(150));
    }

    #[test]
    fn position_realises_pnl_on_close() {
        let mut pos = Position::flat("s1", "BTCUSDT", "test");
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(100)));
        pos.apply_fill(&fill(Side::Sell, dec!(1), dec!(110)));
        assert!(pos.is_flat());
        assert_eq!(pos.realised_pnl, dec!(10));
    }

    #[test]
    fn position_flips_sides() {
        let mut pos = Position::flat("s1", "BTCUSDT", "test");
        pos.apply_fill(&fill(Side::Buy, dec!(1), dec!(100)));
        pos.apply_fill(&fill(Side::Sell, dec!(2), dec!(110)));
        assert_eq!(pos.qty, dec!(-1));
        assert_eq!(pos.avg_entry_px, dec!(110));
        assert_eq!(pos.realised_pnl, dec!(10));
    }

    #[test]
    fn order_status_is_monotonic() {
        assert!(OrderStatus::New.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(OrderStatus::PartiallyFilled.can_transition_to(OrderStatus::Filled));
        assert!(!OrderStatus::Filled.can_transition_to(OrderStatus::PartiallyFilled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::New));
    }

    #[test]
    fn strategy_status_lifecycle() {
        assert!(StrategyStatus::Stopped.can_transition_to(StrategyStatus::Starting));
        assert!(StrategyStatus::Running.can_transition_to(StrategyStatus::Faulted));
        assert!(!StrategyStatus::Stopped.can_transition_to(StrategyStatus::Running));
    }

    #[test]
    fn order_book_mid_and_spread() {
        let book = OrderBook {
            symbol: "BTCUSDT".into(),
            exchange: "test".into(),
            bids: vec![(dec!(100), dec!(1))],
            asks: vec![(dec!(101), dec!(1))],
            seq: 1,
            ts: 1,
        };
        assert_eq!(book.mid_price(), Some(dec!(100.5)));
        assert!(book.is_valid());
    }
}
