//! Strategy capability set (§4.3).
//!
//! Modelled as a plain object-safe trait rather than the teacher's
//! const-generic `engine::generic::Strategy`: strategy identity, symbol
//! universe, and limits here are runtime values supplied by an operator at
//! registration time, not compile-time constants, so monomorphization buys
//! nothing and a trait object lets Engine host an arbitrary, dynamically
//! changing set of strategies. The legacy dynamic-dispatch engine the
//! teacher deprecated in favour of the const-generic one is, in that
//! narrow respect, the closer ancestor of this design.

use crate::types::{Fill, Order, OrderBook, Signal, StrategyMetrics, Tick};

/// A trading strategy hosted by [`super::Engine`]. Handlers must not block
/// or perform I/O; any slow work must be offloaded by the implementation
/// (e.g. onto its own background task feeding back through a channel it
/// owns) — Engine dispatches on a shared async runtime and a blocking
/// handler would stall every other strategy's delivery.
pub trait Strategy: Send {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn strategy_type(&self) -> &str;

    /// Symbols this strategy wants ticks/order books for. Engine matches
    /// inbound market data against this set before dispatching.
    fn symbols(&self) -> &[String];

    /// Called on the `Stopped -> Starting -> Running` transition, before
    /// the strategy starts receiving events.
    fn on_start(&mut self) {}

    /// Called on the `Running -> Stopping -> Stopped` transition, after
    /// the strategy stops receiving events.
    fn on_stop(&mut self) {}

    fn on_tick(&mut self, _tick: &Tick) -> Vec<Signal> {
        Vec::new()
    }

    fn on_order_book(&mut self, _book: &OrderBook) -> Vec<Signal> {
        Vec::new()
    }

    fn on_order_update(&mut self, _order: &Order) {}

    fn on_fill(&mut self, _fill: &Fill) {}

    /// Self-reported health, independent of the lifecycle status Engine
    /// tracks externally (e.g. a strategy might report unhealthy if its
    /// offloaded worker thread has died without panicking the handler).
    fn is_healthy(&self) -> bool {
        true
    }

    fn get_metrics(&self) -> StrategyMetrics {
        StrategyMetrics::default()
    }
}
