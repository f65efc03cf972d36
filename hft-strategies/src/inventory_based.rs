//! Inventory-based market making strategy, after Avellaneda-Stoikov.
//!
//! The teacher's version of this strategy (`bog-strategies::inventory_based`)
//! was a zero-sized stub: its own doc comment named the formula
//! (`skew = risk_aversion * (current - target) * volatility^2 * time_horizon`)
//! but left it unimplemented, quoting a flat 10bps spread instead. This
//! version carries out that formula over `Decimal`, tracking the
//! strategy's own position (fed back through `on_fill`) rather than the
//! stub's hardcoded neutral inventory.

use crate::volatility::decimal_sqrt;
use hft_core::engine::strategy::Strategy;
use hft_core::ids;
use hft_core::types::{Fill, Order, OrderBook, Side, StrategyMetrics, Signal, Tick};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Runtime configuration for [`InventoryBased`], replacing the teacher's
/// Cargo-feature-selected constants.
#[derive(Debug, Clone)]
pub struct InventoryBasedConfig {
    /// Inventory the strategy steers towards; skew is zero here.
    pub target_inventory: Decimal,
    /// Risk aversion (gamma in Avellaneda-Stoikov); higher skews harder
    /// away from the target and quotes wider.
    pub risk_aversion: Decimal,
    pub order_size: Decimal,
    /// Estimate of per-second volatility, in basis points.
    pub volatility_bps_per_sec: Decimal,
    pub time_horizon_secs: Decimal,
    pub max_position: Decimal,
    pub max_short: Decimal,
    pub min_valid_price: Decimal,
    pub max_valid_price: Decimal,
}

impl Default for InventoryBasedConfig {
    fn default() -> Self {
        Self {
            target_inventory: Decimal::ZERO,
            risk_aversion: dec!(0.1),
            order_size: dec!(0.1),
            volatility_bps_per_sec: dec!(5),
            time_horizon_secs: dec!(60),
            max_position: dec!(1),
            max_short: dec!(1),
            min_valid_price: dec!(1),
            max_valid_price: dec!(1_000_000),
        }
    }
}

/// Avellaneda-Stoikov inventory-aware market maker.
pub struct InventoryBased {
    id: String,
    name: String,
    strategy_type: &'static str,
    symbols: Vec<String>,
    config: InventoryBasedConfig,
    position_qty: Decimal,
    metrics: StrategyMetrics,
}

impl InventoryBased {
    pub fn new(id: impl Into<String>, symbols: Vec<String>, config: InventoryBasedConfig) -> Self {
        Self {
            id: id.into(),
            name: "InventoryBased".to_string(),
            strategy_type: "inventory_based",
            symbols,
            config,
            position_qty: Decimal::ZERO,
            metrics: StrategyMetrics::default(),
        }
    }

    /// `skew = risk_aversion * (current - target) * volatility^2 *
    /// time_horizon`, converted from a raw skew magnitude into a basis-point
    /// adjustment against `mid`. Positive skew (long, above target) lowers
    /// the reservation price to encourage selling back to target.
    fn reservation_price(&self, mid: Decimal) -> Decimal {
        let inventory_delta = self.position_qty - self.config.target_inventory;
        if inventory_delta.is_zero() {
            return mid;
        }
        let vol_sq = self.config.volatility_bps_per_sec * self.config.volatility_bps_per_sec;
        let skew_bps = self.config.risk_aversion * inventory_delta * vol_sq * self.config.time_horizon_secs;
        mid - mid * skew_bps / dec!(10_000)
    }

    /// `spread = volatility * sqrt(time_horizon)`, the Avellaneda-Stoikov
    /// optimal half-spread before the inventory term (which is already
    /// folded into the reservation price above).
    fn half_spread(&self, reservation_price: Decimal) -> Decimal {
        let spread_bps = self.config.volatility_bps_per_sec * decimal_sqrt(self.config.time_horizon_secs);
        reservation_price * spread_bps / dec!(20_000)
    }

    fn is_price_valid(&self, price: Decimal) -> bool {
        price >= self.config.min_valid_price && price <= self.config.max_valid_price
    }
}

impl Strategy for InventoryBased {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn strategy_type(&self) -> &str {
        self.strategy_type
    }

    fn symbols(&self) -> &[String] {
        &self.symbols
    }

    fn on_tick(&mut self, _tick: &Tick) -> Vec<Signal> {
        self.metrics.ticks_processed += 1;
        Vec::new()
    }

    fn on_order_book(&mut self, book: &OrderBook) -> Vec<Signal> {
        if !book.is_valid() {
            return Vec::new();
        }
        let (Some(bid), Some(ask)) = (book.best_bid(), book.best_ask()) else {
            return Vec::new();
        };
        if !self.is_price_valid(bid) || !self.is_price_valid(ask) {
            return Vec::new();
        }
        let Some(mid) = book.mid_price() else {
            return Vec::new();
        };

        let reservation = self.reservation_price(mid);
        let half_spread = self.half_spread(reservation);
        let our_bid = (reservation - half_spread).max(dec!(0.00000001));
        let our_ask = reservation + half_spread;

        if our_bid <= Decimal::ZERO || our_ask <= our_bid {
            return Vec::new();
        }
        if !self.is_price_valid(our_bid) || !self.is_price_valid(our_ask) {
            return Vec::new();
        }

        let at_max_long = self.position_qty >= self.config.max_position;
        let at_max_short = self.position_qty <= -self.config.max_short;

        let mut signals = Vec::new();
        if !at_max_long {
            signals.push(Signal {
                id: ids::generate("sig"),
                strategy_id: self.id.clone(),
                symbol: book.symbol.clone(),
                exchange: book.exchange.clone(),
                side: Side::Buy,
                qty: self.config.order_size,
                price: our_bid,
                strength: 1.0,
                confidence: 1.0,
                ts: book.ts,
                executed: false,
            });
        }
        if !at_max_short {
            signals.push(Signal {
                id: ids::generate("sig"),
                strategy_id: self.id.clone(),
                symbol: book.symbol.clone(),
                exchange: book.exchange.clone(),
                side: Side::Sell,
                qty: self.config.order_size,
                price: our_ask,
                strength: 1.0,
                confidence: 1.0,
                ts: book.ts,
                executed: false,
            });
        }
        self.metrics.signals_emitted += signals.len() as u64;
        signals
    }

    fn on_fill(&mut self, fill: &Fill) {
        self.metrics.fills_processed += 1;
        self.position_qty += fill.signed_qty();
    }

    fn on_order_update(&mut self, _order: &Order) {
        self.metrics.order_updates_processed += 1;
    }

    fn get_metrics(&self) -> StrategyMetrics {
        self.metrics.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hft_core::types::Side as TSide;

    fn book() -> OrderBook {
        OrderBook {
            symbol: "BTCUSDT".into(),
            exchange: "test".into(),
            bids: vec![(dec!(50_000), dec!(1))],
            asks: vec![(dec!(50_010), dec!(1))],
            seq: 1,
            ts: 1,
        }
    }

    fn strategy() -> InventoryBased {
        InventoryBased::new("s1", vec!["BTCUSDT".into()], InventoryBasedConfig::default())
    }

    #[test]
    fn flat_inventory_quotes_symmetric_around_mid() {
        let mut s = strategy();
        let signals = s.on_order_book(&book());
        assert_eq!(signals.len(), 2);
        let mid = dec!(50_005);
        let bid = signals.iter().find(|sig| sig.side == TSide::Buy).unwrap().price;
        let ask = signals.iter().find(|sig| sig.side == TSide::Sell).unwrap().price;
        assert_eq!(mid - bid, ask - mid);
    }

    #[test]
    fn long_inventory_lowers_reservation_price() {
        let flat_mid_reservation = strategy().reservation_price(dec!(50_005));
        let mut long = strategy();
        long.position_qty = dec!(0.5);
        let long_reservation = long.reservation_price(dec!(50_005));
        assert!(long_reservation < flat_mid_reservation);
    }

    #[test]
    fn short_inventory_raises_reservation_price() {
        let flat_mid_reservation = strategy().reservation_price(dec!(50_005));
        let mut short = strategy();
        short.position_qty = dec!(-0.5);
        let short_reservation = short.reservation_price(dec!(50_005));
        assert!(short_reservation > flat_mid_reservation);
    }

    #[test]
    fn at_max_long_only_quotes_ask() {
        let mut s = strategy();
        s.position_qty = s.config.max_position;
        let signals = s.on_order_book(&book());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, TSide::Sell);
    }

    #[test]
    fn at_max_short_only_quotes_bid() {
        let mut s = strategy();
        s.position_qty = -s.config.max_short;
        let signals = s.on_order_book(&book());
        assert_eq!(signals.len(), 1);
        assert_eq!(signals[0].side, TSide::Buy);
    }

    #[test]
    fn fill_updates_position() {
        let mut s = strategy();
        s.on_fill(&Fill {
            id: "f1".into(),
            order_id: "o1".into(),
            strategy_id: "s1".into(),
            symbol: "BTCUSDT".into(),
            exchange: "test".into(),
            side: TSide::Sell,
            qty: dec!(0.2),
            price: dec!(50_000),
            fee: Decimal::ZERO,
            fee_asset: "USDT".into(),
            ts: 1,
        });
        assert_eq!(s.position_qty, dec!(-0.2));
    }
}
