//! Simple Spread market making strategy.
//!
//! Posts symmetric quotes around the order book mid price, widened by
//! recent volatility and skewed by current inventory. Ported from the
//! teacher's zero-sized, const-generic `SimpleSpread`: that version chose
//! `SPREAD_BPS`/`ORDER_SIZE`/fee tier at compile time via Cargo features
//! and worked in `u64` fixed-point; this one takes a [`SimpleSpreadConfig`]
//! at registration and works in `Decimal` throughout, since the host
//! engine dispatches to `Box<dyn Strategy>` rather than monomorphizing
//! over a strategy type.
//!
//! Safety checks the teacher built in are preserved: reject a quote
//! outside the valid price range, reject a market spread too tight or too
//! wide (flash crash), require minimum liquidity on both sides, and stop
//! adding new quotes once inventory hits its configured limit on either
//! side.

use crate::fees::FeeSchedule;
use crate::volatility::EwmaVolatility;
use hft_core::engine::strategy::Strategy;
use hft_core::ids;
use hft_core::types::{Fill, Order, OrderBook, Side, StrategyMetrics, Signal, Tick};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Runtime configuration for [`SimpleSpread`], replacing the teacher's
/// Cargo-feature-selected constants.
#[derive(Debug, Clone)]
pub struct SimpleSpreadConfig {
    /// Target total spread around mid, in basis points, before volatility
    /// widening. Must be `>= fees.min_profitable_spread_bps()`.
    pub spread_bps: Decimal,
    /// Floor on the observed market spread (bps) below which we don't quote.
    pub min_spread_bps: Decimal,
    /// Ceiling on the observed market spread (bps) above which we treat
    /// the market as a flash crash / bad data and stop quoting.
    pub max_spread_bps: Decimal,
    pub order_size: Decimal,
    pub min_valid_price: Decimal,
    pub max_valid_price: Decimal,
    /// Minimum resting size required on each side of the book to quote.
    pub min_size_threshold: Decimal,
    /// Maximum long inventory; beyond this only the ask side is quoted.
    pub max_position: Decimal,
    /// Maximum short inventory (positive magnitude); beyond this only
    /// the bid side is quoted.
    pub max_short: Decimal,
    pub fees: FeeSchedule,
    /// EWMA smoothing factor for the volatility tracker, in `[0, 1]`.
    pub ewma_alpha: Decimal,
    /// Market spread (bps) above which we treat the book as having
    /// gapped and cancel rather than re-quote.
    pub volatility_spike_threshold_bps: Decimal,
}

impl Default for SimpleSpreadConfig {
    fn default() -> Self {
        Self {
            spread_bps: dec!(10),
            min_spread_bps: dec!(1),
            max_spread_bps: dec!(50),
            order_size: dec!(0.1),
            min_valid_price: dec!(1),
            max_valid_price: dec!(1_000_000),
            min_size_threshold: dec!(0.001),
            max_position: dec!(1),
            max_short: dec!(1),
            fees: FeeSchedule::default(),
            ewma_alpha: dec!(0.2),
            volatility_spike_threshold_bps: dec!(100),
        }
    }
}

/// Volatility-aware fixed-spread market maker.
pub struct SimpleSpread {
    id: String,
    name: String,
    strategy_type: &'static str,
    symbols: Vec<String>,
    config: SimpleSpreadConfig,
    vol_tracker: EwmaVolatility,
    position_qty: Decimal,
    metrics: StrategyMetrics,
}

impl SimpleSpread {
    pub fn new(id: impl Into<String>, symbols: Vec<String>, config: SimpleSpreadConfig) -> anyhow::Result<Self> {
        if config.spread_bps < config.fees.min_profitable_spread_bps() {
            anyhow::bail!(
                "spread_bps {} is below the minimum profitable spread {} for this fee schedule",
                config.spread_bps,
                config.fees.min_profitable_spread_bps()
            );
        }
        let alpha = config.ewma_alpha;
        Ok(Self {
            id: id.into(),
            name: "SimpleSpread".to_string(),
            strategy_type: "simple_spread",
            symbols,
            config,
            vol_tracker: EwmaVolatility::new(alpha),
            position_qty: Decimal::ZERO,
            metrics: StrategyMetrics::default(),
        })
    }

    /// 1.0x below 10bps volatility, scaling linearly to 2.0x at 50bps and
    /// beyond. Mirrors the teacher's piecewise multiplier exactly, just in
    /// `Decimal` instead of an integer 100-scaled percentage.
    fn volatility_multiplier(&self) -> Decimal {
        let vol_bps = self.vol_tracker.volatility_bps();
        if vol_bps <= dec!(10) {
            Decimal::ONE
        } else if vol_bps >= dec!(50) {
            dec!(2)
        } else {
            Decimal::ONE + (vol_bps - dec!(10)) * dec!(0.025)
        }
    }

    /// Market-gap / liquidity-evaporation circuit breaker: when this is
    /// true we emit no signals at all, so OMS's order-timeout sweep ages
    /// out anything still resting (this crate has no standing "cancel
    /// all" signal type — see `Signal` in hft_core::types).
    fn should_cancel_orders(&self, book: &OrderBook) -> bool {
        if !book.is_valid() {
            return true;
        }
        let Some(spread_bps) = book.spread_bps() else {
            return true;
        };
        if spread_bps > self.config.volatility_spike_threshold_bps {
            return true;
        }
        let critical_liquidity = self.config.min_size_threshold * dec!(10);
        let bid_size = book.bids.first().map(|(_, q)| *q).unwrap_or(Decimal::ZERO);
        let ask_size = book.asks.first().map(|(_, q)| *q).unwrap_or(Decimal::ZERO);
        bid_size < critical_liquidity || ask_size < critical_liquidity
    }

    fn is_price_valid(&self, price: Decimal) -> bool {
        price >= self.config.min_valid_price && price <= self.config.max_valid_price
    }

    fn is_spread_valid(&self, bid: Decimal, ask: Decimal) -> bool {
        if bid <= Decimal::ZERO || ask <= bid {
            return false;
        }
        let spread_bps = (ask - bid) / bid * dec!(10_000);
        spread_bps >= self.config.min_spread_bps && spread_bps <= self.config.max_spread_bps
    }

    fn is_liquidity_sufficient(&self, book: &OrderBook) -> bool {
        let bid_size = book.bids.first().map(|(_, q)| *q).unwrap_or(Decimal::ZERO);
        let ask_size = book.asks.first().map(|(_, q)| *q).unwrap_or(Decimal::ZERO);
        bid_size >= self.config.min_size_threshold && ask_size >= self.config.min_size_threshold
    }

    /// Base quotes around `mid`, widened by the current volatility
    /// multiplier. Overflow isn't a concern under `Decimal` the way it
    /// was under the teacher's `u64` fixed point, but the formula is
    /// unchanged: `half_spread = mid * spread_bps * vol_multiplier / 20_000`.
    fn base_quotes(&self, mid: Decimal) -> (Decimal, Decimal) {
        let half_spread = mid * self.config.spread_bps * self.volatility_multiplier() / dec!(20_000);
        ((mid - half_spread).max(dec!(0.00000001)), mid + half_spread)
    }

    /// Avellaneda-Stoikov-style inventory skew: a long position lowers
    /// both bid and ask to encourage selling down to flat; a short
    /// position raises both to encourage buying back to flat.
    fn apply_inventory_skew(&self, bid: Decimal, ask: Decimal, mid: Decimal) -> (Decimal, Decimal) {
        if self.position_qty.is_zero() || self.config.max_position.is_zero() {
            return (bid, ask);
        }
        let inventory_ratio = if self.position_qty > Decimal::ZERO {
            self.position_qty / self.config.max_position
        } else {
            self.position_qty / self.config.max_short
        };
        let skew = mid * self.config.spread_bps / dec!(10_000) * inventory_ratio;
        (bid - skew, ask - skew)
    }

    fn quote_signals(&mut self, symbol: &str, exchange: &str, bid: Decimal, ask: Decimal, now: u64) -> Vec<Signal> {
        let mut signals = Vec::new();
        let at_max_long = self.position_qty >= self.config.max_position;
        let at_max_short = self.position_qty <= -self.config.max_short;

        if !at_max_long {
            signals.push(Signal {
                id: ids::generate("sig"),
                strategy_id: self.id.clone(),
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
                side: Side::Buy,
                qty: self.config.order_size,
                price: bid,
                strength: 1.0,
                confidence: 1.0,
                ts: now,
                executed: false,
            });
        }
        if !at_max_short {
            signals.push(Signal {
                id: ids::generate("sig"),
                strategy_id: self.id.clone(),
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
                side: Side::Sell,
                qty: self.config.order_size,
                price: ask,
                strength: 1.0,
                confidence: 1.0,
                ts: now,
                executed: false,
            });
        }
        self.metrics.signals_emitted += signals.len() as u64;
        signals
    }
}

impl Strategy for SimpleSpread {
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

    fn on_start(&mut self) {
        self.vol_tracker.reset();
    }

    fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
        self.metrics.ticks_processed += 1;
        self.vol_tracker.add_price(tick.price);
        Vec::new()
    }

    fn on_order_book(&mut self, book: &OrderBook) -> Vec<Signal> {
        if self.should_cancel_orders(book) {
            return Vec::new();
        }

        let (Some(best_bid), Some(best_ask)) = (book.best_bid(), book.best_ask()) else {
            return Vec::new();
        };
        if !self.is_price_valid(best_bid) || !self.is_price_valid(best_ask) {
            return Vec::new();
        }
        if !self.is_spread_valid(best_bid, best_ask) {
            return Vec::new();
        }
        if !self.is_liquidity_sufficient(book) {
            return Vec::new();
        }

        let Some(mid) = book.mid_price() else {
            return Vec::new();
        };
        self.vol_tracker.add_price(mid);

        let (bid, ask) = self.base_quotes(mid);
        let (bid, ask) = self.apply_inventory_skew(bid, ask, mid);

        if !self.is_price_valid(bid) || !self.is_price_valid(ask) || bid <= Decimal::ZERO || ask <= bid {
            return Vec::new();
        }

        self.quote_signals(&book.symbol, &book.exchange, bid, ask, book.ts)
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
