//! Metrics registries and the alert sink.
//!
//! Grounded in the teacher's `monitoring::metrics::MetricsRegistry`
//! (per-domain metric structs behind one `prometheus::Registry`) and
//! `monitoring::alerts::Alert`, scaled down to the four domains this core
//! actually emits into: feeds, oms, engine, risk. The Prometheus HTTP
//! exporter itself is the (out-of-scope) outer layer's concern; this core
//! only owns the registries so that layer can scrape them.

pub mod alerts;

use prometheus::{Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

pub use alerts::{Alert, AlertSeverity, AlertSink, LoggingAlertSink};

#[derive(Clone)]
pub struct FeedsMetrics {
    pub ticks_received: IntCounter,
    pub books_received: IntCounter,
    pub ticks_dropped: IntCounter,
    pub books_dropped: IntCounter,
    pub reconnects: IntCounter,
    pub parse_errors: IntCounter,
    pub gaps_detected: IntCounter,
}

impl FeedsMetrics {
    fn new(registry: &Registry) -> prometheus::Result<Self> {
        let ticks_received = IntCounter::with_opts(Opts::new(
            "feeds_ticks_received_total",
            "Total ticks received from venues",
        ))?;
        let books_received = IntCounter::with_opts(Opts::new(
            "feeds_books_received_total",
            "Total order book updates received",
        ))?;
        let ticks_dropped = IntCounter::with_opts(Opts::new(
            "feeds_ticks_dropped_total",
            "Ticks dropped due to slow subscribers",
        ))?;
        let books_dropped = IntCounter::with_opts(Opts::new(
            "feeds_books_dropped_total",
            "Order books dropped due to slow subscribers",
        ))?;
        let reconnects = IntCounter::with_opts(Opts::new(
            "feeds_reconnects_total",
            "Total venue reconnection attempts",
        ))?;
        let parse_errors = IntCounter::with_opts(Opts::new(
            "feeds_parse_errors_total",
            "Messages dropped due to parse failure",
        ))?;
        let gaps_detected = IntCounter::with_opts(Opts::new(
            "feeds_sequence_gaps_total",
            "Order book sequence gaps detected",
        ))?;

        for c in [
            &ticks_received,
            &books_received,
            &ticks_dropped,
            &books_dropped,
            &reconnects,
            &parse_errors,
            &gaps_detected,
        ] {
            registry.register(Box::new(c.clone()))?;
        }

        Ok(Self {
            ticks_received,
            books_received,
            ticks_dropped,
            books_dropped,
            reconnects,
            parse_errors,
            gaps_detected,
        })
    }
}

#[derive(Clone)]
pub struct OmsMetrics {
    pub orders_placed: IntCounter,
    pub orders_rejected: IntCounter,
    pub orders_rate_limited: IntCounter,
    pub fills_processed: IntCounter,
    pub orders_by_status: IntCounterVec,
}

impl OmsMetrics {
    fn new(registry: &Registry) -> prometheus::Result<Self> {
        let orders_placed = IntCounter::with_opts(Opts::new(
            "oms_orders_placed_total",
            "Total orders successfully placed",
        ))?;
        let orders_rejected = IntCounter::with_opts(Opts::new(
            "oms_orders_rejected_total",
            "Total orders rejected by validation or venue",
        ))?;
        let orders_rate_limited = IntCounter::with_opts(Opts::new(
            "oms_orders_rate_limited_total",
            "Total orders rejected by the per-strategy rate limiter",
        ))?;
        let fills_processed = IntCounter::with_opts(Opts::new(
            "oms_fills_processed_total",
            "Total fills processed",
        ))?;
        let orders_by_status = IntCounterVec::new(
            Opts::new("oms_orders_by_status_total", "Order status transitions"),
            &["status"],
        )?;

        registry.register(Box::new(orders_placed.clone()))?;
        registry.register(Box::new(orders_rejected.clone()))?;
        registry.register(Box::new(orders_rate_limited.clone()))?;
        registry.register(Box::new(fills_processed.clone()))?;
        registry.register(Box::new(orders_by_status.clone()))?;

        Ok(Self {
            orders_placed,
            orders_rejected,
            orders_rate_limited,
            fills_processed,
            orders_by_status,
        })
    }
}

#[derive(Clone)]
pub struct RiskMetrics {
    pub violations_total: IntCounterVec,
    pub strategies_stopped: IntCounter,
    pub active_exposure: IntGauge,
}

impl RiskMetrics {
    fn new(registry: &Registry) -> prometheus::Result<Self> {
        let violations_total = IntCounterVec::new(
            Opts::new("risk_violations_total", "Risk violations by kind"),
            &["kind"],
        )?;
        let strategies_stopped = IntCounter::with_opts(Opts::new(
            "risk_strategies_stopped_total",
            "Strategies stopped due to Critical risk events",
        ))?;
        let active_exposure = IntGauge::with_opts(Opts::new(
            "risk_active_exposure_usd",
            "Aggregate notional exposure across strategies, truncated to whole USD",
        ))?;

        registry.register(Box::new(violations_total.clone()))?;
        registry.register(Box::new(strategies_stopped.clone()))?;
        registry.register(Box::new(active_exposure.clone()))?;

        Ok(Self {
            violations_total,
            strategies_stopped,
            active_exposure,
        })
    }
}

#[derive(Clone)]
pub struct EngineMetrics {
    pub signals_emitted: IntCounter,
    pub strategies_faulted: IntCounter,
    pub dispatch_latency: Histogram,
}

impl EngineMetrics {
    fn new(registry: &Registry) -> prometheus::Result<Self> {
        let signals_emitted = IntCounter::with_opts(Opts::new(
            "engine_signals_emitted_total",
            "Total signals emitted by strategies",
        ))?;
        let strategies_faulted = IntCounter::with_opts(Opts::new(
            "engine_strategies_faulted_total",
            "Total strategy handler faults",
        ))?;
        let dispatch_latency = Histogram::with_opts(HistogramOpts::new(
            "engine_dispatch_latency_seconds",
            "Latency of dispatching one event to one strategy handler",
        ))?;

        registry.register(Box::new(signals_emitted.clone()))?;
        registry.register(Box::new(strategies_faulted.clone()))?;
        registry.register(Box::new(dispatch_latency.clone()))?;

        Ok(Self {
            signals_emitted,
            strategies_faulted,
            dispatch_latency,
        })
    }
}

/// Central registry for all HFT core metric families.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Arc<Registry>,
    pub feeds: Arc<FeedsMetrics>,
    pub oms: Arc<OmsMetrics>,
    pub risk: Arc<RiskMetrics>,
    pub engine: Arc<EngineMetrics>,
}

impl MetricsRegistry {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Arc::new(Registry::new());
        let feeds = Arc::new(FeedsMetrics::new(&registry)?);
        let oms = Arc::new(OmsMetrics::new(&registry)?);
        let risk = Arc::new(RiskMetrics::new(&registry)?);
        let engine = Arc::new(EngineMetrics::new(&registry)?);

        info!("hft metrics registry initialized");

        Ok(Self {
            registry,
            feeds,
            oms,
            risk,
            engine,
        })
    }

    /// The underlying Prometheus registry, for the outer layer's exporter.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new().expect("metric registration cannot fail with unique, well-formed names")
    }
}
