//! Engine: strategy host and dispatcher (§4.3).
//!
//! Engine has no dependency on OMS or Risk — it only routes market data and
//! execution feedback to registered strategies and republishes the signals
//! they emit. Risk validation and order placement are the assembling
//! layer's job, preserving that boundary.

pub mod strategy;

use crate::channel::{drop_oldest_channel, DropOldestReceiver, DropOldestSender};
use crate::config::EngineConfig;
use crate::error::InvalidState;
use crate::monitoring::{Alert, AlertSeverity, AlertSink, EngineMetrics};
use crate::types::{Fill, Order, OrderBook, Signal, StrategyMetrics, StrategyStatus, StrategySummary, Tick};
use dashmap::DashMap;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use strategy::Strategy;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{error, info, warn};

struct StrategyEntry {
    strategy: Mutex<Box<dyn Strategy>>,
    status: Mutex<StrategyStatus>,
    name: String,
    strategy_type: String,
    symbols: Vec<String>,
}

/// Strategy host and event dispatcher.
pub struct Engine {
    config: EngineConfig,
    metrics: Arc<EngineMetrics>,
    alerts: Arc<dyn AlertSink>,
    strategies: DashMap<String, Arc<StrategyEntry>>,
    signal_tx: DropOldestSender<Signal>,
    signal_rx: AsyncMutex<Option<DropOldestReceiver<Signal>>>,
    signal_ack_tx: DropOldestSender<Signal>,
    signal_ack_rx: AsyncMutex<Option<DropOldestReceiver<Signal>>>,
}

impl Engine {
    pub fn new(config: EngineConfig, metrics: Arc<EngineMetrics>, alerts: Arc<dyn AlertSink>) -> Self {
        let (signal_tx, signal_rx) = drop_oldest_channel(config.signal_buffer_size);
        let (signal_ack_tx, signal_ack_rx) = drop_oldest_channel(config.signal_buffer_size);
        Self {
            config,
            metrics,
            alerts,
            strategies: DashMap::new(),
            signal_tx,
            signal_rx: AsyncMutex::new(Some(signal_rx)),
            signal_ack_tx,
            signal_ack_rx: AsyncMutex::new(Some(signal_ack_rx)),
        }
    }

    /// Consumes the signal receiver. Panics if called more than once — this
    /// channel has exactly one logical consumer (the assembling layer).
    pub async fn signal_channel(&self) -> DropOldestReceiver<Signal> {
        self.signal_rx.lock().await.take().expect("signal_channel already taken")
    }

    /// Consumes the acknowledgement receiver. Carries the `executed=true`
    /// copy of every signal the assembler hands to OMS, and nothing else —
    /// a signal that Risk blocks never appears here (§9.1).
    pub async fn signal_ack_channel(&self) -> DropOldestReceiver<Signal> {
        self.signal_ack_rx.lock().await.take().expect("signal_ack_channel already taken")
    }

    /// Publishes the executed acknowledgement for a signal. Called by the
    /// assembling layer once it hands the corresponding order to OMS.
    pub fn publish_ack(&self, signal: Signal) {
        self.signal_ack_tx.send(signal);
    }

    pub fn register_strategy(&self, strategy: Box<dyn Strategy>) -> Result<(), InvalidState> {
        let id = strategy.id().to_string();
        if self.strategies.contains_key(&id) {
            return Err(InvalidState {
                id,
                from: "unregistered".to_string(),
                requested: "registered".to_string(),
            });
        }
        if self.strategies.len() >= self.config.max_strategies {
            return Err(InvalidState {
                id,
                from: "unregistered".to_string(),
                requested: "registered (max_strategies reached)".to_string(),
            });
        }

        let entry = StrategyEntry {
            name: strategy.name().to_string(),
            strategy_type: strategy.strategy_type().to_string(),
            symbols: strategy.symbols().to_vec(),
            strategy: Mutex::new(strategy),
            status: Mutex::new(StrategyStatus::Stopped),
        };
        info!(strategy_id = %id, "engine: strategy registered");
        self.strategies.insert(id, Arc::new(entry));
        Ok(())
    }

    pub fn start_strategy(&self, id: &str) -> Result<(), InvalidState> {
        let entry = self.strategy_or_not_found(id)?;
        self.transition(id, &entry, StrategyStatus::Starting)?;
        entry.strategy.lock().on_start();
        self.transition(id, &entry, StrategyStatus::Running)?;
        info!(strategy_id = %id, "engine: strategy started");
        Ok(())
    }

    pub fn stop_strategy(&self, id: &str) -> Result<(), InvalidState> {
        let entry = self.strategy_or_not_found(id)?;
        self.transition(id, &entry, StrategyStatus::Stopping)?;
        entry.strategy.lock().on_stop();
        self.transition(id, &entry, StrategyStatus::Stopped)?;
        info!(strategy_id = %id, "engine: strategy stopped");
        Ok(())
    }

    /// Resets a `Faulted` strategy back to `Stopped` so it can be started
    /// again. Supplemental operation not named in the distilled spec but
    /// required for `Faulted` to be anything but a dead end (SPEC_FULL §9.1).
    pub fn reset_strategy(&self, id: &str) -> Result<(), InvalidState> {
        let entry = self.strategy_or_not_found(id)?;
        self.transition(id, &entry, StrategyStatus::Stopped)?;
        info!(strategy_id = %id, "engine: strategy reset from Faulted");
        Ok(())
    }

    fn strategy_or_not_found(&self, id: &str) -> Result<Arc<StrategyEntry>, InvalidState> {
        self.strategies.get(id).map(|e| e.clone()).ok_or_else(|| InvalidState {
            id: id.to_string(),
            from: "unknown".to_string(),
            requested: "any".to_string(),
        })
    }

    fn transition(&self, id: &str, entry: &StrategyEntry, next: StrategyStatus) -> Result<(), InvalidState> {
        let mut status = entry.status.lock();
        if !status.can_transition_to(next) {
            return Err(InvalidState {
                id: id.to_string(),
                from: format!("{status}"),
                requested: format!("{next}"),
            });
        }
        *status = next;
        Ok(())
    }

    pub fn get_strategy_summaries(&self) -> Vec<StrategySummary> {
        self.strategies
            .iter()
            .map(|entry| {
                let strategy = entry.strategy.lock();
                StrategySummary {
                    id: entry.key().clone(),
                    name: entry.name.clone(),
                    strategy_type: entry.strategy_type.clone(),
                    status: *entry.status.lock(),
                    healthy: strategy.is_healthy(),
                    metrics: strategy.get_metrics(),
                }
            })
            .collect()
    }

    pub fn ingest_tick(&self, tick: &Tick) {
        for entry in self.strategies.iter() {
            if *entry.status.lock() != StrategyStatus::Running {
                continue;
            }
            if !entry.symbols.is_empty() && !entry.symbols.iter().any(|s| s == &tick.symbol) {
                continue;
            }
            let signals = self.dispatch(entry.key(), &entry, |s| s.on_tick(tick));
            self.emit_signals(signals);
        }
    }

    pub fn ingest_order_book(&self, book: &OrderBook) {
        for entry in self.strategies.iter() {
            if *entry.status.lock() != StrategyStatus::Running {
                continue;
            }
            if !entry.symbols.is_empty() && !entry.symbols.iter().any(|s| s == &book.symbol) {
                continue;
            }
            let signals = self.dispatch(entry.key(), &entry, |s| s.on_order_book(book));
            self.emit_signals(signals);
        }
    }

    pub fn ingest_order_update(&self, order: &Order) {
        if let Some(entry) = self.strategies.get(&order.strategy_id) {
            if *entry.status.lock() == StrategyStatus::Running {
                self.dispatch(&order.strategy_id, &entry, |s| {
                    s.on_order_update(order);
                    Vec::new()
                });
            }
        }
    }

    pub fn ingest_fill(&self, fill: &Fill) {
        if let Some(entry) = self.strategies.get(&fill.strategy_id) {
            if *entry.status.lock() == StrategyStatus::Running {
                self.dispatch(&fill.strategy_id, &entry, |s| {
                    s.on_fill(fill);
                    Vec::new()
                });
            }
        }
    }

    /// Runs one handler under `catch_unwind`, timing it against
    /// `execution_timeout` for observability. A panicking handler faults
    /// the strategy and stops further delivery to it.
    fn dispatch<F>(&self, id: &str, entry: &StrategyEntry, f: F) -> Vec<Signal>
    where
        F: FnOnce(&mut dyn Strategy) -> Vec<Signal>,
    {
        let start = Instant::now();
        let mut guard = entry.strategy.lock();
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| f(&mut **guard)));
        drop(guard);
        let elapsed = start.elapsed();
        self.metrics.dispatch_latency.observe(elapsed.as_secs_f64());

        if elapsed > self.config.execution_timeout {
            warn!(strategy_id = %id, elapsed_ms = elapsed.as_millis(), "engine: handler exceeded execution_timeout");
        }

        match result {
            Ok(signals) => signals,
            Err(_) => {
                error!(strategy_id = %id, "engine: strategy handler panicked, faulting");
                self.metrics.strategies_faulted.inc();
                *entry.status.lock() = StrategyStatus::Faulted;
                self.alerts.emit(
                    Alert::new(AlertSeverity::Critical, "strategy handler panicked")
                        .with_detail("strategy_id", id.to_string()),
                );
                Vec::new()
            }
        }
    }

    fn emit_signals(&self, signals: Vec<Signal>) {
        for signal in signals {
            self.metrics.signals_emitted.inc();
            self.signal_tx.send(signal);
        }
    }

    /// Stops every strategy still `Running`. Part of the assembler's
    /// cooperative shutdown sequence (§5: Risk, Engine, OMS, Feeds).
    pub fn shutdown(&self) {
        let running: Vec<String> = self
            .strategies
            .iter()
            .filter(|e| *e.status.lock() == StrategyStatus::Running)
            .map(|e| e.key().clone())
            .collect();
        for id in running {
            if let Err(err) = self.stop_strategy(&id) {
                warn!(strategy_id = %id, error = %err, "engine: failed to stop strategy during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{LoggingAlertSink, MetricsRegistry};
    use crate::types::Side;
    use rust_decimal::Decimal;

    struct EchoStrategy {
        id: String,
        symbols: Vec<String>,
        panics: bool,
    }

    impl Strategy for EchoStrategy {
        fn id(&self) -> &str {
            &self.id
        }
        fn name(&self) -> &str {
            "echo"
        }
        fn strategy_type(&self) -> &str {
            "test"
        }
        fn symbols(&self) -> &[String] {
            &self.symbols
        }
        fn on_tick(&mut self, tick: &Tick) -> Vec<Signal> {
            if self.panics {
                panic!("boom");
            }
            vec![Signal {
                id: "sig1".into(),
                strategy_id: self.id.clone(),
                symbol: tick.symbol.clone(),
                exchange: tick.exchange.clone(),
                side: Side::Buy,
                qty: Decimal::ONE,
                price: tick.price,
                strength: 1.0,
                confidence: 1.0,
                ts: tick.local_ts,
                executed: false,
            }]
        }
    }

    fn test_engine() -> Engine {
        let registry = MetricsRegistry::new().unwrap();
        Engine::new(EngineConfig::default(), registry.engine.clone(), Arc::new(LoggingAlertSink))
    }

    fn tick() -> Tick {
        Tick {
            symbol: "BTCUSDT".into(),
            exchange: "sim".into(),
            price: Decimal::from(100),
            qty: Decimal::ONE,
            side: Side::Buy,
            trade_id: "t1".into(),
            exchange_ts: 1,
            local_ts: 1,
        }
    }

    #[tokio::test]
    async fn running_strategy_emits_a_signal_on_tick() {
        let engine = test_engine();
        engine
            .register_strategy(Box::new(EchoStrategy {
                id: "s1".into(),
                symbols: vec!["BTCUSDT".into()],
                panics: false,
            }))
            .unwrap();
        engine.start_strategy("s1").unwrap();

        let mut rx = engine.signal_channel().await;
        engine.ingest_tick(&tick());

        let signal = rx.recv().await.expect("signal should be emitted");
        assert_eq!(signal.strategy_id, "s1");
    }

    #[tokio::test]
    async fn publish_ack_is_observable_on_the_ack_channel() {
        let engine = test_engine();
        let mut acks = engine.signal_ack_channel().await;

        let mut signal = Signal {
            id: "sig1".into(),
            strategy_id: "s1".into(),
            symbol: "BTCUSDT".into(),
            exchange: "sim".into(),
            side: Side::Buy,
            qty: Decimal::ONE,
            price: Decimal::from(100),
            strength: 1.0,
            confidence: 1.0,
            ts: 1,
            executed: false,
        };
        signal.executed = true;
        engine.publish_ack(signal.clone());

        let acked = acks.recv().await.expect("ack should be published");
        assert_eq!(acked.id, signal.id);
        assert!(acked.executed, "published ack must carry executed=true");
    }

    #[tokio::test]
    async fn stopped_strategy_receives_no_events() {
        let engine = test_engine();
        engine
            .register_strategy(Box::new(EchoStrategy {
                id: "s1".into(),
                symbols: vec!["BTCUSDT".into()],
                panics: false,
            }))
            .unwrap();

        let mut rx = engine.signal_channel().await;
        engine.ingest_tick(&tick());

        let result = tokio::time::timeout(std::time::Duration::from_millis(100), rx.recv()).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn panicking_handler_faults_the_strategy() {
        let engine = test_engine();
        engine
            .register_strategy(Box::new(EchoStrategy {
                id: "s1".into(),
                symbols: vec!["BTCUSDT".into()],
                panics: true,
            }))
            .unwrap();
        engine.start_strategy("s1").unwrap();
        engine.ingest_tick(&tick());

        let summaries = engine.get_strategy_summaries();
        assert_eq!(summaries[0].status, StrategyStatus::Faulted);
    }

    #[test]
    fn invalid_transition_is_rejected() {
        let engine = test_engine();
        engine
            .register_strategy(Box::new(EchoStrategy {
                id: "s1".into(),
                symbols: vec![],
                panics: false,
            }))
            .unwrap();
        assert!(engine.stop_strategy("s1").is_err());
    }
}
