//! Feeds: market-data ingestion and fan-out (§4.1).
//!
//! Feeds owns one task per venue, each driving a [`connector::VenueConnector`]
//! through an [`backoff::ExponentialBackoff`] reconnect loop and a
//! [`gap_detector::GapDetector`] per (venue, symbol) order-book stream.
//! Normalised events fan out to every matching subscriber over a
//! [`crate::channel`] drop-oldest channel, so one slow strategy can never
//! stall ingestion for the rest of the system.

pub mod backoff;
pub mod connector;
pub mod gap_detector;

use crate::channel::{drop_oldest_channel, DropOldestReceiver, DropOldestSender};
use crate::config::FeedsConfig;
use crate::monitoring::{Alert, AlertSeverity, AlertSink, FeedsMetrics};
use crate::types::{OrderBook, Tick};
use backoff::{BackoffConfig, ExponentialBackoff};
use connector::{VenueConnector, VenueEvent};
use dashmap::DashMap;
use gap_detector::GapDetector;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

struct Subscription<T> {
    symbols: Option<HashSet<String>>,
    sender: DropOldestSender<T>,
}

impl<T> Subscription<T> {
    fn wants(&self, symbol: &str) -> bool {
        match &self.symbols {
            Some(set) => set.contains(symbol),
            None => true,
        }
    }
}

/// Market-data ingestion and fan-out component.
pub struct Feeds {
    config: FeedsConfig,
    metrics: Arc<FeedsMetrics>,
    alerts: Arc<dyn AlertSink>,
    tick_subs: Arc<std::sync::Mutex<Vec<Subscription<Tick>>>>,
    book_subs: Arc<std::sync::Mutex<Vec<Subscription<OrderBook>>>>,
    last_event_ns: Arc<DashMap<String, AtomicU64>>,
    tasks: AsyncMutex<Vec<JoinHandle<()>>>,
}

impl Feeds {
    pub fn new(config: FeedsConfig, metrics: Arc<FeedsMetrics>, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            config,
            metrics,
            alerts,
            tick_subs: Arc::new(std::sync::Mutex::new(Vec::new())),
            book_subs: Arc::new(std::sync::Mutex::new(Vec::new())),
            last_event_ns: Arc::new(DashMap::new()),
            tasks: AsyncMutex::new(Vec::new()),
        }
    }

    /// Subscribes to trade ticks. An empty `symbols` subscribes to all
    /// symbols seen across every venue. Backed by a bounded drop-oldest
    /// channel sized by `FeedsConfig::tick_buffer_size`.
    pub fn subscribe_ticks(&self, symbols: Vec<String>) -> DropOldestReceiver<Tick> {
        let (tx, rx) = drop_oldest_channel(self.config.tick_buffer_size);
        let symbols = if symbols.is_empty() {
            None
        } else {
            Some(symbols.into_iter().collect())
        };
        self.tick_subs
            .lock()
            .unwrap()
            .push(Subscription { symbols, sender: tx });
        rx
    }

    /// Subscribes to order book updates, same symbol-filter semantics as
    /// [`Feeds::subscribe_ticks`].
    pub fn subscribe_orderbook(&self, symbols: Vec<String>) -> DropOldestReceiver<OrderBook> {
        let (tx, rx) = drop_oldest_channel(self.config.book_buffer_size);
        let symbols = if symbols.is_empty() {
            None
        } else {
            Some(symbols.into_iter().collect())
        };
        self.book_subs
            .lock()
            .unwrap()
            .push(Subscription { symbols, sender: tx });
        rx
    }

    /// Spawns the ingestion task for one venue connector. The task runs
    /// until the connector is dropped or the process exits; transport
    /// failures reconnect through [`ExponentialBackoff`] rather than ending
    /// the task.
    pub async fn spawn_venue(&self, connector: impl VenueConnector + 'static) {
        let venue = connector.venue().to_string();
        let backoff_config = BackoffConfig {
            initial_delay: self.config.reconnect_initial_delay,
            max_delay: self.config.reconnect_max_delay,
            multiplier: self.config.reconnect_multiplier,
            max_retries: None,
            jitter_factor: 0.2,
        };

        let metrics = self.metrics.clone();
        let alerts = self.alerts.clone();
        let tick_subs = self.tick_subs.clone();
        let book_subs = self.book_subs.clone();
        let last_event_ns = self.last_event_ns.clone();

        let handle = tokio::spawn(run_venue(
            connector,
            backoff_config,
            metrics,
            alerts,
            tick_subs,
            book_subs,
            last_event_ns,
        ));

        self.tasks.lock().await.push(handle);
        info!(venue, "feeds: venue task spawned");
    }

    /// True iff every venue that has ever produced an event has produced one
    /// within `FeedsConfig::liveness_window`. A venue that has never
    /// connected does not count against liveness (it may still be in its
    /// first backoff cycle).
    pub fn health(&self) -> bool {
        let now = crate::ids::now_ns();
        let window_ns = self.config.liveness_window.as_nanos() as u64;
        self.last_event_ns
            .iter()
            .all(|entry| now.saturating_sub(entry.value().load(Ordering::Relaxed)) <= window_ns)
    }

    /// Aborts every venue task. Does not wait for in-flight event dispatch
    /// to drain; callers that need a clean drain should stop producing
    /// first and poll subscriber channels until empty.
    pub async fn shutdown(&self) {
        for task in self.tasks.lock().await.drain(..) {
            task.abort();
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_venue(
    mut connector: impl VenueConnector,
    backoff_config: BackoffConfig,
    metrics: Arc<FeedsMetrics>,
    alerts: Arc<dyn AlertSink>,
    tick_subs: Arc<std::sync::Mutex<Vec<Subscription<Tick>>>>,
    book_subs: Arc<std::sync::Mutex<Vec<Subscription<OrderBook>>>>,
    last_event_ns: Arc<DashMap<String, AtomicU64>>,
) {
    let venue = connector.venue().to_string();
    let mut backoff = ExponentialBackoff::with_config(backoff_config);
    let gap_detectors: DashMap<String, GapDetector> = DashMap::new();

    loop {
        match connector.connect().await {
            Ok(()) => {
                backoff.reset();
            }
            Err(err) => {
                warn!(venue, error = %err, "feeds: connect failed, backing off");
                metrics.reconnects.inc();
                match backoff.next_delay() {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    None => {
                        alerts.emit(
                            Alert::new(AlertSeverity::Critical, "venue exhausted reconnect retries")
                                .with_detail("venue", venue.clone()),
                        );
                        return;
                    }
                }
            }
        }

        loop {
            match connector.next_event().await {
                Ok(VenueEvent::Tick(tick)) => {
                    metrics.ticks_received.inc();
                    last_event_ns.insert(venue.clone(), AtomicU64::new(crate::ids::now_ns()));
                    let mut dropped = false;
                    for sub in tick_subs.lock().unwrap().iter() {
                        if sub.wants(&tick.symbol) && sub.sender.send(tick.clone()) {
                            dropped = true;
                        }
                    }
                    if dropped {
                        metrics.ticks_dropped.inc();
                    }
                }
                Ok(VenueEvent::Book(book)) => {
                    metrics.books_received.inc();
                    last_event_ns.insert(venue.clone(), AtomicU64::new(crate::ids::now_ns()));

                    let key = format!("{}:{}", venue, book.symbol);
                    let gap = gap_detectors.entry(key).or_default().check(book.seq);
                    if gap > 0 {
                        metrics.gaps_detected.inc();
                        warn!(venue, symbol = %book.symbol, gap, "feeds: sequence gap detected");
                        alerts.emit(
                            Alert::new(AlertSeverity::Warning, "order book sequence gap")
                                .with_detail("venue", venue.clone())
                                .with_detail("symbol", book.symbol.clone())
                                .with_detail("gap", gap.to_string()),
                        );
                    }

                    let mut dropped = false;
                    for sub in book_subs.lock().unwrap().iter() {
                        if sub.wants(&book.symbol) && sub.sender.send(book.clone()) {
                            dropped = true;
                        }
                    }
                    if dropped {
                        metrics.books_dropped.inc();
                    }
                }
                Err(err) => {
                    warn!(venue, error = %err, "feeds: transport error, reconnecting");
                    metrics.reconnects.inc();
                    break;
                }
            }
        }

        match backoff.next_delay() {
            Some(delay) => tokio::time::sleep(delay).await,
            None => {
                alerts.emit(
                    Alert::new(AlertSeverity::Critical, "venue exhausted reconnect retries")
                        .with_detail("venue", venue.clone()),
                );
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monitoring::{LoggingAlertSink, MetricsRegistry};
    use connector::SimulatedVenueConnector;

    fn test_feeds() -> Feeds {
        let registry = MetricsRegistry::new().unwrap();
        let mut config = FeedsConfig::default();
        config.tick_buffer_size = 8;
        config.book_buffer_size = 8;
        config.reconnect_initial_delay = Duration::from_millis(1);
        Feeds::new(config, registry.feeds.clone(), Arc::new(LoggingAlertSink))
    }

    #[tokio::test]
    async fn delivers_ticks_to_matching_subscriber() {
        let feeds = test_feeds();
        let mut rx = feeds.subscribe_ticks(vec!["BTCUSDT".to_string()]);
        feeds
            .spawn_venue(SimulatedVenueConnector::new("sim", vec!["BTCUSDT".to_string()]))
            .await;

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("should receive an event before timing out");
        assert!(event.is_some());
        feeds.shutdown().await;
    }

    #[tokio::test]
    async fn unrelated_symbol_subscriber_receives_nothing() {
        let feeds = test_feeds();
        let mut rx = feeds.subscribe_ticks(vec!["ETHUSDT".to_string()]);
        feeds
            .spawn_venue(SimulatedVenueConnector::new("sim", vec!["BTCUSDT".to_string()]))
            .await;

        let result = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(result.is_err(), "expected a timeout, not a delivered event");
        feeds.shutdown().await;
    }

    #[tokio::test]
    async fn health_false_before_any_venue_connects() {
        let feeds = test_feeds();
        assert!(feeds.health());
    }
}
