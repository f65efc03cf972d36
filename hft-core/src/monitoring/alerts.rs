//! Alert sink for conditions that don't fit the typed channels: a blocked
//! fill channel, a venue stuck in backoff, a strategy repeatedly faulting.
//!
//! Grounded in the teacher's `monitoring::alerts::Alert`/`AlertSeverity`,
//! trimmed to what this core needs (no file-backed persistence — that's
//! the outer layer's job if it wants one).

use std::collections::HashMap;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

#[derive(Debug, Clone)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub message: String,
    pub details: HashMap<String, String>,
}

impl Alert {
    pub fn new(severity: AlertSeverity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            details: HashMap::new(),
        }
    }

    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

/// Where components send alerts that aren't shaped like a `RiskEvent`.
/// A trait so the assembler can swap in a forwarding sink (e.g. to the
/// outer layer's WebSocket hub) without this crate depending on it.
pub trait AlertSink: Send + Sync {
    fn emit(&self, alert: Alert);
}

/// Default sink: routes to `tracing` at the matching level. Sufficient for
/// local runs and tests; the assembler may substitute a richer sink.
pub struct LoggingAlertSink;

impl AlertSink for LoggingAlertSink {
    fn emit(&self, alert: Alert) {
        match alert.severity {
            AlertSeverity::Info => info!(details = ?alert.details, "{}", alert.message),
            AlertSeverity::Warning => warn!(details = ?alert.details, "{}", alert.message),
            AlertSeverity::Critical => error!(details = ?alert.details, "{}", alert.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alert_carries_details() {
        let alert = Alert::new(AlertSeverity::Critical, "fill channel blocked")
            .with_detail("strategy_id", "s1");
        assert_eq!(alert.details.get("strategy_id").map(String::as_str), Some("s1"));
    }

    #[test]
    fn logging_sink_does_not_panic() {
        let sink = LoggingAlertSink;
        sink.emit(Alert::new(AlertSeverity::Info, "test"));
    }
}
