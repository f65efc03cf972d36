//! Shared CLI parsing and startup plumbing for the assembling binaries.
//!
//! Each binary here wires one [`hft_core::Assembler`] around a simulated
//! venue and one registered strategy, then runs until Ctrl+C. There is no
//! HTTP/WS surface: per the core's scope, that transport belongs to an
//! outer layer this crate doesn't implement (SPEC §1, §6).

use clap::Parser;
use hft_core::config::HftConfig;
use std::sync::Arc;
use tokio::sync::Notify;

/// Common CLI arguments shared by every assembling binary.
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct CommonArgs {
    /// Symbol to trade.
    #[arg(short, long, default_value = "BTCUSDT")]
    pub symbol: String,

    /// Venue name (the simulated venue answers to any name given here).
    #[arg(long, default_value = "simulated")]
    pub venue: String,

    /// Log level.
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Emit JSON-formatted logs instead of human-readable ones.
    #[arg(long)]
    pub json_logs: bool,
}

impl CommonArgs {
    pub fn hft_config(&self) -> HftConfig {
        HftConfig {
            enabled: true,
            feeds: hft_core::config::FeedsConfig {
                venues: vec![self.venue.clone()],
                ..Default::default()
            },
            ..Default::default()
        }
    }
}

/// Installs a Ctrl+C handler that notifies `shutdown`, mirroring the
/// teacher bins' `ctrlc::set_handler` kill switch, adapted to wake an
/// async waiter instead of flipping an `AtomicBool` polled in a hot loop.
pub fn install_ctrlc_handler() -> Arc<Notify> {
    let shutdown = Arc::new(Notify::new());
    let notify = shutdown.clone();
    ctrlc::set_handler(move || {
        tracing::warn!("received Ctrl+C, initiating graceful shutdown");
        notify.notify_one();
    })
    .expect("failed to install Ctrl+C handler");
    shutdown
}
