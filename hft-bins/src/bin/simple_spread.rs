//! Assembles the HFT core around a [`hft_strategies::SimpleSpread`]
//! market maker, a simulated venue connector, and a simulated execution
//! venue, then runs until Ctrl+C.

use anyhow::Result;
use clap::Parser;
use hft_bins::common::{install_ctrlc_handler, CommonArgs};
use hft_core::feeds::connector::SimulatedVenueConnector;
use hft_core::oms::venue::SimulatedExecutionVenue;
use hft_core::Assembler;
use hft_strategies::{SimpleSpread, SimpleSpreadConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CommonArgs::parse();
    hft_core::utils::init_logger(&args.log_level, args.json_logs);

    tracing::info!(symbol = %args.symbol, venue = %args.venue, "starting simple-spread assembler");

    let assembler = Assembler::new(
        args.hft_config(),
        Box::new(SimulatedExecutionVenue::new(args.venue.clone())),
    )
    .await?;

    assembler
        .spawn_venue(SimulatedVenueConnector::new(args.venue.clone(), vec![args.symbol.clone()]))
        .await;

    let strategy = SimpleSpread::new("simple-spread-1", vec![args.symbol.clone()], SimpleSpreadConfig::default())?;
    assembler.register_strategy(Box::new(strategy))?;
    assembler.start_strategy("simple-spread-1")?;

    let shutdown = install_ctrlc_handler();
    shutdown.notified().await;

    for summary in assembler.get_strategy_summaries() {
        tracing::info!(
            strategy_id = %summary.id,
            signals_emitted = summary.metrics.signals_emitted,
            ticks_processed = summary.metrics.ticks_processed,
            fills_processed = summary.metrics.fills_processed,
            "final strategy metrics"
        );
    }

    assembler.shutdown().await;
    Ok(())
}
