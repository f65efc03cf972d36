//! Runtime configuration for the HFT core.
//!
//! Mirrors the teacher crate's `config::types` shapes (plain `serde`
//! structs with `Default` impls and a `validate()` pass) but drops the
//! compile-time Cargo-feature tier: this core's limits are genuinely
//! runtime values (per strategy, per deployment), not hot-path constants,
//! so there's nothing to gain from const-propagating them.

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Feeds configuration: venues, buffer sizes, reconnection behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedsConfig {
    pub venues: Vec<String>,
    pub tick_buffer_size: usize,
    pub book_buffer_size: usize,
    /// No event observed from a venue within this window flips `health()` false.
    pub liveness_window: Duration,
    pub reconnect_initial_delay: Duration,
    pub reconnect_max_delay: Duration,
    pub reconnect_multiplier: f64,
}

impl Default for FeedsConfig {
    fn default() -> Self {
        Self {
            venues: vec!["simulated".to_string()],
            tick_buffer_size: 64 * 1024,
            book_buffer_size: 4 * 1024,
            liveness_window: Duration::from_secs(5),
            reconnect_initial_delay: Duration::from_millis(100),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_multiplier: 2.0,
        }
    }
}

/// OMS configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OmsConfig {
    pub max_orders_per_second: u64,
    pub order_timeout: Duration,
    pub fill_channel_capacity: usize,
    pub order_update_channel_capacity: usize,
    pub retry_attempts: u32,
}

impl Default for OmsConfig {
    fn default() -> Self {
        Self {
            max_orders_per_second: 50,
            order_timeout: Duration::from_secs(10),
            fill_channel_capacity: 4096,
            order_update_channel_capacity: 4096,
            retry_attempts: 3,
        }
    }
}

/// Engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub max_strategies: usize,
    pub signal_buffer_size: usize,
    pub execution_timeout: Duration,
    pub performance_window: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_strategies: 64,
            signal_buffer_size: 1024,
            execution_timeout: Duration::from_millis(50),
            performance_window: Duration::from_secs(60),
        }
    }
}

/// Risk configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_daily_loss: Decimal,
    pub max_drawdown: Decimal,
    pub max_position_size: Decimal,
    pub max_exposure: Decimal,
    pub check_interval: Duration,
    pub violation_threshold: u32,
    /// Order price must be within this fraction of the last known tick
    /// price to pass the sanity check (e.g. 0.2 = 20%).
    pub sanity_price_band: Decimal,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_daily_loss: Decimal::from(1_000),
            max_drawdown: Decimal::from(2_000),
            max_position_size: Decimal::from(10),
            max_exposure: Decimal::from(100_000),
            check_interval: Duration::from_secs(5),
            violation_threshold: 5,
            sanity_price_band: Decimal::new(20, 2),
        }
    }
}

/// Top-level configuration for the HFT core. HFT is off by default; the
/// embedding application must construct this explicitly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HftConfig {
    pub enabled: bool,
    pub feeds: FeedsConfig,
    pub oms: OmsConfig,
    pub engine: EngineConfig,
    pub risk: RiskConfig,
}

impl HftConfig {
    pub fn validate(&self) -> Result<()> {
        if self.feeds.venues.is_empty() {
            bail!("feeds.venues must not be empty");
        }
        if self.oms.max_orders_per_second == 0 {
            bail!("oms.max_orders_per_second must be positive");
        }
        if self.risk.max_position_size <= Decimal::ZERO {
            bail!("risk.max_position_size must be positive");
        }
        if self.risk.max_exposure <= Decimal::ZERO {
            bail!("risk.max_exposure must be positive");
        }
        if self.risk.violation_threshold == 0 {
            bail!("risk.violation_threshold must be positive");
        }
        Ok(())
    }
}
