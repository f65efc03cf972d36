//! Concrete [`hft_core::Strategy`] implementations hosted by the engine.
//!
//! Ported from the teacher's zero-sized, const-generic, Cargo-feature
//! configured strategies: the capability set these implement is a trait
//! object, not a monomorphized type parameter, so the spread/size/fee
//! tiers that used to be chosen at compile time are runtime `Decimal`
//! fields supplied at construction instead.
//!
//! ## Strategies
//! - [`simple_spread::SimpleSpread`]: volatility-aware fixed-spread
//!   market making.
//! - [`inventory_based::InventoryBased`]: Avellaneda-Stoikov inventory
//!   skew and optimal spread.

pub mod fees;
pub mod inventory_based;
pub mod simple_spread;
pub mod volatility;

pub use inventory_based::{InventoryBased, InventoryBasedConfig};
pub use simple_spread::{SimpleSpread, SimpleSpreadConfig};
