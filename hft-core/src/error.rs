//! Error taxonomy for the HFT core.
//!
//! Each kind gets its own small enum with a manual `Display`/`std::error::Error`
//! impl and a stable `code()`, matching the teacher crate's convention of
//! hand-written error enums composed into `anyhow::Result` at call sites
//! rather than `thiserror` derives.

use std::fmt;

/// Failure to reach or maintain a venue connection. Always retried with
/// backoff by Feeds/OMS; never surfaced to a strategy directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    ConnectFailed { venue: String, reason: String },
    Disconnected { venue: String },
    Timeout { venue: String },
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::ConnectFailed { venue, reason } => {
                write!(f, "failed to connect to {venue}: {reason}")
            }
            TransportError::Disconnected { venue } => write!(f, "disconnected from {venue}"),
            TransportError::Timeout { venue } => write!(f, "timed out waiting on {venue}"),
        }
    }
}
impl std::error::Error for TransportError {}

/// A market-data or venue message could not be decoded. The offending
/// message is dropped and processing continues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub context: String,
    pub reason: String,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to parse {}: {}", self.context, self.reason)
    }
}
impl std::error::Error for ParseError {}

/// An order intent failed structural validation before reaching Risk or a
/// venue (e.g. non-positive quantity, missing price on a limit order).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    EmptySymbol,
    EmptyStrategy,
    NonPositiveQuantity,
    MissingPrice,
    IncompatibleTimeInForce,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::EmptySymbol => write!(f, "order symbol must not be empty"),
            ValidationError::EmptyStrategy => write!(f, "order strategy_id must not be empty"),
            ValidationError::NonPositiveQuantity => write!(f, "order quantity must be positive"),
            ValidationError::MissingPrice => {
                write!(f, "non-market order requires a price")
            }
            ValidationError::IncompatibleTimeInForce => {
                write!(f, "time-in-force is incompatible with order type")
            }
        }
    }
}
impl std::error::Error for ValidationError {}

/// `place_order` was rejected by the per-strategy token bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimited {
    pub strategy_id: String,
}

impl fmt::Display for RateLimited {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strategy {} exceeded max_orders_per_second", self.strategy_id)
    }
}
impl std::error::Error for RateLimited {}

/// A pre-trade check in `Risk::validate_order` failed. Mirrors the teacher's
/// `risk::types::RiskViolation`, extended with the notional-exposure and
/// drawdown variants this spec's rules require.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RiskViolation {
    StrategyNotRunning,
    PositionLimitExceeded { projected: String, limit: String },
    ExposureLimitExceeded { projected: String, limit: String },
    DailyLossLimitBreached { pnl: String, limit: String },
    DrawdownLimitBreached { drawdown: String, limit: String },
    OrderSanityFailed { reason: String },
}

impl fmt::Display for RiskViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskViolation::StrategyNotRunning => {
                write!(f, "strategy is not in Running state")
            }
            RiskViolation::PositionLimitExceeded { projected, limit } => write!(
                f,
                "projected position {projected} would exceed max_position_size {limit}"
            ),
            RiskViolation::ExposureLimitExceeded { projected, limit } => write!(
                f,
                "projected notional exposure {projected} would exceed max_exposure {limit}"
            ),
            RiskViolation::DailyLossLimitBreached { pnl, limit } => write!(
                f,
                "daily realised pnl {pnl} breaches max_daily_loss {limit}"
            ),
            RiskViolation::DrawdownLimitBreached { drawdown, limit } => write!(
                f,
                "drawdown {drawdown} breaches max_drawdown {limit}"
            ),
            RiskViolation::OrderSanityFailed { reason } => {
                write!(f, "order failed sanity check: {reason}")
            }
        }
    }
}
impl std::error::Error for RiskViolation {}

impl RiskViolation {
    /// Whether this violation alone always escalates to Critical/StopStrategy,
    /// per §4.4: a daily-loss or drawdown breach always does, independent of
    /// the violation-count threshold.
    pub fn always_critical(&self) -> bool {
        matches!(
            self,
            RiskViolation::DailyLossLimitBreached { .. } | RiskViolation::DrawdownLimitBreached { .. }
        )
    }
}

/// Lookup against an unknown order/strategy/position id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotFound {
    pub kind: &'static str,
    pub id: String,
}

impl fmt::Display for NotFound {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} not found", self.kind, self.id)
    }
}
impl std::error::Error for NotFound {}

/// A strategy lifecycle transition was attempted from an incompatible state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidState {
    pub id: String,
    pub from: String,
    pub requested: String,
}

impl fmt::Display for InvalidState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "strategy {} cannot go {} -> {}",
            self.id, self.from, self.requested
        )
    }
}
impl std::error::Error for InvalidState {}

/// A strategy handler panicked or exceeded `execution_timeout`. The Engine
/// transitions the strategy to Faulted and stops delivering events to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Faulted {
    pub strategy_id: String,
    pub reason: String,
}

impl fmt::Display for Faulted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "strategy {} faulted: {}", self.strategy_id, self.reason)
    }
}
impl std::error::Error for Faulted {}

/// Errors returned by `Oms::place_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaceOrderError {
    Validation(ValidationError),
    RateLimited(RateLimited),
    Risk(RiskViolation),
    Transport(TransportError),
}

impl fmt::Display for PlaceOrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlaceOrderError::Validation(e) => write!(f, "{e}"),
            PlaceOrderError::RateLimited(e) => write!(f, "{e}"),
            PlaceOrderError::Risk(e) => write!(f, "{e}"),
            PlaceOrderError::Transport(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for PlaceOrderError {}

impl PlaceOrderError {
    /// Stable machine-readable code for the (out-of-scope) HTTP layer to
    /// surface, per SPEC_FULL §7.
    pub fn code(&self) -> &'static str {
        match self {
            PlaceOrderError::Validation(_) => "validation_error",
            PlaceOrderError::RateLimited(_) => "rate_limited",
            PlaceOrderError::Risk(_) => "risk_violation",
            PlaceOrderError::Transport(_) => "transport_error",
        }
    }
}

/// Errors returned by `Oms::cancel_order`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CancelOrderError {
    NotFound(NotFound),
    Transport(TransportError),
}

impl fmt::Display for CancelOrderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CancelOrderError::NotFound(e) => write!(f, "{e}"),
            CancelOrderError::Transport(e) => write!(f, "{e}"),
        }
    }
}
impl std::error::Error for CancelOrderError {}
