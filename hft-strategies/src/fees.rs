//! Fee-aware spread arithmetic.
//!
//! Grounded on the teacher's `bog-strategies::fees` module: a round-trip
//! cost in basis points (maker + taker) bounds how tight a market-making
//! spread can go before the strategy guarantees a loss. The teacher
//! expressed this in `u64` fixed-point basis points baked in at compile
//! time by Cargo features; here it is a runtime [`FeeSchedule`] value
//! built from `Decimal`, so an operator can register the same strategy
//! against venues with different fee schedules without a rebuild.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// An exchange's maker/taker fee schedule, in basis points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeeSchedule {
    pub maker_bps: Decimal,
    pub taker_bps: Decimal,
}

impl Default for FeeSchedule {
    /// Lighter DEX defaults the teacher targeted: maker rounds to 0 from
    /// 0.2bps, taker is 2bps.
    fn default() -> Self {
        Self {
            maker_bps: Decimal::ZERO,
            taker_bps: dec!(2),
        }
    }
}

impl FeeSchedule {
    pub fn round_trip_bps(&self) -> Decimal {
        self.maker_bps + self.taker_bps
    }

    /// Minimum spread (bps) a market maker can quote and still break even:
    /// paying the maker fee to post, the taker fee to exit.
    pub fn min_profitable_spread_bps(&self) -> Decimal {
        self.round_trip_bps()
    }

    pub fn fee_amount(&self, notional: Decimal, bps: Decimal) -> Decimal {
        notional * bps / dec!(10_000)
    }

    /// Symmetric bid/ask around `mid` for a total spread of `spread_bps`.
    pub fn quotes(&self, mid: Decimal, spread_bps: Decimal) -> (Decimal, Decimal) {
        let half = mid * spread_bps / dec!(20_000);
        (mid - half, mid + half)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_lighter_schedule() {
        let fees = FeeSchedule::default();
        assert_eq!(fees.round_trip_bps(), dec!(2));
        assert_eq!(fees.min_profitable_spread_bps(), dec!(2));
    }

    #[test]
    fn fee_amount_scales_with_notional() {
        let fees = FeeSchedule::default();
        let fee = fees.fee_amount(dec!(50_000), dec!(2));
        assert_eq!(fee, dec!(10));
    }

    #[test]
    fn quotes_are_symmetric_around_mid() {
        let fees = FeeSchedule::default();
        let (bid, ask) = fees.quotes(dec!(50_000), dec!(10));
        assert_eq!(bid, dec!(49987.5));
        assert_eq!(ask, dec!(50012.5));
        assert_eq!(ask - bid, dec!(25));
    }
}
