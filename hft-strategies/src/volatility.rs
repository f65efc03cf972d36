//! Volatility estimation used to widen or narrow a quoted spread with
//! recently realised price movement.
//!
//! Grounded on the teacher's `bog-strategies::volatility::EwmaVolatility`,
//! which tracked absolute returns in `u64` fixed-point basis points; this
//! version carries the same exponentially-weighted moving average over
//! `Decimal` so it can consume [`hft_core::types::Tick`]/`OrderBook`
//! prices directly.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Exponentially-weighted moving average of absolute returns, in basis
/// points. Gives more weight to recent observations than a plain rolling
/// window, so it adapts faster to a volatility regime change.
#[derive(Debug, Clone)]
pub struct EwmaVolatility {
    ewma_bps: Decimal,
    alpha: Decimal,
    last_price: Option<Decimal>,
    count: u32,
}

impl EwmaVolatility {
    /// `alpha` is the smoothing factor in `[0, 1]`; higher reacts faster
    /// to new observations at the cost of more noise.
    pub fn new(alpha: Decimal) -> Self {
        Self {
            ewma_bps: Decimal::ZERO,
            alpha: alpha.clamp(Decimal::ZERO, Decimal::ONE),
            last_price: None,
            count: 0,
        }
    }

    pub fn add_price(&mut self, price: Decimal) {
        let Some(last) = self.last_price else {
            self.last_price = Some(price);
            self.count = 1;
            return;
        };

        if last.is_zero() {
            self.last_price = Some(price);
            return;
        }

        let abs_return_bps = ((price - last).abs() / last) * dec!(10_000);
        self.ewma_bps = self.alpha * abs_return_bps + (Decimal::ONE - self.alpha) * self.ewma_bps;
        self.last_price = Some(price);
        self.count += 1;
    }

    pub fn volatility_bps(&self) -> Decimal {
        self.ewma_bps
    }

    /// Mirrors the teacher's threshold: five observations before the
    /// estimate is considered meaningful.
    pub fn is_ready(&self) -> bool {
        self.count >= 5
    }

    pub fn reset(&mut self) {
        self.ewma_bps = Decimal::ZERO;
        self.last_price = None;
        self.count = 0;
    }
}

/// Newton's-method square root for `Decimal`, used where the
/// Avellaneda-Stoikov spread formula needs `sqrt(time_horizon)`. Mirrors
/// the teacher's own `integer_sqrt` in this module: reach for a small
/// hand-rolled root-finder rather than converting through `f64`.
pub(crate) fn decimal_sqrt(value: Decimal) -> Decimal {
    if value <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    if value == Decimal::ONE {
        return Decimal::ONE;
    }

    let mut guess = value / dec!(2);
    for _ in 0..40 {
        if guess.is_zero() {
            break;
        }
        let next = (guess + value / guess) / dec!(2);
        if (next - guess).abs() < dec!(0.0000000001) {
            return next;
        }
        guess = next;
    }
    guess
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ewma_is_zero_on_constant_prices() {
        let mut vol = EwmaVolatility::new(dec!(0.2));
        for _ in 0..10 {
            vol.add_price(dec!(50_000));
        }
        assert_eq!(vol.volatility_bps(), Decimal::ZERO);
    }

    #[test]
    fn ewma_reacts_to_moves() {
        let mut vol = EwmaVolatility::new(dec!(0.2));
        vol.add_price(dec!(50_000));
        vol.add_price(dec!(50_500));
        vol.add_price(dec!(50_000));
        vol.add_price(dec!(50_250));
        vol.add_price(dec!(50_100));
        assert!(vol.volatility_bps() > Decimal::ZERO);
        assert!(vol.is_ready());
    }

    #[test]
    fn ewma_resets() {
        let mut vol = EwmaVolatility::new(dec!(0.2));
        vol.add_price(dec!(50_000));
        vol.add_price(dec!(51_000));
        vol.reset();
        assert_eq!(vol.volatility_bps(), Decimal::ZERO);
        assert!(!vol.is_ready());
    }

    #[test]
    fn sqrt_matches_known_values() {
        assert_eq!(decimal_sqrt(dec!(0)), dec!(0));
        assert_eq!(decimal_sqrt(dec!(4)), dec!(2));
        assert_eq!(decimal_sqrt(dec!(9)), dec!(3));
        let sixty = decimal_sqrt(dec!(60));
        assert!((sixty - dec!(7.745966692)).abs() < dec!(0.0001));
    }
}
