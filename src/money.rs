// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - USD Quotes

//! Decimal USD amounts for presentation.
//!
//! Simulation and calibration stay in `f64`; a [`Usd`] is only produced at the
//! edge, rounded to whole cents, so reports never show binary-float noise.

use std::fmt;

use num_traits::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Cent-rounded USD amount backed by `rust_decimal::Decimal`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Usd(pub Decimal);

impl Usd {
    pub const CENT: Decimal = dec!(0.01);

    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Round an `f64` estimate to cents (half away from zero). `None` for
    /// NaN, infinities and magnitudes beyond `Decimal` range.
    pub fn from_f64(value: f64) -> Option<Self> {
        let d = Decimal::from_f64(value)?;
        Some(Self(d.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)))
    }

    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// At least one cent.
    pub fn is_quotable(&self) -> bool {
        self.0 >= Self::CENT
    }
}

impl fmt::Display for Usd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:.2}", self.0)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_to_cents() {
        assert_eq!(Usd::from_f64(12.3456).unwrap().0, dec!(12.35));
        assert_eq!(Usd::from_f64(0.004).unwrap(), Usd::zero());
        assert_eq!(Usd::from_f64(95.0).unwrap().to_string(), "$95.00");
    }

    #[test]
    fn rejects_non_finite() {
        assert!(Usd::from_f64(f64::NAN).is_none());
        assert!(Usd::from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn quotable_threshold() {
        assert!(!Usd::zero().is_quotable());
        assert!(Usd::from_f64(0.01).unwrap().is_quotable());
        assert!(!Usd::from_f64(0.004).unwrap().is_quotable());
        assert!((Usd::from_f64(0.75).unwrap().to_f64() - 0.75).abs() < 1e-12);
    }
}
