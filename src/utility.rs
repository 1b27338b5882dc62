// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Attacker Utility

use crate::types::{Action, VictimState};

/// Revenue normalisation for the concave risk transform, in currency units.
pub const REVENUE_SCALE: f64 = 1000.0;

/// Expected revenue at which the detection penalty doubles.
pub const PENALTY_REVENUE_SCALE: f64 = 10_000.0;

/// Risk-adjusted utility of a single attacker action.
///
/// ```text
/// revenue   = P_success * R_expected
/// u_rev     = 1000 * (revenue / 1000)^(1 - risk_aversion)   if revenue > 0 and risk_aversion > 0
///           = revenue                                        otherwise
/// detection = detection_risk * detection_penalty * (1 + revenue / 10000)
/// utility   = u_rev - C_cost + detection
/// ```
///
/// `NoAction` is the zero reference and always evaluates to 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AttackerUtility {
    risk_aversion: f64,
    detection_penalty: f64,
}

impl AttackerUtility {
    /// `detection_penalty` is expected to be <= 0; range checks live in
    /// [`ModelConfig::validate`](crate::config::ModelConfig::validate).
    pub fn new(risk_aversion: f64, detection_penalty: f64) -> Self {
        Self { risk_aversion, detection_penalty }
    }

    pub fn risk_aversion(&self) -> f64 {
        self.risk_aversion
    }

    pub fn detection_penalty(&self) -> f64 {
        self.detection_penalty
    }

    pub fn evaluate(
        &self,
        action: Action,
        _state: &VictimState,
        p_success: f64,
        r_expected: f64,
        c_cost: f64,
        detection_risk: f64,
    ) -> f64 {
        if action.is_baseline() {
            return 0.0;
        }
        let revenue = p_success * r_expected;
        let revenue_utility = self.revenue_utility(revenue);
        let scaled_penalty = self.detection_penalty * (1.0 + revenue / PENALTY_REVENUE_SCALE);
        let detection_cost = detection_risk * scaled_penalty;
        revenue_utility - c_cost + detection_cost
    }

    /// Concave transform of expected revenue. Skipped at revenue <= 0 and at
    /// risk_aversion == 0.
    pub fn revenue_utility(&self, revenue: f64) -> f64 {
        if revenue > 0.0 && self.risk_aversion > 0.0 {
            (revenue / REVENUE_SCALE).powf(1.0 - self.risk_aversion) * REVENUE_SCALE
        } else {
            revenue
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> VictimState {
        VictimState {
            wealth: 5.0,
            defense_level: 4.0,
            sensitivity: 0.3,
            detection_capability: 0.3,
            asset_liquidity: 0.6,
        }
    }

    #[test]
    fn no_action_is_zero() {
        let u = AttackerUtility::new(0.5, -1000.0);
        assert_eq!(u.evaluate(Action::NoAction, &state(), 1.0, 1e9, 0.0, 1.0), 0.0);
        assert_eq!(u.evaluate(Action::NoAction, &state(), 0.0, 0.0, 500.0, 0.0), 0.0);
    }

    #[test]
    fn risk_neutral_uses_raw_revenue() {
        let u = AttackerUtility::new(0.0, -1000.0);
        assert_eq!(u.revenue_utility(150.0), 150.0);
        // 0.3 * 500 = 150, no detection
        assert_eq!(u.evaluate(Action::PhishEmail, &state(), 0.3, 500.0, 100.0, 0.0), 50.0);
    }

    #[test]
    fn concave_transform_at_half_risk_aversion() {
        let u = AttackerUtility::new(0.5, -1000.0);
        // sqrt(0.15) * 1000
        let expected = 0.15_f64.sqrt() * 1000.0;
        assert!((u.revenue_utility(150.0) - expected).abs() < 1e-9);
        // revenue equal to the scale is a fixed point
        assert!((u.revenue_utility(1000.0) - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn zero_revenue_skips_transform() {
        let u = AttackerUtility::new(0.5, -1000.0);
        assert_eq!(u.revenue_utility(0.0), 0.0);
        assert_eq!(u.evaluate(Action::GuessAddress, &state(), 0.0, 0.0, 25.0, 0.0), -25.0);
    }

    #[test]
    fn detection_penalty_grows_with_revenue() {
        let u = AttackerUtility::new(0.0, -1000.0);
        let small = u.evaluate(Action::ResellBulk, &state(), 1.0, 100.0, 0.0, 0.1);
        let large = u.evaluate(Action::ResellBulk, &state(), 1.0, 10_000.0, 0.0, 0.1);
        // small: 100 - 0.1 * 1000 * 1.01
        assert!((small - (100.0 - 101.0)).abs() < 1e-9, "small {}", small);
        // large: 10000 - 0.1 * 1000 * 2
        assert!((large - (10_000.0 - 200.0)).abs() < 1e-9, "large {}", large);
    }

    #[test]
    fn generic_ex_ante_utility() {
        let u = AttackerUtility::new(0.5, -1000.0);
        let v = u.evaluate(Action::GuessAddress, &state(), 0.3, 500.0, 100.0, 0.1);
        let expected = 0.15_f64.sqrt() * 1000.0 - 100.0 - 0.1 * 1000.0 * 1.015;
        assert!((v - expected).abs() < 1e-9, "{} vs {}", v, expected);
    }
}
