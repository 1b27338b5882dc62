// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Type Definitions

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ex_post::ExPostParams;
use crate::money::Usd;

// ─── Attacker Action ─────────────────────────────────────────────────────────

/// Closed attacker action taxonomy.
///
/// Wire names follow the oracle reply format (`do_nothing`, `guess_address`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[serde(rename = "do_nothing")]
    NoAction,
    GuessAddress,
    PhishEmail,
    ResellBulk,
}

impl Action {
    /// Every action, in taxonomy order. Argmax ties resolve to the earliest entry.
    pub const ALL: [Action; 4] = [
        Action::NoAction,
        Action::GuessAddress,
        Action::PhishEmail,
        Action::ResellBulk,
    ];

    pub const COUNT: usize = Self::ALL.len();

    pub fn index(&self) -> usize {
        match self {
            Self::NoAction => 0,
            Self::GuessAddress => 1,
            Self::PhishEmail => 2,
            Self::ResellBulk => 3,
        }
    }

    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::NoAction => "do_nothing",
            Self::GuessAddress => "guess_address",
            Self::PhishEmail => "phish_email",
            Self::ResellBulk => "resell_bulk",
        }
    }

    /// The zero-utility reference action, always available to the attacker.
    pub fn is_baseline(&self) -> bool {
        matches!(self, Self::NoAction)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.wire_name())
    }
}

// ─── Victim State ────────────────────────────────────────────────────────────

/// Latent victim state drawn once per trial.
///
/// `wealth` and `defense_level` live in [0, 10]; the other fields in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VictimState {
    pub wealth: f64,
    pub defense_level: f64,
    pub sensitivity: f64,
    pub detection_capability: f64,
    pub asset_liquidity: f64,
}

impl VictimState {
    pub fn is_within_bounds(&self) -> bool {
        let unit = |v: f64| (0.0..=1.0).contains(&v);
        let decile = |v: f64| (0.0..=10.0).contains(&v);
        decile(self.wealth)
            && decile(self.defense_level)
            && unit(self.sensitivity)
            && unit(self.detection_capability)
            && unit(self.asset_liquidity)
    }
}

// ─── Anchor Point ────────────────────────────────────────────────────────────

fn unknown_source() -> String {
    "unknown".to_string()
}

/// Externally curated (data_type, price, utility) calibration record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub data_type: String,
    #[serde(alias = "price")]
    pub usd_price: f64,
    #[serde(alias = "estimated_voi")]
    pub estimated_voi_utility: f64,
    #[serde(alias = "source", default = "unknown_source")]
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl AnchorPoint {
    pub fn new(data_type: &str, usd_price: f64, estimated_voi_utility: f64, source_id: &str) -> Self {
        Self {
            data_type: data_type.to_string(),
            usd_price,
            estimated_voi_utility,
            source_id: source_id.to_string(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// USD per utility unit. Utilities below 1.0 are treated as 1.0.
    pub fn scaling_factor(&self) -> f64 {
        self.usd_price / self.estimated_voi_utility.max(1.0)
    }
}

// ─── Price Flags ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceFlag {
    /// V_ex_ante was floored at zero.
    NonPositiveVoiZeroPrice,
    /// Overall confidence below 0.4.
    LowConfidenceEstimate,
    /// Signal older than 30 days.
    StaleDataSignificantDecay,
    /// No anchors were available; the 0.1 rule-of-thumb scale was applied.
    NoMarketAnchorsRuleOfThumbPricing,
}

impl PriceFlag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NonPositiveVoiZeroPrice => "non_positive_voi_zero_price",
            Self::LowConfidenceEstimate => "low_confidence_estimate",
            Self::StaleDataSignificantDecay => "stale_data_significant_decay",
            Self::NoMarketAnchorsRuleOfThumbPricing => "no_market_anchors_rule_of_thumb_pricing",
        }
    }
}

// ─── Simulation Stats ────────────────────────────────────────────────────────

/// Aggregate Monte Carlo statistics reported alongside a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationStats {
    pub n_simulations: usize,
    pub ex_ante_mean: f64,
    pub ex_ante_std: f64,
    pub ex_post_mean: f64,
    pub ex_post_std: f64,
    #[serde(rename = "V_raw")]
    pub v_raw: f64,
    pub action_counts: BTreeMap<Action, u64>,
    /// Fraction of ex-post trials in which each action was optimal.
    pub action_distribution: BTreeMap<Action, f64>,
}

// ─── Price Estimate ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provenance {
    pub n_simulations: usize,
    pub risk_aversion: f64,
    pub detection_penalty: f64,
    pub freshness_decay_lambda: f64,
    pub signal_strength: f64,
    /// Base seed of the trial streams; replaying it reproduces the simulation.
    pub seed: u64,
}

/// Terminal output of one pricing request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceEstimate {
    pub query_id: String,
    pub estimated_at: DateTime<Utc>,
    pub model_version: String,

    #[serde(rename = "V_ex_ante")]
    pub v_ex_ante: f64,
    #[serde(rename = "USD_estimate")]
    pub usd_estimate: f64,
    pub confidence: f64,

    pub ex_post_params: ExPostParams,
    pub optimal_action_ex_ante: Action,
    pub optimal_action_ex_post: Action,

    pub anchors_used: Vec<AnchorPoint>,
    pub simulation_stats: SimulationStats,
    pub flags: Vec<PriceFlag>,

    pub data_type: String,
    pub region: String,
    pub freshness_days: f64,
    pub freshness_factor: f64,

    pub provenance: Provenance,
}

impl PriceEstimate {
    pub fn has_flag(&self, flag: PriceFlag) -> bool {
        self.flags.contains(&flag)
    }

    /// `USD_estimate` rounded to cents.
    pub fn usd_quote(&self) -> Usd {
        Usd::from_f64(self.usd_estimate).unwrap_or_else(Usd::zero)
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_indices_match_taxonomy_order() {
        for (i, action) in Action::ALL.iter().enumerate() {
            assert_eq!(action.index(), i, "{} out of order", action);
        }
        assert!(Action::NoAction.is_baseline());
        assert!(!Action::ResellBulk.is_baseline());
    }

    #[test]
    fn action_wire_names_match_serde() {
        for action in Action::ALL {
            let json = serde_json::to_string(&action).unwrap();
            assert_eq!(json, format!("\"{}\"", action.wire_name()));
        }
    }

    #[test]
    fn flag_names_match_serde() {
        let flags = [
            PriceFlag::NonPositiveVoiZeroPrice,
            PriceFlag::LowConfidenceEstimate,
            PriceFlag::StaleDataSignificantDecay,
            PriceFlag::NoMarketAnchorsRuleOfThumbPricing,
        ];
        for flag in flags {
            let json = serde_json::to_string(&flag).unwrap();
            assert_eq!(json, format!("\"{}\"", flag.as_str()));
        }
    }

    #[test]
    fn anchor_accepts_reference_field_names() {
        let raw = r#"{"data_type":"fullz","price":200.0,"estimated_voi":1500.0,"source":"comparitech_2024"}"#;
        let anchor: AnchorPoint = serde_json::from_str(raw).unwrap();
        assert_eq!(anchor.usd_price, 200.0);
        assert_eq!(anchor.estimated_voi_utility, 1500.0);
        assert_eq!(anchor.source_id, "comparitech_2024");

        let bare = r#"{"data_type":"contact","usd_price":5.0,"estimated_voi_utility":50.0}"#;
        let anchor: AnchorPoint = serde_json::from_str(bare).unwrap();
        assert_eq!(anchor.source_id, "unknown");
    }

    #[test]
    fn scaling_factor_floors_utility_at_one() {
        let a = AnchorPoint::new("contact", 5.0, 0.25, "test");
        assert_eq!(a.scaling_factor(), 5.0);
        let b = AnchorPoint::new("contact", 5.0, 50.0, "test");
        assert!((b.scaling_factor() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn victim_state_bounds() {
        let ok = VictimState {
            wealth: 10.0,
            defense_level: 0.0,
            sensitivity: 0.3,
            detection_capability: 1.0,
            asset_liquidity: 0.5,
        };
        assert!(ok.is_within_bounds());
        let bad = VictimState { sensitivity: 3.0, ..ok };
        assert!(!bad.is_within_bounds());
    }
}
