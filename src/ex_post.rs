// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Ex-Post Parameter Set

//! Signal-conditioned decision parameters, one entry per attacker action.
//!
//! An [`ExPostParams`] is built once per pricing request from the oracle's
//! reply and never mutated afterwards. Every value is range-checked at
//! construction, so the Monte Carlo core can consume it without further
//! validation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::types::Action;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ParamError {
    #[error("reply is not a JSON object")]
    NotAnObject,

    #[error("no parameters for action {0}")]
    MissingAction(Action),

    #[error("{action}: missing field {field}")]
    MissingField { action: Action, field: &'static str },

    #[error("{action}: field {field} is not a number")]
    NotNumeric { action: Action, field: &'static str },

    #[error("{action}: {field} = {value} is out of range ({expected})")]
    OutOfRange {
        action: Action,
        field: &'static str,
        value: f64,
        expected: &'static str,
    },
}

// ---------------------------------------------------------------------------
// ActionParams
// ---------------------------------------------------------------------------

/// Posterior point estimates for a single action.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActionParams {
    #[serde(rename = "P_success")]
    pub p_success: f64,
    /// Revenue if the action succeeds, in currency units.
    #[serde(rename = "R_expected")]
    pub r_expected: f64,
    #[serde(rename = "C_cost")]
    pub c_cost: f64,
    pub detection_risk: f64,
}

impl ActionParams {
    pub const FIELDS: [&'static str; 4] = ["P_success", "R_expected", "C_cost", "detection_risk"];

    pub fn new(p_success: f64, r_expected: f64, c_cost: f64, detection_risk: f64) -> Self {
        Self { p_success, r_expected, c_cost, detection_risk }
    }

    /// The baseline entry: certain success, no revenue, no cost, no exposure.
    pub fn baseline() -> Self {
        Self::new(1.0, 0.0, 0.0, 0.0)
    }

    pub fn validate(&self, action: Action) -> Result<(), ParamError> {
        let probability = |field, value: f64| {
            if (0.0..=1.0).contains(&value) {
                Ok(())
            } else {
                Err(ParamError::OutOfRange { action, field, value, expected: "0 <= x <= 1" })
            }
        };
        let non_negative = |field, value: f64| {
            if value.is_finite() && value >= 0.0 {
                Ok(())
            } else {
                Err(ParamError::OutOfRange { action, field, value, expected: "finite, >= 0" })
            }
        };
        probability("P_success", self.p_success)?;
        non_negative("R_expected", self.r_expected)?;
        non_negative("C_cost", self.c_cost)?;
        probability("detection_risk", self.detection_risk)
    }
}

// ---------------------------------------------------------------------------
// ExPostParams
// ---------------------------------------------------------------------------

/// Immutable per-request map of action -> posterior parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<Action, ActionParams>",
    into = "BTreeMap<Action, ActionParams>"
)]
pub struct ExPostParams {
    entries: BTreeMap<Action, ActionParams>,
}

impl ExPostParams {
    /// Build a complete parameter set. Every action in [`Action::ALL`] must be
    /// present and range-valid.
    pub fn new(entries: BTreeMap<Action, ActionParams>) -> Result<Self, ParamError> {
        if let Some(missing) = Action::ALL.iter().find(|a| !entries.contains_key(a)) {
            return Err(ParamError::MissingAction(*missing));
        }
        Self::restricted(entries)
    }

    /// Build a parameter set over a subset of actions. Absent actions are
    /// simply unavailable to the attacker during simulation.
    pub fn restricted(entries: BTreeMap<Action, ActionParams>) -> Result<Self, ParamError> {
        for (action, params) in &entries {
            params.validate(*action)?;
        }
        Ok(Self { entries })
    }

    /// Complete set with the same parameters for every non-baseline action.
    pub fn uniform(params: ActionParams) -> Result<Self, ParamError> {
        let entries = Action::ALL
            .iter()
            .map(|&a| (a, if a.is_baseline() { ActionParams::baseline() } else { params }))
            .collect();
        Self::new(entries)
    }

    /// Parse an oracle reply of the form
    /// `{"do_nothing": {"P_success": .., "R_expected": .., "C_cost": .., "detection_risk": ..}, ...}`.
    /// Unknown keys (reasoning, metadata) are ignored.
    pub fn from_oracle_reply(reply: &Value) -> Result<Self, ParamError> {
        let obj = reply.as_object().ok_or(ParamError::NotAnObject)?;
        let mut entries = BTreeMap::new();
        for action in Action::ALL {
            let section = obj
                .get(action.wire_name())
                .ok_or(ParamError::MissingAction(action))?;
            let field = |name: &'static str| -> Result<f64, ParamError> {
                let raw = section
                    .get(name)
                    .ok_or(ParamError::MissingField { action, field: name })?;
                raw.as_f64().ok_or(ParamError::NotNumeric { action, field: name })
            };
            let params = ActionParams {
                p_success: field("P_success")?,
                r_expected: field("R_expected")?,
                c_cost: field("C_cost")?,
                detection_risk: field("detection_risk")?,
            };
            entries.insert(action, params);
        }
        Self::new(entries)
    }

    pub fn get(&self, action: Action) -> Option<&ActionParams> {
        self.entries.get(&action)
    }

    pub fn is_complete(&self) -> bool {
        Action::ALL.iter().all(|a| self.entries.contains_key(a))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Action, &ActionParams)> {
        self.entries.iter()
    }

    /// Mean `R_expected` over the present actions (0 when empty).
    pub fn average_revenue(&self) -> f64 {
        self.mean_of(|p| p.r_expected)
    }

    /// Mean `detection_risk` over the present actions (0 when empty).
    pub fn average_detection_risk(&self) -> f64 {
        self.mean_of(|p| p.detection_risk)
    }

    fn mean_of(&self, f: impl Fn(&ActionParams) -> f64) -> f64 {
        if self.entries.is_empty() {
            return 0.0;
        }
        self.entries.values().map(f).sum::<f64>() / self.entries.len() as f64
    }
}

impl TryFrom<BTreeMap<Action, ActionParams>> for ExPostParams {
    type Error = ParamError;

    fn try_from(entries: BTreeMap<Action, ActionParams>) -> Result<Self, Self::Error> {
        Self::restricted(entries)
    }
}

impl From<ExPostParams> for BTreeMap<Action, ActionParams> {
    fn from(params: ExPostParams) -> Self {
        params.entries
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply() -> Value {
        json!({
            "do_nothing": {"P_success": 1.0, "R_expected": 0.0, "C_cost": 0.0, "detection_risk": 0.0,
                           "reasoning": "Baseline action - no engagement"},
            "guess_address": {"P_success": 0.5, "R_expected": 150.0, "C_cost": 15.0, "detection_risk": 0.05},
            "phish_email": {"P_success": 0.4, "R_expected": 800.0, "C_cost": 60.0, "detection_risk": 0.25},
            "resell_bulk": {"P_success": 0.9, "R_expected": 120, "C_cost": 20.0, "detection_risk": 0.1},
            "metadata": {"target_assessment": "mid-value consumer"}
        })
    }

    #[test]
    fn parses_complete_reply() {
        let params = ExPostParams::from_oracle_reply(&reply()).unwrap();
        assert!(params.is_complete());
        let phish = params.get(Action::PhishEmail).unwrap();
        assert_eq!(phish.r_expected, 800.0);
        // integer literals are accepted as numbers
        assert_eq!(params.get(Action::ResellBulk).unwrap().r_expected, 120.0);
    }

    #[test]
    fn rejects_missing_action() {
        let mut r = reply();
        r.as_object_mut().unwrap().remove("phish_email");
        assert_eq!(
            ExPostParams::from_oracle_reply(&r),
            Err(ParamError::MissingAction(Action::PhishEmail))
        );
    }

    #[test]
    fn rejects_non_numeric_and_out_of_range() {
        let mut r = reply();
        r["guess_address"]["C_cost"] = json!("cheap");
        assert!(matches!(
            ExPostParams::from_oracle_reply(&r),
            Err(ParamError::NotNumeric { action: Action::GuessAddress, field: "C_cost" })
        ));

        let mut r = reply();
        r["resell_bulk"]["detection_risk"] = json!(1.2);
        assert!(matches!(
            ExPostParams::from_oracle_reply(&r),
            Err(ParamError::OutOfRange { action: Action::ResellBulk, field: "detection_risk", .. })
        ));

        let mut r = reply();
        r["phish_email"]["R_expected"] = json!(-1.0);
        assert!(ExPostParams::from_oracle_reply(&r).is_err());
    }

    #[test]
    fn rejects_non_object_reply() {
        assert_eq!(
            ExPostParams::from_oracle_reply(&json!([1, 2, 3])),
            Err(ParamError::NotAnObject)
        );
    }

    #[test]
    fn new_requires_every_action() {
        let mut entries = BTreeMap::new();
        entries.insert(Action::NoAction, ActionParams::baseline());
        entries.insert(Action::ResellBulk, ActionParams::new(0.9, 100.0, 10.0, 0.1));
        assert!(matches!(
            ExPostParams::new(entries.clone()),
            Err(ParamError::MissingAction(Action::GuessAddress))
        ));
        let partial = ExPostParams::restricted(entries).unwrap();
        assert!(!partial.is_complete());
        assert_eq!(partial.len(), 2);
    }

    #[test]
    fn nan_is_out_of_range() {
        let p = ActionParams::new(f64::NAN, 1.0, 1.0, 0.0);
        assert!(p.validate(Action::PhishEmail).is_err());
        let r = ActionParams::new(0.5, f64::INFINITY, 1.0, 0.0);
        assert!(r.validate(Action::PhishEmail).is_err());
    }

    #[test]
    fn averages_cover_present_actions() {
        let params = ExPostParams::from_oracle_reply(&reply()).unwrap();
        let avg_r = (0.0 + 150.0 + 800.0 + 120.0) / 4.0;
        assert!((params.average_revenue() - avg_r).abs() < 1e-12);
        let avg_d = (0.0 + 0.05 + 0.25 + 0.1) / 4.0;
        assert!((params.average_detection_risk() - avg_d).abs() < 1e-12);
    }

    #[test]
    fn deserialization_revalidates_ranges() {
        let bad = r#"{"resell_bulk":{"P_success":2.0,"R_expected":1.0,"C_cost":0.0,"detection_risk":0.0}}"#;
        assert!(serde_json::from_str::<ExPostParams>(bad).is_err());
    }

    #[test]
    fn uniform_keeps_baseline_neutral() {
        let params = ExPostParams::uniform(ActionParams::new(1.0, 1000.0, 50.0, 0.0)).unwrap();
        assert_eq!(params.get(Action::NoAction), Some(&ActionParams::baseline()));
        assert_eq!(params.get(Action::PhishEmail).unwrap().r_expected, 1000.0);
    }
}
