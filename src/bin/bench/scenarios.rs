// Scenario Definitions - the four reference data exposures
// Each scenario pairs a raw signal with the fixture parameters an oracle would return for it

use std::collections::BTreeMap;

use serde_json::{json, Value};
use voi_engine::{Action, ActionParams, ExPostParams, ParamError, RequestMetadata};

// ─── Scenario Configuration ─────────────────────────────────────────────────

pub struct Scenario {
    pub name: &'static str,
    pub label: &'static str,
    pub description: &'static str,
    pub data_type: &'static str,
    pub region: &'static str,
    pub freshness_days: f64,
    pub signal: fn() -> Value,
    /// Fixture posterior: (P_success, R_expected, C_cost, detection_risk) for
    /// guess_address, phish_email, resell_bulk.
    pub fixture: [(f64, f64, f64, f64); 3],
    pub criteria: PassCriteria,
}

pub struct PassCriteria {
    pub expected_action: Action,
    /// Whether the signal should clear the generic prior and get a non-zero price.
    pub expect_priced: bool,
}

impl Scenario {
    pub fn metadata(&self, run: usize) -> RequestMetadata {
        RequestMetadata::new()
            .with_data_type(self.data_type)
            .with_region(self.region)
            .with_freshness_days(self.freshness_days)
            .with_query_id(&format!("{}_{:03}", self.name.to_lowercase(), run))
    }

    pub fn ex_post_params(&self) -> Result<ExPostParams, ParamError> {
        let mut entries = BTreeMap::new();
        entries.insert(Action::NoAction, ActionParams::baseline());
        let actions = [Action::GuessAddress, Action::PhishEmail, Action::ResellBulk];
        for (action, (p, r, c, d)) in actions.into_iter().zip(self.fixture) {
            entries.insert(action, ActionParams::new(p, r, c, d));
        }
        ExPostParams::new(entries)
    }
}

// ─── Signals ────────────────────────────────────────────────────────────────

fn basic_consumer_profile() -> Value {
    json!({
        "subscriber_id": "sub_789456123",
        "account_tier": "basic",
        "name": "John Smith",
        "phone": "+1-555-0123",
        "email": "jsmith@email.com",
        "address": {"street": "123 Main St", "city": "Anytown", "state": "CA", "zip": "90210"},
        "billing_summary": {"monthly_charge": 45.99, "data_usage_gb": 3.2, "voice_minutes": 250}
    })
}

fn vip_executive_profile() -> Value {
    json!({
        "subscriber_id": "sub_VIP_992847",
        "account_tier": "premium_corporate",
        "job_title": "Chief Financial Officer",
        "employer": "TechCorp International Inc.",
        "verified_identity": true,
        "device_info": {"imei": "352099001761481", "device_model": "iPhone 14 Pro"},
        "location_history": [
            {"latitude": 37.7749, "longitude": -122.4194, "accuracy_meters": 15},
            {"latitude": 37.7899, "longitude": -122.3988, "accuracy_meters": 20}
        ],
        "call_history": [
            {"direction": "outgoing", "duration_seconds": 420, "contact_name": "Board Member - Legal"},
            {"direction": "incoming", "duration_seconds": 180, "contact_name": "Private Client Banking"}
        ],
        "billing_summary": {"monthly_charge": 299.99, "data_usage_gb": 45.8, "international_calls": 12}
    })
}

fn minimal_response() -> Value {
    json!({
        "status": "partial_data",
        "subscriber_id": "sub_333222111",
        "phone": "+1-555-9999",
        "account_status": "active",
        "note": "Limited data due to privacy restrictions"
    })
}

fn bulk_dataset() -> Value {
    let records: Vec<Value> = (0..50)
        .map(|i| {
            json!({
                "subscriber_id": format!("sub_bulk_{}", 10_000 + i),
                "phone": format!("+1-555-{:04}", 2000 + i),
                "email": format!("user{}@example.com", i),
                "account_tier": "standard",
                "data_usage_gb": 2.5 + (i % 10) as f64
            })
        })
        .collect();
    json!({"dataset_id": "bulk_export_20251029", "record_count": 50, "records": records})
}

// ─── Scenario Registry ──────────────────────────────────────────────────────

pub fn scenarios() -> Vec<Scenario> {
    vec![
        Scenario {
            name: "BASIC_CONSUMER",
            label: "Basic Consumer Profile",
            description: "Low-value target with minimal sensitive data",
            data_type: "telecom_profile",
            region: "US",
            freshness_days: 2.0,
            signal: basic_consumer_profile,
            fixture: [(0.6, 80.0, 5.0, 0.05), (0.4, 500.0, 30.0, 0.12), (0.9, 15.0, 2.0, 0.02)],
            criteria: PassCriteria { expected_action: Action::PhishEmail, expect_priced: true },
        },
        Scenario {
            name: "VIP_EXECUTIVE",
            label: "VIP Executive Profile with Tracking",
            description: "High-value target with real-time location and call history",
            data_type: "telecom_profile",
            region: "US",
            freshness_days: 0.02,
            signal: vip_executive_profile,
            fixture: [(0.7, 300.0, 10.0, 0.1), (0.55, 5000.0, 150.0, 0.3), (0.8, 400.0, 20.0, 0.1)],
            criteria: PassCriteria { expected_action: Action::PhishEmail, expect_priced: true },
        },
        Scenario {
            name: "MINIMAL_RESPONSE",
            label: "Minimal API Response",
            description: "Failed or rate-limited query with minimal data",
            data_type: "telecom_subscription",
            region: "US",
            freshness_days: 0.0,
            signal: minimal_response,
            fixture: [(0.2, 20.0, 5.0, 0.05), (0.05, 50.0, 30.0, 0.2), (0.3, 5.0, 2.0, 0.01)],
            criteria: PassCriteria { expected_action: Action::ResellBulk, expect_priced: false },
        },
        Scenario {
            name: "BULK_DATASET",
            label: "Bulk Dataset (50 records)",
            description: "Volume play - low per-record value but high count",
            data_type: "telecom_subscription",
            region: "US",
            freshness_days: 5.0,
            signal: bulk_dataset,
            fixture: [(0.4, 60.0, 10.0, 0.05), (0.25, 300.0, 60.0, 0.2), (0.85, 900.0, 40.0, 0.08)],
            criteria: PassCriteria { expected_action: Action::ResellBulk, expect_priced: true },
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_complete_and_valid() {
        for s in scenarios() {
            let params = s.ex_post_params().unwrap_or_else(|e| panic!("{}: {}", s.name, e));
            assert!(params.is_complete(), "{} incomplete", s.name);
        }
    }

    #[test]
    fn query_ids_are_unique_per_run() {
        let s = &scenarios()[0];
        assert_ne!(s.metadata(1).query_id, s.metadata(2).query_id);
    }
}
