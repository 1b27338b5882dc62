// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Market Anchor Calibration

//! Converts abstract utility into USD using curated market observations.
//!
//! Each anchor pairs an observed dark-market price with the utility the model
//! assigns that data type. The median USD-per-utility ratio over the matching
//! anchors becomes the exchange rate for a request.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConfigError;
use crate::stats;
use crate::types::AnchorPoint;

/// Upper bound on anchors echoed back in a price estimate.
pub const MAX_ANCHORS_REPORTED: usize = 5;

/// USD per utility unit when no anchors exist at all.
pub const FALLBACK_SCALE: f64 = 0.1;
pub const FALLBACK_CONFIDENCE: f64 = 0.3;
pub const SINGLE_ANCHOR_CONFIDENCE: f64 = 0.5;
const MIN_CONFIDENCE: f64 = 0.3;
const MAX_CONFIDENCE: f64 = 0.95;

// ---------------------------------------------------------------------------
// AnchorTable
// ---------------------------------------------------------------------------

/// Validated, immutable anchor set. Clones share the same allocation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnchorTable {
    anchors: Arc<[AnchorPoint]>,
}

impl AnchorTable {
    pub fn new(anchors: Vec<AnchorPoint>) -> Result<Self, ConfigError> {
        for anchor in &anchors {
            if !(anchor.usd_price.is_finite() && anchor.usd_price >= 0.0) {
                return Err(ConfigError::out_of_range(
                    "anchor.usd_price",
                    anchor.usd_price,
                    "finite, >= 0",
                ));
            }
            if !(anchor.estimated_voi_utility.is_finite() && anchor.estimated_voi_utility >= 0.0) {
                return Err(ConfigError::out_of_range(
                    "anchor.estimated_voi_utility",
                    anchor.estimated_voi_utility,
                    "finite, >= 0",
                ));
            }
        }
        Ok(Self { anchors: anchors.into() })
    }

    pub fn empty() -> Self {
        Self { anchors: Arc::from(Vec::new()) }
    }

    /// Load a JSON array of anchors.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: display.clone(), source })?;
        let anchors: Vec<AnchorPoint> = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: display, source })?;
        Self::new(anchors)
    }

    pub fn as_slice(&self) -> &[AnchorPoint] {
        &self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl Default for AnchorTable {
    fn default() -> Self {
        Self { anchors: default_anchors().into() }
    }
}

/// Published dark-market observations (Privacy Affairs, Comparitech, SOCRadar,
/// DeepStrike) paired with their modelled utility.
pub fn default_anchors() -> Vec<AnchorPoint> {
    vec![
        AnchorPoint::new("telecom_profile", 50.0, 400.0, "privacy_affairs_2023")
            .with_description("Telecom subscriber profile with location history"),
        AnchorPoint::new("telecom_profile", 85.0, 650.0, "comparitech_2024")
            .with_description("Premium telecom data with real-time tracking"),
        AnchorPoint::new("telecom_subscription", 25.0, 200.0, "socradar_2024")
            .with_description("Basic subscription data without location"),
        AnchorPoint::new("pii_core", 15.0, 150.0, "privacy_affairs_2023")
            .with_description("Name, phone, email (no location or tracking)"),
        AnchorPoint::new("fullz", 200.0, 1500.0, "comparitech_2024")
            .with_description("Full identity package (SSN, DOB, address, banking)"),
        AnchorPoint::new("contact", 5.0, 50.0, "socradar_2024")
            .with_description("Basic contact information only"),
        AnchorPoint::new("corporate_access", 500.0, 5000.0, "deepstrike_2025")
            .with_description("Corporate VPN access or admin credentials"),
    ]
}

// ---------------------------------------------------------------------------
// AnchorNormalizer
// ---------------------------------------------------------------------------

/// Which anchors fed a calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorMatch {
    /// Anchors of the requested data type.
    DataType,
    /// No anchor matched; the whole table was used.
    FullTable,
    /// The table is empty; the fixed fallback scale was used.
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnchorCalibration {
    pub usd_estimate: f64,
    pub confidence: f64,
    pub anchors_used: Vec<AnchorPoint>,
    pub matched: AnchorMatch,
}

#[derive(Debug, Clone, Default)]
pub struct AnchorNormalizer {
    table: AnchorTable,
}

impl AnchorNormalizer {
    pub fn new(table: AnchorTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &AnchorTable {
        &self.table
    }

    pub fn normalize(&self, v_ex_ante: f64, data_type: &str) -> AnchorCalibration {
        let all = self.table.as_slice();
        if all.is_empty() {
            warn!(data_type, "anchor table is empty; using rule-of-thumb scale");
            return AnchorCalibration {
                usd_estimate: v_ex_ante * FALLBACK_SCALE,
                confidence: FALLBACK_CONFIDENCE,
                anchors_used: Vec::new(),
                matched: AnchorMatch::None,
            };
        }

        let matching: Vec<&AnchorPoint> = all.iter().filter(|a| a.data_type == data_type).collect();
        let (used, matched) = if matching.is_empty() {
            warn!(data_type, anchors = all.len(), "no anchors for data type; using full table");
            (all.iter().collect::<Vec<_>>(), AnchorMatch::FullTable)
        } else {
            (matching, AnchorMatch::DataType)
        };

        let factors: Vec<f64> = used.iter().map(|a| a.scaling_factor()).collect();
        let scale = stats::median(&factors).unwrap_or(FALLBACK_SCALE);

        let confidence = if factors.len() >= 2 {
            let cv = stats::population_std(&factors) / stats::mean(&factors).max(0.01);
            (1.0 - cv / 2.0).clamp(MIN_CONFIDENCE, MAX_CONFIDENCE)
        } else {
            SINGLE_ANCHOR_CONFIDENCE
        };

        AnchorCalibration {
            usd_estimate: v_ex_ante * scale,
            confidence,
            anchors_used: used.into_iter().take(MAX_ANCHORS_REPORTED).cloned().collect(),
            matched,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
