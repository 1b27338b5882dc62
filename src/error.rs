// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Error Types

use serde::{Deserialize, Serialize};

use crate::pipeline::PipelineStage;

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors raised while building or loading model configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{field} = {value} is out of range ({expected})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        expected: &'static str,
    },

    #[error("invalid {name} distribution: {reason}")]
    Distribution { name: &'static str, reason: String },

    #[error("could not read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("environment override {key}={raw:?} is not a valid {expected}")]
    Env {
        key: &'static str,
        raw: String,
        expected: &'static str,
    },
}

impl ConfigError {
    pub(crate) fn out_of_range(field: &'static str, value: f64, expected: &'static str) -> Self {
        Self::OutOfRange { field, value, expected }
    }
}

// ---------------------------------------------------------------------------
// Pricing errors
// ---------------------------------------------------------------------------

/// Errors surfaced by [`PricingPipeline`](crate::pipeline::PricingPipeline).
///
/// A non-positive value of information and an empty anchor set are not errors;
/// both degrade to flagged estimates.
#[derive(Debug, thiserror::Error)]
pub enum PricingError {
    #[error("signal oracle unavailable after {attempts} attempt(s): {reason}")]
    OracleUnavailable { attempts: u32, reason: String },

    #[error("signal oracle returned invalid parameters after {attempts} attempt(s): {reason}")]
    OracleInvalidOutput { attempts: u32, reason: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error("invalid request metadata: {0}")]
    InvalidInput(String),

    #[error("request cancelled before {0:?}")]
    Cancelled(PipelineStage),
}

/// Serializable discriminant of a [`PricingError`], used as a batch error marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    OracleUnavailable,
    OracleInvalidOutput,
    InvalidConfiguration,
    InvalidInput,
    Cancelled,
}

impl PricingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OracleUnavailable { .. } => ErrorKind::OracleUnavailable,
            Self::OracleInvalidOutput { .. } => ErrorKind::OracleInvalidOutput,
            Self::InvalidConfiguration(_) => ErrorKind::InvalidConfiguration,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::Cancelled(_) => ErrorKind::Cancelled,
        }
    }

    /// Pipeline state the request ended in.
    pub fn terminal_stage(&self) -> PipelineStage {
        match self {
            Self::OracleUnavailable { .. } | Self::OracleInvalidOutput { .. } => {
                PipelineStage::OracleFailed
            }
            Self::InvalidConfiguration(_) | Self::InvalidInput(_) => PipelineStage::InvalidInput,
            Self::Cancelled(stage) => *stage,
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
