// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Model & Pipeline Configuration

//! Explicit, immutable configuration injected at pipeline construction.
//!
//! Every config is a plain serde struct with defaults, so a JSON file may set
//! any subset of fields. `VOI_*` environment variables override file values.
//! Out-of-range values are rejected by `validate`, never clamped.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ConfigError;

// ---------------------------------------------------------------------------
// PriorConfig
// ---------------------------------------------------------------------------

/// Shape parameters of a Beta distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BetaShape {
    pub alpha: f64,
    pub beta: f64,
}

impl BetaShape {
    pub const fn new(alpha: f64, beta: f64) -> Self {
        Self { alpha, beta }
    }
}

/// Prior over the latent victim state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriorConfig {
    pub wealth_mean: f64,
    pub wealth_std: f64,
    pub defense_mean: f64,
    pub defense_std: f64,
    pub sensitivity: BetaShape,
    pub detection: BetaShape,
    pub liquidity: BetaShape,
    /// Posterior std as a fraction of prior std.
    pub posterior_std_ratio: f64,
    /// Weight of the observed average detection risk added to detection capability.
    pub detection_nudge: f64,
}

impl Default for PriorConfig {
    fn default() -> Self {
        Self {
            wealth_mean: 5.0,
            wealth_std: 2.5,
            defense_mean: 4.0,
            defense_std: 2.0,
            sensitivity: BetaShape::new(2.0, 5.0),
            detection: BetaShape::new(3.0, 7.0),
            liquidity: BetaShape::new(5.0, 3.0),
            posterior_std_ratio: 0.7,
            detection_nudge: 0.3,
        }
    }
}

impl PriorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("priors.wealth_mean", self.wealth_mean, 0.0, 10.0, "0 <= x <= 10")?;
        check_range("priors.defense_mean", self.defense_mean, 0.0, 10.0, "0 <= x <= 10")?;
        check_positive("priors.wealth_std", self.wealth_std)?;
        check_positive("priors.defense_std", self.defense_std)?;
        for (name, shape) in [
            ("priors.sensitivity", self.sensitivity),
            ("priors.detection", self.detection),
            ("priors.liquidity", self.liquidity),
        ] {
            check_positive(name, shape.alpha)?;
            check_positive(name, shape.beta)?;
        }
        check_range(
            "priors.posterior_std_ratio",
            self.posterior_std_ratio,
            0.0,
            1.0,
            "0 <= x <= 1",
        )?;
        check_range("priors.detection_nudge", self.detection_nudge, 0.0, 1.0, "0 <= x <= 1")
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Coefficients of the attacker decision model and the Monte Carlo run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub risk_aversion: f64,
    /// Penalty on detection, in utility units. Must be <= 0.
    pub detection_penalty: f64,
    /// Exponential decay rate of signal value per day of age.
    pub freshness_decay_lambda: f64,
    pub n_simulations: usize,
    /// Weight of the signal versus the prior in the ex-post state posterior.
    pub signal_strength: f64,
    /// Run trial chunks on the rayon pool. Results are identical either way.
    pub parallel: bool,
    pub priors: PriorConfig,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            risk_aversion: 0.5,
            detection_penalty: -1000.0,
            freshness_decay_lambda: 0.1,
            n_simulations: 10_000,
            signal_strength: 0.7,
            parallel: true,
            priors: PriorConfig::default(),
        }
    }
}

impl ModelConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("risk_aversion", self.risk_aversion, 0.0, 1.0, "0 <= x <= 1")?;
        if !(self.detection_penalty.is_finite() && self.detection_penalty <= 0.0) {
            return Err(ConfigError::out_of_range(
                "detection_penalty",
                self.detection_penalty,
                "finite, <= 0",
            ));
        }
        if !(self.freshness_decay_lambda.is_finite() && self.freshness_decay_lambda >= 0.0) {
            return Err(ConfigError::out_of_range(
                "freshness_decay_lambda",
                self.freshness_decay_lambda,
                "finite, >= 0",
            ));
        }
        if self.n_simulations == 0 {
            return Err(ConfigError::out_of_range("n_simulations", 0.0, ">= 1"));
        }
        check_range("signal_strength", self.signal_strength, 0.0, 1.0, "0 <= x <= 1")?;
        self.priors.validate()
    }
}

// ---------------------------------------------------------------------------
// OracleConfig
// ---------------------------------------------------------------------------

/// Retry budget and per-attempt timeout for the signal oracle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleConfig {
    pub max_attempts: u32,
    pub timeout_secs: f64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self { max_attempts: 3, timeout_secs: 30.0 }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs_f64(self.timeout_secs)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::out_of_range("oracle.max_attempts", 0.0, ">= 1"));
        }
        // from_secs_f64 panics on overflow; cap at one day
        if !(self.timeout_secs > 0.0 && self.timeout_secs <= 86_400.0) {
            return Err(ConfigError::out_of_range(
                "oracle.timeout_secs",
                self.timeout_secs,
                "0 < x <= 86400",
            ));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PipelineConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub model: ModelConfig,
    pub oracle: OracleConfig,
    /// Fixed base seed for every request. `None` draws a fresh seed per request.
    pub seed: Option<u64>,
    pub default_data_type: String,
    pub default_region: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            oracle: OracleConfig::default(),
            seed: None,
            default_data_type: "telecom_profile".to_string(),
            default_region: "unknown".to_string(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        self.oracle.validate()
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: display.clone(), source })?;
        let cfg: Self = serde_json::from_str(&raw)
            .map_err(|source| ConfigError::Parse { path: display, source })?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Apply `VOI_*` overrides from the process environment.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup, then re-validate.
    ///
    /// Recognised keys:
    ///   - VOI_RISK_AVERSION           (f64)
    ///   - VOI_DETECTION_PENALTY       (f64, <= 0)
    ///   - VOI_FRESHNESS_DECAY_LAMBDA  (f64)
    ///   - VOI_N_SIMULATIONS           (usize)
    ///   - VOI_SIGNAL_STRENGTH         (f64)
    ///   - VOI_SEED                    (u64)
    ///   - VOI_ORACLE_MAX_ATTEMPTS     (u32)
    ///   - VOI_ORACLE_TIMEOUT_SECS     (f64)
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = env_value(&lookup, "VOI_RISK_AVERSION", "f64")? {
            self.model.risk_aversion = v;
        }
        if let Some(v) = env_value(&lookup, "VOI_DETECTION_PENALTY", "f64")? {
            self.model.detection_penalty = v;
        }
        if let Some(v) = env_value(&lookup, "VOI_FRESHNESS_DECAY_LAMBDA", "f64")? {
            self.model.freshness_decay_lambda = v;
        }
        if let Some(v) = env_value(&lookup, "VOI_N_SIMULATIONS", "usize")? {
            self.model.n_simulations = v;
        }
        if let Some(v) = env_value(&lookup, "VOI_SIGNAL_STRENGTH", "f64")? {
            self.model.signal_strength = v;
        }
        if let Some(v) = env_value(&lookup, "VOI_SEED", "u64")? {
            self.seed = Some(v);
        }
        if let Some(v) = env_value(&lookup, "VOI_ORACLE_MAX_ATTEMPTS", "u32")? {
            self.oracle.max_attempts = v;
        }
        if let Some(v) = env_value(&lookup, "VOI_ORACLE_TIMEOUT_SECS", "f64")? {
            self.oracle.timeout_secs = v;
        }

        self.validate()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Look up and parse one override. Unset keys yield `Ok(None)`; unparseable
/// values are an error rather than silently ignored.
fn env_value<F, T>(lookup: &F, key: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    match raw.trim().parse::<T>() {
        Ok(v) => {
            info!(key, value = %raw.trim(), "config override applied");
            Ok(Some(v))
        }
        Err(_) => Err(ConfigError::Env { key, raw, expected }),
    }
}

fn check_range(
    field: &'static str,
    value: f64,
    lo: f64,
    hi: f64,
    expected: &'static str,
) -> Result<(), ConfigError> {
    if (lo..=hi).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, expected))
    }
}

fn check_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::out_of_range(field, value, "finite, > 0"))
    }
}

// ===========================================================================
// Tests
// ===========================================================================
