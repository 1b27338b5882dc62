// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Victim State Sampling

//! Prior and signal-conditioned posterior over the latent [`VictimState`],
//! plus the seeded random streams every trial chunk draws from.
//!
//! Gaussian components are clipped to [0, 10]; Beta components already live
//! in [0, 1], except detection capability under the posterior, which is nudged
//! by the observed detection risk and then clamped.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Beta, Distribution, StandardNormal};

use crate::config::{BetaShape, PriorConfig};
use crate::error::ConfigError;
use crate::ex_post::ExPostParams;
use crate::types::VictimState;
use crate::utility::REVENUE_SCALE;

const STATE_MAX: f64 = 10.0;

// ─── Seed Streams ────────────────────────────────────────────────────────────

/// Reproducible family of independent ChaCha8 streams sharing one base seed.
///
/// Stream `id` is `seed_from_u64(base_seed)` with its stream word set to `id`,
/// so any chunk's draws can be replayed without touching the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedStreams {
    base_seed: u64,
}

impl SeedStreams {
    pub fn new(base_seed: u64) -> Self {
        Self { base_seed }
    }

    /// Draw a fresh base seed from the thread RNG.
    pub fn from_entropy() -> Self {
        Self::new(rand::thread_rng().gen())
    }

    pub fn seed(&self) -> u64 {
        self.base_seed
    }

    pub fn stream(&self, id: u64) -> ChaCha8Rng {
        let mut rng = ChaCha8Rng::seed_from_u64(self.base_seed);
        rng.set_stream(id);
        rng
    }
}

// ─── State Sampler ───────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct StateSampler {
    priors: PriorConfig,
    sensitivity: Beta<f64>,
    detection: Beta<f64>,
    liquidity: Beta<f64>,
}

impl StateSampler {
    pub fn new(priors: &PriorConfig) -> Result<Self, ConfigError> {
        priors.validate()?;
        Ok(Self {
            priors: *priors,
            sensitivity: beta("sensitivity", priors.sensitivity)?,
            detection: beta("detection", priors.detection)?,
            liquidity: beta("liquidity", priors.liquidity)?,
        })
    }

    pub fn priors(&self) -> &PriorConfig {
        &self.priors
    }

    /// Draw from the prior.
    pub fn sample_ex_ante<R: Rng + ?Sized>(&self, rng: &mut R) -> VictimState {
        let p = &self.priors;
        VictimState {
            wealth: clipped_normal(rng, p.wealth_mean, p.wealth_std),
            defense_level: clipped_normal(rng, p.defense_mean, p.defense_std),
            sensitivity: self.sensitivity.sample(rng),
            detection_capability: self.detection.sample(rng),
            asset_liquidity: self.liquidity.sample(rng),
        }
    }

    /// Draw from the posterior implied by the signal's parameters.
    ///
    /// Wealth is pulled towards `ln(1 + avg_R / 1000)` and defense towards
    /// `10 * avg_detection_risk`, each weighted by `signal_strength` against
    /// the prior mean. Averages run over the actions present in `params`.
    pub fn sample_ex_post<R: Rng + ?Sized>(
        &self,
        params: &ExPostParams,
        signal_strength: f64,
        rng: &mut R,
    ) -> VictimState {
        let p = &self.priors;
        let s = signal_strength;
        let avg_revenue = params.average_revenue();
        let avg_detection = params.average_detection_risk();

        let wealth_mean = s * (avg_revenue / REVENUE_SCALE).ln_1p() + (1.0 - s) * p.wealth_mean;
        let defense_mean = s * (avg_detection * STATE_MAX) + (1.0 - s) * p.defense_mean;

        let wealth = clipped_normal(rng, wealth_mean, p.wealth_std * p.posterior_std_ratio);
        let defense_level = clipped_normal(rng, defense_mean, p.defense_std * p.posterior_std_ratio);
        let sensitivity = self.sensitivity.sample(rng);
        let detection_capability =
            (self.detection.sample(rng) + p.detection_nudge * avg_detection).clamp(0.0, 1.0);
        let asset_liquidity = self.liquidity.sample(rng);

        VictimState { wealth, defense_level, sensitivity, detection_capability, asset_liquidity }
    }
}

fn beta(name: &'static str, shape: BetaShape) -> Result<Beta<f64>, ConfigError> {
    Beta::new(shape.alpha, shape.beta)
        .map_err(|e| ConfigError::Distribution { name, reason: e.to_string() })
}

/// `mean + std * z` with `z ~ N(0, 1)`.
pub(crate) fn gaussian<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    let z: f64 = StandardNormal.sample(rng);
    mean + std * z
}

fn clipped_normal<R: Rng + ?Sized>(rng: &mut R, mean: f64, std: f64) -> f64 {
    gaussian(rng, mean, std).clamp(0.0, STATE_MAX)
}

// ===========================================================================
// Tests
// ===========================================================================
