// Copyright 2026 Hypermesh Foundation. All rights reserved.
// VoI Pricing Engine - Monte Carlo Value-of-Information Estimator

//! Estimates how much a signal is worth to a rational attacker.
//!
//! ```text
//! V_raw      = E[max_a U(a | posterior)] - E[max_a U(a | prior)]
//! V_ex_ante  = max(0, V_raw * exp(-lambda * freshness_days))
//! confidence = clamp(1 - cv / 3, 0, 1),  cv = sqrt(var_ante + var_post) / max(|V_ex_ante|, 1)
//! ```
//!
//! Both passes run `n_simulations` trials split into fixed chunks. Every chunk
//! draws from its own ChaCha8 stream (`2i` ex-ante, `2i + 1` ex-post) and keeps
//! a local tally; tallies merge in chunk order afterwards. The result depends
//! only on the base seed, never on how many threads ran the chunks.

use std::collections::BTreeMap;

use rand::Rng;
use rayon::prelude::*;
use tracing::debug;

use crate::config::ModelConfig;
use crate::error::ConfigError;
use crate::ex_post::{ActionParams, ExPostParams};
use crate::sampler::{gaussian, SeedStreams, StateSampler};
use crate::stats::RunningMoments;
use crate::types::{Action, SimulationStats, VictimState};
use crate::utility::AttackerUtility;

/// Trials per chunk. Part of the reproducibility contract: changing it changes
/// which stream each trial draws from.
pub const CHUNK_SIZE: usize = 512;

/// Parameters an uninformed attacker assumes for every non-baseline action.
pub const GENERIC_PARAMS: ActionParams = ActionParams {
    p_success: 0.3,
    r_expected: 500.0,
    c_cost: 100.0,
    detection_risk: 0.1,
};

const P_SUCCESS_NOISE: f64 = 0.15;
const REVENUE_NOISE: f64 = 0.20;
const DETECTION_NOISE: f64 = 0.15;
const P_SUCCESS_FLOOR: f64 = 0.01;
const P_SUCCESS_CEIL: f64 = 0.99;

// ─── Result ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationResult {
    pub v_ex_ante: f64,
    pub v_raw: f64,
    pub freshness_factor: f64,
    pub confidence: f64,
    pub optimal_action_ex_ante: Action,
    pub optimal_action_ex_post: Action,
    pub stats: SimulationStats,
}

// ─── Per-chunk tally ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
struct PassTally {
    /// Per-trial optimal utility.
    optimal: RunningMoments,
    /// Sum of each action's utility over all trials.
    action_sums: [f64; Action::COUNT],
    /// Number of trials in which each action was the arg-max.
    wins: [u64; Action::COUNT],
}

impl PassTally {
    fn record(&mut self, utilities: &[f64; Action::COUNT]) {
        let best = argmax(utilities);
        self.optimal.push(utilities[best]);
        self.wins[best] += 1;
        for (sum, u) in self.action_sums.iter_mut().zip(utilities) {
            *sum += u;
        }
    }

    fn merge(mut self, other: &Self) -> Self {
        self.optimal.merge(&other.optimal);
        for i in 0..Action::COUNT {
            self.action_sums[i] += other.action_sums[i];
            self.wins[i] += other.wins[i];
        }
        self
    }
}

/// Index of the largest value; ties go to the lowest index.
fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

// ─── Estimator ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct MonteCarloEstimator {
    utility: AttackerUtility,
    sampler: StateSampler,
    n_simulations: usize,
    signal_strength: f64,
    freshness_decay_lambda: f64,
    parallel: bool,
}

impl MonteCarloEstimator {
    pub fn new(config: &ModelConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            utility: AttackerUtility::new(config.risk_aversion, config.detection_penalty),
            sampler: StateSampler::new(&config.priors)?,
            n_simulations: config.n_simulations,
            signal_strength: config.signal_strength,
            freshness_decay_lambda: config.freshness_decay_lambda,
            parallel: config.parallel,
        })
    }

    pub fn n_simulations(&self) -> usize {
        self.n_simulations
    }

    /// `exp(-lambda * days)`, in (0, 1] for non-negative ages.
    pub fn freshness_factor(&self, freshness_days: f64) -> f64 {
        (-self.freshness_decay_lambda * freshness_days).exp()
    }

    /// Run both passes. Never fails for range-valid parameters; actions absent
    /// from `params` are simply not available ex-post.
    pub fn estimate(
        &self,
        params: &ExPostParams,
        freshness_days: f64,
        streams: &SeedStreams,
    ) -> SimulationResult {
        let n = self.n_simulations;

        let ante = self.run_pass(|chunk, trials| {
            let mut rng = streams.stream(2 * chunk as u64);
            let mut tally = PassTally::default();
            for _ in 0..trials {
                let state = self.sampler.sample_ex_ante(&mut rng);
                tally.record(&self.ex_ante_utilities(&state));
            }
            tally
        });
        debug!(
            mean = ante.optimal.mean(),
            std = ante.optimal.std_dev(),
            "ex-ante pass complete"
        );

        let post = self.run_pass(|chunk, trials| {
            let mut rng = streams.stream(2 * chunk as u64 + 1);
            let mut tally = PassTally::default();
            for _ in 0..trials {
                let state = self.sampler.sample_ex_post(params, self.signal_strength, &mut rng);
                tally.record(&self.ex_post_utilities(params, &state, &mut rng));
            }
            tally
        });
        debug!(
            mean = post.optimal.mean(),
            std = post.optimal.std_dev(),
            "ex-post pass complete"
        );

        let v_raw = post.optimal.mean() - ante.optimal.mean();
        let freshness_factor = self.freshness_factor(freshness_days);
        let v_ex_ante = (v_raw * freshness_factor).max(0.0);

        let confidence = if v_ex_ante > 0.0 {
            let spread = (ante.optimal.variance() + post.optimal.variance()).sqrt();
            let cv = spread / v_ex_ante.abs().max(1.0);
            (1.0 - cv / 3.0).clamp(0.0, 1.0)
        } else {
            0.0
        };

        // Label: arg-max of per-action mean utility over the same prior trials.
        let optimal_action_ex_ante = Action::ALL[argmax(&ante.action_sums)];
        let wins_as_f64 = post.wins.map(|w| w as f64);
        let optimal_action_ex_post = Action::ALL[argmax(&wins_as_f64)];

        let action_counts: BTreeMap<Action, u64> =
            Action::ALL.iter().map(|a| (*a, post.wins[a.index()])).collect();
        let action_distribution = action_counts
            .iter()
            .map(|(a, c)| (*a, *c as f64 / n as f64))
            .collect();

        SimulationResult {
            v_ex_ante,
            v_raw,
            freshness_factor,
            confidence,
            optimal_action_ex_ante,
            optimal_action_ex_post,
            stats: SimulationStats {
                n_simulations: n,
                ex_ante_mean: ante.optimal.mean(),
                ex_ante_std: ante.optimal.std_dev(),
                ex_post_mean: post.optimal.mean(),
                ex_post_std: post.optimal.std_dev(),
                v_raw,
                action_counts,
                action_distribution,
            },
        }
    }

    /// Run `n_simulations` trials as chunks and merge their tallies in order.
    fn run_pass<F>(&self, chunk_fn: F) -> PassTally
    where
        F: Fn(usize, usize) -> PassTally + Sync + Send,
    {
        let n = self.n_simulations;
        let n_chunks = n.div_ceil(CHUNK_SIZE);
        let trials_in = |chunk: usize| CHUNK_SIZE.min(n - chunk * CHUNK_SIZE);

        let tallies: Vec<PassTally> = if self.parallel {
            (0..n_chunks)
                .into_par_iter()
                .map(|c| chunk_fn(c, trials_in(c)))
                .collect()
        } else {
            (0..n_chunks).map(|c| chunk_fn(c, trials_in(c))).collect()
        };

        tallies.iter().fold(PassTally::default(), PassTally::merge)
    }

    fn ex_ante_utilities(&self, state: &VictimState) -> [f64; Action::COUNT] {
        let g = GENERIC_PARAMS;
        Action::ALL.map(|action| {
            self.utility
                .evaluate(action, state, g.p_success, g.r_expected, g.c_cost, g.detection_risk)
        })
    }

    /// Utilities under per-trial parameter noise. Unavailable actions score
    /// `-inf` so they never win; the baseline is always available at 0.
    fn ex_post_utilities<R: Rng + ?Sized>(
        &self,
        params: &ExPostParams,
        state: &VictimState,
        rng: &mut R,
    ) -> [f64; Action::COUNT] {
        Action::ALL.map(|action| {
            if action.is_baseline() {
                return 0.0;
            }
            let Some(p) = params.get(action) else {
                return f64::NEG_INFINITY;
            };
            let p_success = gaussian(rng, p.p_success, P_SUCCESS_NOISE * p.p_success)
                .clamp(P_SUCCESS_FLOOR, P_SUCCESS_CEIL);
            let r_expected = gaussian(rng, p.r_expected, REVENUE_NOISE * p.r_expected).max(0.0);
            let detection_risk =
                gaussian(rng, p.detection_risk, DETECTION_NOISE * p.detection_risk).clamp(0.0, 1.0);
            self.utility.evaluate(action, state, p_success, r_expected, p.c_cost, detection_risk)
        })
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn config(n: usize) -> ModelConfig {
        ModelConfig { n_simulations: n, ..ModelConfig::default() }
    }

    fn resell_dominant() -> ExPostParams {
        let mut entries = BTreeMap::new();
        entries.insert(Action::NoAction, ActionParams::baseline());
        entries.insert(Action::GuessAddress, ActionParams::new(0.3, 200.0, 20.0, 0.05));
        entries.insert(Action::PhishEmail, ActionParams::new(0.2, 400.0, 60.0, 0.2));
        entries.insert(Action::ResellBulk, ActionParams::new(1.0, 1000.0, 50.0, 0.0));
        ExPostParams::new(entries).expect("test: valid params")
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.0, 5.0, 5.0, 1.0]), 1);
        assert_eq!(argmax(&[0.0, 0.0, 0.0, 0.0]), 0);
        assert_eq!(argmax(&[f64::NEG_INFINITY, -1.0, -3.0, -2.0]), 1);
    }

    #[test]
    fn ex_ante_pass_is_state_independent() {
        let est = MonteCarloEstimator::new(&config(2_000)).unwrap();
        let r = est.estimate(&resell_dominant(), 0.0, &SeedStreams::new(1));
        let expected = 0.15_f64.sqrt() * 1000.0 - 100.0 - 0.1 * 1000.0 * (1.0 + 150.0 / 10_000.0);
        assert!((r.stats.ex_ante_mean - expected).abs() < 1e-9, "ex-ante mean {}", r.stats.ex_ante_mean);
        assert_eq!(r.stats.ex_ante_std, 0.0);
        // identical generic utilities tie; the first non-baseline action wins
        assert_eq!(r.optimal_action_ex_ante, Action::GuessAddress);
    }

    #[test]
    fn dominant_action_wins_ex_post() {
        let est = MonteCarloEstimator::new(&config(5_000)).unwrap();
        let r = est.estimate(&resell_dominant(), 0.0, &SeedStreams::new(42));
        assert_eq!(r.optimal_action_ex_post, Action::ResellBulk);
        assert!(r.v_ex_ante > 0.0);
        assert!(r.confidence > 0.4, "confidence {}", r.confidence);
        assert_eq!(r.freshness_factor, 1.0);
        let total: u64 = r.stats.action_counts.values().sum();
        assert_eq!(total, 5_000);
        let share: f64 = r.stats.action_distribution.values().sum();
        assert!((share - 1.0).abs() < 1e-9);
    }

    #[test]
    fn worthless_signal_floors_at_zero() {
        let params = ExPostParams::uniform(ActionParams::new(0.0, 0.0, 0.0, 0.0)).unwrap();
        let est = MonteCarloEstimator::new(&config(1_000)).unwrap();
        let r = est.estimate(&params, 0.0, &SeedStreams::new(3));
        assert!(r.v_raw < 0.0, "v_raw {}", r.v_raw);
        assert_eq!(r.v_ex_ante, 0.0);
        assert_eq!(r.confidence, 0.0);
        assert_eq!(r.optimal_action_ex_post, Action::NoAction);
    }

    #[test]
    fn parallel_and_sequential_agree_exactly() {
        let params = resell_dominant();
        let streams = SeedStreams::new(2024);
        let par = MonteCarloEstimator::new(&ModelConfig { parallel: true, ..config(3_000) }).unwrap();
        let seq = MonteCarloEstimator::new(&ModelConfig { parallel: false, ..config(3_000) }).unwrap();
        assert_eq!(par.estimate(&params, 2.0, &streams), seq.estimate(&params, 2.0, &streams));
    }

    #[test]
    fn same_seed_same_result_different_seed_differs() {
        let est = MonteCarloEstimator::new(&config(1_500)).unwrap();
        let params = resell_dominant();
        let a = est.estimate(&params, 0.0, &SeedStreams::new(9));
        let b = est.estimate(&params, 0.0, &SeedStreams::new(9));
        let c = est.estimate(&params, 0.0, &SeedStreams::new(10));
        assert_eq!(a, b);
        assert_ne!(a.stats.ex_post_mean, c.stats.ex_post_mean);
    }

    #[test]
    fn freshness_decay_is_monotone() {
        let est = MonteCarloEstimator::new(&config(1_000)).unwrap();
        let params = resell_dominant();
        let streams = SeedStreams::new(77);
        let fresh = est.estimate(&params, 0.0, &streams);
        let week = est.estimate(&params, 7.0, &streams);
        let stale = est.estimate(&params, 60.0, &streams);
        assert!(fresh.v_ex_ante >= week.v_ex_ante);
        assert!(week.v_ex_ante >= stale.v_ex_ante);
        // decay scales V but not V_raw
        assert_eq!(fresh.v_raw, stale.v_raw);
        assert!((week.freshness_factor - (-0.7_f64).exp()).abs() < 1e-12);
    }

    #[test]
    fn missing_actions_narrow_the_pool() {
        let mut entries = BTreeMap::new();
        entries.insert(Action::PhishEmail, ActionParams::new(0.8, 900.0, 10.0, 0.0));
        let params = ExPostParams::restricted(entries).unwrap();
        let est = MonteCarloEstimator::new(&config(600)).unwrap();
        let r = est.estimate(&params, 0.0, &SeedStreams::new(5));
        assert_eq!(r.stats.action_counts[&Action::GuessAddress], 0);
        assert_eq!(r.stats.action_counts[&Action::ResellBulk], 0);
        assert_eq!(r.optimal_action_ex_post, Action::PhishEmail);
        assert!(r.stats.ex_post_mean.is_finite());
    }

    #[test]
    fn uneven_chunk_sizes_cover_every_trial() {
        let est = MonteCarloEstimator::new(&config(CHUNK_SIZE + 1)).unwrap();
        let r = est.estimate(&resell_dominant(), 0.0, &SeedStreams::new(8));
        let total: u64 = r.stats.action_counts.values().sum();
        assert_eq!(total as usize, CHUNK_SIZE + 1);
    }
}
