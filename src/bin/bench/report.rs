// Benchmark Report Types
// Structured JSON output: per-run results, per-scenario aggregates, suite summary

use serde::Serialize;
use voi_engine::stats::{self, RunningMoments};
use voi_engine::{Action, PriceFlag};

const Z_95: f64 = 1.96;

// ─── Statistics (per-metric Monte Carlo aggregation) ────────────────────────

/// Spread of one metric across the runs of a scenario.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Stats {
    pub n: usize,
    pub mean: f64,
    pub median: f64,
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

impl Stats {
    /// Unbiased spread with a normal-approximation 95% interval on the mean.
    pub fn from_samples(samples: &[f64]) -> Self {
        let Some(median) = stats::median(samples) else {
            return Self::default();
        };
        let moments: RunningMoments = samples.iter().copied().collect();
        let std_dev = moments.sample_variance().sqrt();
        let margin = Z_95 * std_dev / (samples.len() as f64).sqrt();
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)));
        Self {
            n: samples.len(),
            mean: moments.mean(),
            median,
            std_dev,
            min,
            max,
            ci_lower: moments.mean() - margin,
            ci_upper: moments.mean() + margin,
        }
    }

    pub fn half_width(&self) -> f64 {
        (self.ci_upper - self.ci_lower) / 2.0
    }
}

// ─── Single-Run Result ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct BenchResult {
    pub scenario: String,
    pub query_id: String,
    pub seed: u64,
    pub pass: bool,
    pub v_ex_ante: f64,
    pub v_raw: f64,
    pub usd_estimate: f64,
    pub usd_quote: String,
    pub confidence: f64,
    pub freshness_factor: f64,
    pub optimal_action_ex_ante: Action,
    pub optimal_action_ex_post: Action,
    pub flags: Vec<PriceFlag>,
    pub elapsed_ms: f64,
}

// ─── Monte Carlo Report (per-scenario aggregation) ──────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct MonteCarloReport {
    pub scenario_name: String,
    pub label: String,
    pub data_type: String,
    pub n_runs: usize,
    pub n_simulations: usize,
    pub pass_rate: f64,
    /// Share of runs whose ex-post action matched the scenario's expectation.
    pub action_agreement: f64,
    pub v_ex_ante: Stats,
    pub usd_estimate: Stats,
    pub confidence: Stats,
    pub elapsed_ms: Stats,
    pub individual_runs: Vec<BenchResult>,
}

// ─── Top-Level Report ───────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct BenchReport {
    pub timestamp: String,
    pub version: &'static str,
    pub model_version: &'static str,
    pub prng: &'static str,
    pub n_runs_per_scenario: usize,
    pub base_seed: u64,
    pub summary: Summary,
    pub scenarios: Vec<MonteCarloReport>,
}

#[derive(Debug, Serialize)]
pub struct Summary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pass_rate: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stats_from_samples() {
        let s = Stats::from_samples(&[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(s.n, 4);
        assert!((s.mean - 2.5).abs() < 1e-12);
        // sample variance = 5/3
        assert!((s.std_dev - (5.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert_eq!(s.median, 2.5);
        assert!(s.ci_lower < s.mean && s.mean < s.ci_upper);
    }

    #[test]
    fn stats_empty_and_single() {
        assert_eq!(Stats::from_samples(&[]).n, 0);
        let one = Stats::from_samples(&[7.0]);
        assert_eq!(one.std_dev, 0.0);
        assert_eq!(one.half_width(), 0.0);
    }
}
