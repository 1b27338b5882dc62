// Monte Carlo Infrastructure - N priced runs per scenario with statistical aggregation
// Run i uses base seed + i, so every row of the report can be replayed exactly

use std::time::Instant;

use anyhow::Context;
use tracing::debug;
use voi_engine::{AnchorTable, ModelConfig, PipelineConfig, PricingPipeline, StaticOracle};

use crate::report::*;
use crate::scenarios::Scenario;

/// Price a scenario once with a specific seed.
pub fn run_single(
    scenario: &Scenario,
    run: usize,
    seed: u64,
    model: &ModelConfig,
    anchors: &AnchorTable,
) -> anyhow::Result<BenchResult> {
    let params = scenario
        .ex_post_params()
        .with_context(|| format!("fixture parameters for {}", scenario.name))?;
    let config = PipelineConfig {
        model: model.clone(),
        seed: Some(seed),
        ..PipelineConfig::default()
    };
    let pipeline = PricingPipeline::new(StaticOracle::new(params), config, anchors.clone())?;

    let start = Instant::now();
    let estimate = pipeline.estimate_price(&(scenario.signal)(), &scenario.metadata(run))?;
    let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

    let criteria = &scenario.criteria;
    let priced = estimate.usd_estimate > 0.0;
    let pass = estimate.optimal_action_ex_post == criteria.expected_action
        && priced == criteria.expect_priced;
    debug!(scenario = scenario.name, run, seed, pass, "run complete");

    Ok(BenchResult {
        scenario: scenario.name.to_string(),
        query_id: estimate.query_id.clone(),
        seed,
        pass,
        v_ex_ante: estimate.v_ex_ante,
        v_raw: estimate.simulation_stats.v_raw,
        usd_estimate: estimate.usd_estimate,
        usd_quote: estimate.usd_quote().to_string(),
        confidence: estimate.confidence,
        freshness_factor: estimate.freshness_factor,
        optimal_action_ex_ante: estimate.optimal_action_ex_ante,
        optimal_action_ex_post: estimate.optimal_action_ex_post,
        flags: estimate.flags,
        elapsed_ms,
    })
}

/// Run `runs` seeds of one scenario and aggregate.
pub fn run_monte_carlo(
    scenario: &Scenario,
    runs: usize,
    base_seed: u64,
    model: &ModelConfig,
    anchors: &AnchorTable,
) -> anyhow::Result<MonteCarloReport> {
    let results = (0..runs)
        .map(|i| run_single(scenario, i, base_seed.wrapping_add(i as u64), model, anchors))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let collect = |f: fn(&BenchResult) -> f64| results.iter().map(f).collect::<Vec<_>>();
    let v_ex_ante = collect(|r| r.v_ex_ante);
    let usd = collect(|r| r.usd_estimate);
    let confidence = collect(|r| r.confidence);
    let elapsed = collect(|r| r.elapsed_ms);

    let n = results.len().max(1) as f64;
    let pass_rate = results.iter().filter(|r| r.pass).count() as f64 / n;
    let action_agreement = results
        .iter()
        .filter(|r| r.optimal_action_ex_post == scenario.criteria.expected_action)
        .count() as f64
        / n;

    Ok(MonteCarloReport {
        scenario_name: scenario.name.to_string(),
        label: scenario.label.to_string(),
        data_type: scenario.data_type.to_string(),
        n_runs: runs,
        n_simulations: model.n_simulations,
        pass_rate,
        action_agreement,
        v_ex_ante: Stats::from_samples(&v_ex_ante),
        usd_estimate: Stats::from_samples(&usd),
        confidence: Stats::from_samples(&confidence),
        elapsed_ms: Stats::from_samples(&elapsed),
        individual_runs: results,
    })
}
