// VoI Benchmark Runner - reference exposure scenarios through the full pricing pipeline
// Monte Carlo over seeds, fixture oracles, seedable ChaCha8 streams
//
// Usage:
//   cargo run --release --bin bench                          # All scenarios (30 runs each)
//   cargo run --release --bin bench -- --runs 5              # Quick mode
//   cargo run --release --bin bench -- vip                   # Filter by name/label
//   cargo run --release --bin bench -- --seed 42             # Custom base seed
//   cargo run --release --bin bench -- --config voi.json     # Model config file (VOI_* env still applies)

mod monte_carlo;
mod report;
mod scenarios;

use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use voi_engine::pipeline::MODEL_VERSION;
use voi_engine::{AnchorTable, PipelineConfig};

use report::*;
use scenarios::*;

/// Pass threshold on the per-scenario pass rate.
const PASS_RATE_THRESHOLD: f64 = 0.9;

// ─── CLI ────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "bench", about = "Value-of-information pricing benchmark")]
struct Cli {
    /// Runs (seeds) per scenario.
    #[arg(long, default_value_t = 30)]
    runs: usize,

    /// Base seed; run i uses seed + i.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Override n_simulations per run.
    #[arg(long)]
    n_simulations: Option<usize>,

    /// Pipeline config JSON file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Anchor table JSON file (defaults to the built-in table).
    #[arg(long)]
    anchors: Option<PathBuf>,

    /// Run trial chunks on the current thread only.
    #[arg(long)]
    sequential: bool,

    /// Output directory for the JSON report.
    #[arg(long, default_value = "benchmark-results")]
    out_dir: PathBuf,

    /// Substring filter on scenario name or label.
    filter: Option<String>,
}

// ─── Main ───────────────────────────────────────────────────────────────────

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env_overrides()?;
    if let Some(n) = cli.n_simulations {
        config.model.n_simulations = n;
    }
    if cli.sequential {
        config.model.parallel = false;
    }
    config.validate().context("benchmark configuration")?;

    let anchors = match &cli.anchors {
        Some(path) => AnchorTable::from_json_file(path)?,
        None => AnchorTable::default(),
    };

    let all_scenarios = scenarios();
    let to_run: Vec<&Scenario> = match &cli.filter {
        Some(f) => {
            let f_lower = f.to_lowercase();
            all_scenarios
                .iter()
                .filter(|s| {
                    s.name.to_lowercase().contains(&f_lower) || s.label.to_lowercase().contains(&f_lower)
                })
                .collect()
        }
        None => all_scenarios.iter().collect(),
    };
    if to_run.is_empty() {
        bail!("no scenarios match filter {:?}", cli.filter);
    }

    println!("\n  VoI Benchmark Runner ({})", MODEL_VERSION);
    println!(
        "  PRNG: ChaCha8Rng | Runs/scenario: {} | Base seed: {} | Trials/run: {}",
        cli.runs, cli.seed, config.model.n_simulations
    );
    println!("  Running {} scenario(s)...\n", to_run.len());
    println!(
        "  {:<38} {:>5} {:>14} {:>16} {:>6} {:>14} {:>7}",
        "Scenario", "Pass%", "V_ex_ante", "USD", "Conf", "Action", "Time"
    );
    println!("  {}", "-".repeat(108));

    let suite_start = Instant::now();
    let mut mc_reports = Vec::new();

    for scenario in &to_run {
        info!(scenario = scenario.name, description = scenario.description, "running scenario");
        let report = monte_carlo::run_monte_carlo(scenario, cli.runs, cli.seed, &config.model, &anchors)
            .with_context(|| format!("scenario {}", scenario.name))?;

        let status = if report.pass_rate >= PASS_RATE_THRESHOLD { "PASS" } else { "FAIL" };
        println!(
            "  {:<38} {:>4}% {:>8.1}±{:<5.1} {:>9.2}±{:<6.2} {:>6.2} {:>14} {:>5.0}ms  {}",
            report.label,
            (report.pass_rate * 100.0) as u32,
            report.v_ex_ante.mean,
            report.v_ex_ante.half_width(),
            report.usd_estimate.mean,
            report.usd_estimate.half_width(),
            report.confidence.mean,
            scenario.criteria.expected_action.wire_name(),
            report.elapsed_ms.mean,
            status,
        );
        mc_reports.push(report);
    }

    let suite_elapsed = suite_start.elapsed();

    // ─── Summary ────────────────────────────────────────────────────────

    let total = mc_reports.len();
    let passed = mc_reports.iter().filter(|r| r.pass_rate >= PASS_RATE_THRESHOLD).count();
    let failed = total - passed;

    println!("  {}", "-".repeat(108));
    println!(
        "  Total: {}  Passed: {}  Failed: {}  Suite time: {:.1}s\n",
        total,
        passed,
        failed,
        suite_elapsed.as_secs_f64()
    );

    // ─── Write JSON Report ──────────────────────────────────────────────

    let ts = SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis();
    let timestamp = format!("{}", ts);

    let report = BenchReport {
        timestamp: timestamp.clone(),
        version: env!("CARGO_PKG_VERSION"),
        model_version: MODEL_VERSION,
        prng: "ChaCha8Rng",
        n_runs_per_scenario: cli.runs,
        base_seed: cli.seed,
        summary: Summary {
            total,
            passed,
            failed,
            pass_rate: passed as f64 / total as f64,
        },
        scenarios: mc_reports,
    };

    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating {}", cli.out_dir.display()))?;
    let path = cli.out_dir.join(format!("bench-{}.json", timestamp));
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&path, &json).with_context(|| format!("writing {}", path.display()))?;
    println!("  Results saved to: {}\n", path.display());

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}
