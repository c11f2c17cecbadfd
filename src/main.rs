//! edgecoop - Cooperative Edge Caching Simulator
//!
//! Loads a batch of simulation configs and a request trace from the data
//! directory, runs every config concurrently and writes per-run rate files,
//! clustering artifacts and a Prometheus metrics snapshot.
//!
//! # Batch Flow
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │   configs    │───▶│  workloads   │───▶│  run_batch   │───▶│   results    │
//! │ (json/yaml)  │    │ (per period  │    │ (semaphore + │    │ rates, model │
//! │              │    │   duration)  │    │  blocking)   │    │   metrics    │
//! └──────────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```

use clap::Parser;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use edgecoop::adapters::{load_trace, KMeansModel, KMeansOracle, ResultStore};
use edgecoop::config::{disambiguate_names, load_configs, SimulationConfig};
use edgecoop::domain::ClusterModel;
use edgecoop::metrics::SimulationMetrics;
use edgecoop::simulator::{rate, run_batch, BatchOptions, Pretrained, RunOutcome, RunPlan};
use edgecoop::{Result, Workload};

// =============================================================================
// CLI Arguments
// =============================================================================

/// edgecoop - Cooperative edge caching simulator
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the configs and the request trace
    #[arg(long, env = "EDGECOOP_DATA_DIR", default_value = "data")]
    data_dir: PathBuf,

    /// Config batch file name inside the data directory (.json, .yaml or .yml)
    #[arg(long, env = "EDGECOOP_CONFIGS", default_value = "configs.json")]
    configs: String,

    /// Request trace file name inside the data directory
    #[arg(long, env = "EDGECOOP_REQUESTS", default_value = "requests.csv")]
    requests: String,

    /// Output directory; defaults to the data directory
    #[arg(long, env = "EDGECOOP_RESULTS_DIR")]
    results_dir: Option<PathBuf>,

    /// Maximum concurrent runs
    #[arg(long, env = "MAX_CONCURRENT_RUNS", default_value = "2")]
    max_concurrent_runs: usize,

    /// Stop the whole batch on the first failed run
    #[arg(long, env = "FAIL_FAST")]
    fail_fast: bool,

    /// Seed of the k-means++ initialization
    #[arg(long, env = "EDGECOOP_SEED", default_value_t = edgecoop::adapters::DEFAULT_SEED)]
    seed: u64,

    /// Write a Prometheus text snapshot of the batch to this path
    #[arg(long, env = "METRICS_FILE")]
    metrics_file: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long, env = "LOG_JSON")]
    log_json: bool,
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    init_logging(&args);

    info!("Starting edgecoop");
    info!("  Data directory: {}", args.data_dir.display());
    info!("  Max concurrent runs: {}", args.max_concurrent_runs);
    info!("  Fail-fast: {}", args.fail_fast);

    let mut configs = load_configs(&args.data_dir.join(&args.configs))?;
    disambiguate_names(&mut configs);

    let store = ResultStore::new(args.results_dir.clone().unwrap_or_else(|| args.data_dir.clone()));
    std::fs::create_dir_all(store.dir())?;

    let plans = build_plans(&args, &store, configs)?;
    let oracle = Arc::new(KMeansOracle::new(args.seed));
    let options = BatchOptions {
        max_concurrent_runs: args.max_concurrent_runs,
        fail_fast: args.fail_fast,
    };

    let outcomes = run_batch(plans, oracle, options).await?;

    write_results(&store, &outcomes)?;

    if let Some(path) = &args.metrics_file {
        let metrics = SimulationMetrics::new()?;
        for outcome in &outcomes {
            metrics.record(outcome);
        }
        metrics.write_to(path)?;
    }

    let (served, downloaded) = outcomes
        .iter()
        .filter_map(RunOutcome::report)
        .fold((0, 0), |(s, d), r| (s + r.served(), d + r.downloaded()));
    info!(
        hit_rate = rate(served, served, downloaded),
        download_rate = rate(downloaded, served, downloaded),
        "Batch rates"
    );

    for outcome in &outcomes {
        if let RunOutcome::Failed { name, error } = outcome {
            warn!(run = %name, error = %error, "Run did not complete");
        }
    }

    info!("Simulation complete");
    Ok(())
}

// =============================================================================
// Batch Setup
// =============================================================================

/// One plan per config. Workloads are shared between configs with the same
/// period duration; persisted clustering artifacts are read once.
fn build_plans(args: &Args, store: &ResultStore, configs: Vec<SimulationConfig>) -> Result<Vec<RunPlan>> {
    let trace = args.data_dir.join(&args.requests);
    let mut workloads: HashMap<Duration, Arc<Workload>> = HashMap::new();

    let pretrained = if configs.iter().any(|c| c.is_trained) {
        let model = store.read_model()?;
        let assignment = store.read_clustering_result()?;
        info!(
            clusters = model.centroids().len(),
            clients = assignment.len(),
            "Persisted clustering loaded"
        );
        Some(Pretrained { model, assignment })
    } else {
        None
    };

    let mut plans = Vec::with_capacity(configs.len());
    for config in configs {
        let duration = config.period()?;
        let workload = match workloads.get(&duration) {
            Some(w) => Arc::clone(w),
            None => {
                let w = Arc::new(load_trace(&trace, duration)?);
                workloads.insert(duration, Arc::clone(&w));
                w
            }
        };

        let is_trained = config.is_trained;
        let plan = RunPlan::new(config, workload);
        plans.push(match (&pretrained, is_trained) {
            (Some(p), true) => plan.with_pretrained(p.clone()),
            _ => plan,
        });
    }
    Ok(plans)
}

// =============================================================================
// Results
// =============================================================================

fn write_results(store: &ResultStore, outcomes: &[RunOutcome]) -> Result<()> {
    let mut fitted = None;
    for report in outcomes.iter().filter_map(RunOutcome::report) {
        let path = store.write_run_rates(&report.name, report.hit_rates())?;
        info!(
            run = %report.name,
            path = %path.display(),
            hit_rate = report.hit_rate(),
            download_rate = report.download_rate(),
            "Run results written"
        );
        store.write_group_popularity(report.train_start, report.train_end, &report.group_popularity)?;
        if report.centroids.is_some() {
            fitted = Some(report);
        }
    }

    if let Some(report) = fitted {
        if let Some(centroids) = &report.centroids {
            store.write_model(&KMeansModel::from_centroids(centroids.clone())?)?;
            store.write_clustering_result(&report.training)?;
            info!(run = %report.name, "Clustering artifacts written");
        }
    }
    Ok(())
}

// =============================================================================
// Logging Setup
// =============================================================================

fn init_logging(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}
