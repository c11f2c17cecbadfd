//! Batch driver
//!
//! Runs many configurations concurrently. Each run is CPU-bound and executes
//! on tokio's blocking pool; a semaphore bounds how many run at once. Runs
//! share only the read-only workload and the oracle.
//!
//! Failure handling:
//! - A run-local failure (the oracle failed, or the run had no cells) is
//!   recorded as [`RunOutcome::Failed`] and the other runs continue.
//! - Any other error, or any error at all with `fail_fast`, stops runs that
//!   have not started yet and fails the batch.

use futures::future::join_all;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, instrument, warn};

use super::report::RunReport;
use super::run::{Pretrained, SimulationRun};
use crate::config::SimulationConfig;
use crate::domain::ClusteringOracle;
use crate::error::{Error, Result};
use crate::workload::Workload;

/// Everything needed to execute one configuration.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub config: SimulationConfig,
    pub workload: Arc<Workload>,
    pub pretrained: Option<Pretrained>,
}

impl RunPlan {
    pub fn new(config: SimulationConfig, workload: Arc<Workload>) -> Self {
        Self {
            config,
            workload,
            pretrained: None,
        }
    }

    pub fn with_pretrained(mut self, pretrained: Pretrained) -> Self {
        self.pretrained = Some(pretrained);
        self
    }

    /// Execute synchronously on the current thread
    pub fn execute(self, oracle: &dyn ClusteringOracle) -> Result<RunReport> {
        SimulationRun::new(self.config, self.workload)?.execute(oracle, self.pretrained)
    }
}

/// Batch execution options
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// Maximum runs executing at once
    pub max_concurrent_runs: usize,
    /// Fail the whole batch on the first failed run
    pub fail_fast: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            max_concurrent_runs: 2,
            fail_fast: false,
        }
    }
}

/// Result of one configuration in a batch
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    Failed { name: String, error: Error },
}

impl RunOutcome {
    pub fn name(&self) -> &str {
        match self {
            RunOutcome::Completed(report) => &report.name,
            RunOutcome::Failed { name, .. } => name,
        }
    }

    pub fn report(&self) -> Option<&RunReport> {
        match self {
            RunOutcome::Completed(report) => Some(report),
            RunOutcome::Failed { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }
}

/// Execute `plans` concurrently, returning outcomes in plan order
#[instrument(skip_all, fields(runs = plans.len(), max_concurrent = options.max_concurrent_runs))]
pub async fn run_batch(
    plans: Vec<RunPlan>,
    oracle: Arc<dyn ClusteringOracle>,
    options: BatchOptions,
) -> Result<Vec<RunOutcome>> {
    let semaphore = Arc::new(Semaphore::new(options.max_concurrent_runs.max(1)));
    let abort = Arc::new(AtomicBool::new(false));
    let fail_fast = options.fail_fast;

    let tasks = plans.into_iter().map(|plan| {
        let semaphore = Arc::clone(&semaphore);
        let abort = Arc::clone(&abort);
        let oracle = Arc::clone(&oracle);
        async move {
            let _permit = semaphore
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("run semaphore closed: {}", e)))?;
            if abort.load(Ordering::SeqCst) {
                return Ok::<_, Error>(None);
            }

            let name = plan.config.name();
            info!(run = %name, "Run started");
            let result = tokio::task::spawn_blocking(move || plan.execute(oracle.as_ref()))
                .await
                .map_err(|e| Error::Internal(format!("run '{}' panicked: {}", name, e)))?;

            match result {
                Ok(report) => Ok(Some(RunOutcome::Completed(report))),
                Err(error) if error.is_run_local() && !fail_fast => {
                    warn!(run = %name, error = %error, "Run aborted");
                    Ok(Some(RunOutcome::Failed { name, error }))
                }
                Err(error) => {
                    abort.store(true, Ordering::SeqCst);
                    error!(run = %name, error = %error, "Run failed, stopping batch");
                    Err(error)
                }
            }
        }
    });

    let mut outcomes = Vec::new();
    for result in join_all(tasks).await {
        if let Some(outcome) = result? {
            outcomes.push(outcome);
        }
    }

    let failed = outcomes.iter().filter(|o| !o.is_success()).count();
    info!(completed = outcomes.len() - failed, failed, "Batch finished");
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::KMeansOracle;
    use crate::domain::ClusterModel;
    use crate::error::OracleStage;
    use crate::workload::WorkloadBuilder;
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    struct BrokenOracle;

    impl ClusteringOracle for BrokenOracle {
        fn fit(&self, _: &[Vec<f64>], _: usize, _: usize) -> Result<Box<dyn ClusterModel>> {
            Err(Error::oracle(OracleStage::Fit, "broken"))
        }
    }

    fn workload() -> Arc<Workload> {
        let mut b = WorkloadBuilder::new(Duration::from_secs(3600));
        for (h, file, client) in [(0, "x", "a"), (0, "y", "b"), (1, "x", "a"), (1, "y", "c")] {
            b.push(Utc.with_ymd_and_hms(2017, 3, 1, h, 0, 0).unwrap(), file, client);
        }
        Arc::new(b.build().unwrap())
    }

    fn plan(name: &str) -> RunPlan {
        let config = SimulationConfig {
            name: Some(name.to_string()),
            ..SimulationConfig::default()
        };
        RunPlan::new(config, workload())
    }

    #[tokio::test]
    async fn test_outcomes_keep_plan_order() {
        let plans = vec![plan("one"), plan("two"), plan("three")];
        let outcomes = run_batch(plans, Arc::new(KMeansOracle::default()), BatchOptions::default())
            .await
            .unwrap();
        let names: Vec<_> = outcomes.iter().map(|o| o.name()).collect();
        assert_eq!(names, vec!["one", "two", "three"]);
        assert!(outcomes.iter().all(|o| o.is_success()));
    }

    #[tokio::test]
    async fn test_oracle_failure_is_confined_to_its_run() {
        let outcomes = run_batch(vec![plan("a"), plan("b")], Arc::new(BrokenOracle), BatchOptions::default())
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 2);
        assert_matches!(
            &outcomes[0],
            RunOutcome::Failed { error: Error::OracleFailure { .. }, .. }
        );
    }

    #[tokio::test]
    async fn test_fail_fast_fails_the_batch() {
        let options = BatchOptions {
            max_concurrent_runs: 1,
            fail_fast: true,
        };
        let result = run_batch(vec![plan("a"), plan("b")], Arc::new(BrokenOracle), options).await;
        assert_matches!(result, Err(Error::OracleFailure { .. }));
    }

    #[tokio::test]
    async fn test_config_errors_fail_the_batch() {
        let mut bad = plan("bad");
        bad.config.test_start_period = 9;
        let result = run_batch(
            vec![plan("good"), bad],
            Arc::new(KMeansOracle::default()),
            BatchOptions::default(),
        )
        .await;
        assert_matches!(result, Err(Error::Config(_)));
    }
}
