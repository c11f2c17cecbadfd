//! edgecoop Integration Tests
//!
//! Drives the public API end to end:
//! - Serving loop and hit-rate accounting
//! - Similarity placement fallback
//! - Oracle failures and batch execution
//! - Trace ingestion and persisted clustering reload

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use chrono::{DateTime, TimeZone, Utc};

use edgecoop::adapters::{read_trace, CachePolicy, KMeansModel, KMeansOracle, ResultStore};
use edgecoop::domain::{ClusterModel, ClusteringOracle};
use edgecoop::error::OracleStage;
use edgecoop::simulator::{Pretrained, RunOutcome};
use edgecoop::workload::WorkloadBuilder;
use edgecoop::{run_batch, BatchOptions, Error, RunPlan, SimulationConfig, SimulationRun, Workload};

const HOUR: Duration = Duration::from_secs(3600);

fn at(hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2017, 3, 1, hour, minute, 0).unwrap()
}

fn config() -> SimulationConfig {
    SimulationConfig {
        cooperation_threshold: -1.0,
        cache_policy: CachePolicy::Unlimited,
        file_size: 10,
        cache_storage_size: 1000,
        ..SimulationConfig::default()
    }
}

/// Two periods: a and b share x while c wants y, then every client returns
fn workload() -> Arc<Workload> {
    let mut b = WorkloadBuilder::new(HOUR);
    b.push(at(0, 0), "x", "a");
    b.push(at(0, 5), "x", "b");
    b.push(at(0, 10), "y", "c");
    b.push(at(0, 15), "y", "c");
    b.push(at(1, 0), "x", "a");
    b.push(at(1, 5), "y", "c");
    b.push(at(1, 10), "x", "b");
    b.push(at(1, 15), "z", "d");
    Arc::new(b.build().unwrap())
}

// =============================================================================
// Serving Loop
// =============================================================================

mod serving_tests {
    use super::*;

    #[test]
    fn test_new_client_repeating_a_file_hits_after_first_request() {
        let mut b = WorkloadBuilder::new(HOUR);
        b.push(at(0, 0), "y", "a");
        b.push(at(1, 0), "x", "n");
        b.push(at(1, 10), "x", "n");
        b.push(at(1, 20), "x", "n");
        let workload = Arc::new(b.build().unwrap());

        let mut run = SimulationRun::with_cells(config(), workload, 2).unwrap();
        assert_eq!(run.arrange().unwrap(), 2);

        let mut stats = run.serve_period(1).unwrap();
        assert_eq!(stats.requests, 3);
        assert_eq!(stats.downloaded, 10);
        assert_eq!(stats.served, 20);
        assert!((stats.hit_rate() - 20.0 / 30.0).abs() < 1e-12);
        assert_eq!(stats.new_clients.len(), 1);

        run.end_period(&mut stats).unwrap();
        assert!(run.topology().cell_of(stats.new_clients[0]).is_some());
    }

    #[test]
    fn test_full_run_reports_every_tested_period() {
        let run = SimulationRun::new(config(), workload()).unwrap();
        let report = run.execute(&KMeansOracle::default(), None).unwrap();

        assert_eq!(report.periods.len(), 1);
        assert_eq!(report.cells, 2);
        assert_eq!(report.groups, 2);
        assert_eq!(report.requests(), 4);
        assert_eq!(report.served() + report.downloaded(), 40);
        assert!(report.centroids.is_some());
        assert_eq!(report.training.len(), 3);
    }

    #[test]
    fn test_files_limit_skips_unpopular_files() {
        let c = SimulationConfig {
            files_limit: 1,
            ..config()
        };
        let report = SimulationRun::new(c, workload())
            .unwrap()
            .execute(&KMeansOracle::default(), None)
            .unwrap();
        let period = &report.periods[0];
        assert_eq!(period.requests + period.skipped, 4);
        assert!(period.skipped > 0);
    }
}

// =============================================================================
// Placement
// =============================================================================

mod placement_tests {
    use super::*;
    use edgecoop::adapters::ContentStore;
    use edgecoop::assignment::choose_by_similarity;
    use edgecoop::cluster::Topology;
    use edgecoop::domain::{CacheContent, CellId, ClientId, FileId};
    use edgecoop::popularity::{Popularities, PopularityHistory};
    use edgecoop::similarity::SimilarityFormula;

    fn demand(file: usize) -> PopularityHistory {
        let mut h = PopularityHistory::with_periods(1);
        h.record(0, FileId(file), 3);
        h.seal();
        h
    }

    /// Cell 0 holds two clients of file 0; cells 1 and 2 one client of file 1
    fn topology() -> Topology {
        let mut t = Topology::with_cells(3);
        t.assign_client(ClientId(0), &demand(0), CellId(0)).unwrap();
        t.assign_client(ClientId(1), &demand(0), CellId(0)).unwrap();
        t.assign_client(ClientId(2), &demand(1), CellId(1)).unwrap();
        t.assign_client(ClientId(3), &demand(1), CellId(2)).unwrap();
        t.arrange_cooperation(-1.0, SimilarityFormula::Cosine, 0, |_| {
            Box::new(ContentStore::new(CachePolicy::Unlimited, 100)) as Box<dyn CacheContent>
        })
        .unwrap();
        t
    }

    #[test]
    fn test_zero_overlap_goes_to_globally_least_loaded_cell() {
        let t = topology();
        let unseen: Popularities = [(FileId(9), 4)].into_iter().collect();
        let cell =
            choose_by_similarity(&t, SimilarityFormula::Cosine, ClientId(4), &unseen, 0, None)
                .unwrap();
        assert_eq!(cell, CellId(1));
    }

    #[test]
    fn test_similar_client_joins_first_best_storage() {
        let t = topology();
        let similar: Popularities = [(FileId(0), 1)].into_iter().collect();
        let cell =
            choose_by_similarity(&t, SimilarityFormula::Cosine, ClientId(4), &similar, 0, None)
                .unwrap();
        assert_eq!(cell, CellId(0));
    }
}

// =============================================================================
// Oracle Failures and Batches
// =============================================================================

mod batch_tests {
    use super::*;

    struct FailingOracle;

    impl ClusteringOracle for FailingOracle {
        fn fit(&self, _: &[Vec<f64>], _: usize, _: usize) -> edgecoop::Result<Box<dyn ClusterModel>> {
            Err(Error::oracle(OracleStage::Fit, "singular input"))
        }
    }

    #[test]
    fn test_oracle_failure_propagates_from_run() {
        let result = RunPlan::new(config(), workload()).execute(&FailingOracle);
        assert_matches!(
            result,
            Err(Error::OracleFailure {
                stage: OracleStage::Fit,
                ..
            })
        );
    }

    #[tokio::test]
    async fn test_batch_runs_every_config() {
        let plans = vec![
            RunPlan::new(config(), workload()),
            RunPlan::new(
                SimulationConfig {
                    cooperation_threshold: 0.5,
                    ..config()
                },
                workload(),
            ),
        ];
        let outcomes = run_batch(plans, Arc::new(KMeansOracle::default()), BatchOptions::default())
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(RunOutcome::is_success));
        let first = outcomes[0].report().unwrap();
        let second = outcomes[1].report().unwrap();
        assert_eq!(first.requests(), second.requests());
        assert!(second.groups <= first.groups);
    }
}

// =============================================================================
// Trace and Persistence
// =============================================================================

mod persistence_tests {
    use super::*;

    const TRACE: &str = "\
timestamp,file,client
2017-03-01T00:00:00Z,x,a
2017-03-01T00:10:00Z,x,b
2017-03-01T00:20:00Z,y,c
2017-03-01 01:00:00,x,a
2017-03-01 01:30:00,y,c
";

    #[test]
    fn test_trace_to_report() {
        let workload = Arc::new(read_trace(Cursor::new(TRACE), HOUR).unwrap());
        assert_eq!(workload.period_count(), 2);
        assert_eq!(workload.request_count(), 5);

        let report = SimulationRun::new(config(), workload)
            .unwrap()
            .execute(&KMeansOracle::default(), None)
            .unwrap();
        assert_eq!(report.requests(), 2);
        assert!(report.hit_rate() >= 0.0 && report.hit_rate() <= 1.0);
    }

    #[test]
    fn test_reloaded_clustering_reproduces_fresh_run() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        let fresh = SimulationRun::new(config(), workload())
            .unwrap()
            .execute(&KMeansOracle::default(), None)
            .unwrap();
        let centroids = fresh.centroids.clone().unwrap();
        store
            .write_model(&KMeansModel::from_centroids(centroids).unwrap())
            .unwrap();
        store.write_clustering_result(&fresh.training).unwrap();

        let pretrained = Pretrained {
            model: store.read_model().unwrap(),
            assignment: store.read_clustering_result().unwrap(),
        };
        let trained = SimulationConfig {
            is_trained: true,
            ..config()
        };
        let reloaded = RunPlan::new(trained, workload())
            .with_pretrained(pretrained)
            .execute(&FailingFit)
            .unwrap();

        assert!(reloaded.centroids.is_none());
        assert_eq!(reloaded.periods, fresh.periods);
        assert_eq!(reloaded.training, fresh.training);
    }

    /// Oracle that must not be consulted by a reloaded run
    struct FailingFit;

    impl ClusteringOracle for FailingFit {
        fn fit(&self, _: &[Vec<f64>], _: usize, _: usize) -> edgecoop::Result<Box<dyn ClusterModel>> {
            Err(Error::oracle(OracleStage::Fit, "fit called on a reloaded run"))
        }
    }
}
