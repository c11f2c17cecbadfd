//! Prometheus recorder for simulation batches
//!
//! Every metric is labelled by run name so one scrape file covers a whole
//! batch. The registry is owned by the recorder rather than the process-wide
//! default, which keeps concurrent batches (and tests) apart.

use prometheus::{Encoder, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder};
use std::path::Path;
use tracing::info;

use crate::error::Result;
use crate::simulator::{RunOutcome, RunReport};

/// Metric families filled from run outcomes.
pub struct SimulationMetrics {
    registry: Registry,
    served_bytes: IntCounterVec,
    downloaded_bytes: IntCounterVec,
    requests: IntCounterVec,
    skipped_requests: IntCounterVec,
    reassignments: IntCounterVec,
    runs: IntCounterVec,
    hit_rate: GaugeVec,
    cache_storages: GaugeVec,
}

impl SimulationMetrics {
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let served_bytes = IntCounterVec::new(
            Opts::new("edgecoop_served_bytes_total", "Bytes served from cache storages"),
            &["run"],
        )?;
        let downloaded_bytes = IntCounterVec::new(
            Opts::new("edgecoop_downloaded_bytes_total", "Bytes fetched from the origin"),
            &["run"],
        )?;
        let requests = IntCounterVec::new(
            Opts::new("edgecoop_requests_total", "Requests routed to a cache storage"),
            &["run"],
        )?;
        let skipped_requests = IntCounterVec::new(
            Opts::new(
                "edgecoop_skipped_requests_total",
                "Requests outside the period file filter",
            ),
            &["run"],
        )?;
        let reassignments = IntCounterVec::new(
            Opts::new("edgecoop_reassignments_total", "Client placements while serving"),
            &["run"],
        )?;
        let runs = IntCounterVec::new(
            Opts::new("edgecoop_runs_total", "Finished runs by status"),
            &["status"],
        )?;
        let hit_rate = GaugeVec::new(
            Opts::new("edgecoop_hit_rate", "Hit rate over every tested period"),
            &["run"],
        )?;
        let cache_storages = GaugeVec::new(
            Opts::new("edgecoop_cache_storages", "Cache storages after cooperation"),
            &["run"],
        )?;

        registry.register(Box::new(served_bytes.clone()))?;
        registry.register(Box::new(downloaded_bytes.clone()))?;
        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(skipped_requests.clone()))?;
        registry.register(Box::new(reassignments.clone()))?;
        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(hit_rate.clone()))?;
        registry.register(Box::new(cache_storages.clone()))?;

        Ok(Self {
            registry,
            served_bytes,
            downloaded_bytes,
            requests,
            skipped_requests,
            reassignments,
            runs,
            hit_rate,
            cache_storages,
        })
    }

    /// Account one batch outcome
    pub fn record(&self, outcome: &RunOutcome) {
        match outcome {
            RunOutcome::Completed(report) => {
                self.runs.with_label_values(&["completed"]).inc();
                self.record_report(report);
            }
            RunOutcome::Failed { .. } => {
                self.runs.with_label_values(&["failed"]).inc();
            }
        }
    }

    fn record_report(&self, report: &RunReport) {
        let run = [report.name.as_str()];
        let skipped: u64 = report.periods.iter().map(|p| p.skipped).sum();

        self.served_bytes.with_label_values(&run).inc_by(report.served());
        self.downloaded_bytes
            .with_label_values(&run)
            .inc_by(report.downloaded());
        self.requests.with_label_values(&run).inc_by(report.requests());
        self.skipped_requests.with_label_values(&run).inc_by(skipped);
        self.reassignments
            .with_label_values(&run)
            .inc_by(report.reassignments);
        self.hit_rate.with_label_values(&run).set(report.hit_rate());
        self.cache_storages
            .with_label_values(&run)
            .set(report.groups as f64);
    }

    /// Render every metric in the Prometheus text format
    pub fn encode(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write [`encode`](Self::encode) output to `path`
    pub fn write_to(&self, path: &Path) -> Result<()> {
        std::fs::write(path, self.encode()?)?;
        info!(path = %path.display(), "Metrics written");
        Ok(())
    }
}
