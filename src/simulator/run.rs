//! Simulation run context
//!
//! A [`SimulationRun`] owns every mutable structure of one configuration:
//! the small cells, the cache storages, the client placements and the
//! trained model. The [`Workload`] is shared read-only.
//!
//! # Run Flow
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌────────────────────────────────┐
//! │ train /      │──▶│ arrange      │──▶│ for each tested period:        │
//! │ restore      │   │ cooperation  │   │   serve_period ──▶ end_period  │
//! └──────────────┘   └──────────────┘   └────────────────────────────────┘
//! ```

use std::sync::Arc;
use tracing::{debug, info, instrument};

use super::period::{PeriodPhase, PeriodStats};
use super::report::{PeriodSummary, RunReport};
use crate::adapters::KMeansModel;
use crate::assignment::{
    choose_by_oracle, choose_by_similarity, first_touch, AssignmentMode, TrainedModel, TrainingSet,
};
use crate::cluster::Topology;
use crate::config::SimulationConfig;
use crate::domain::{CellId, ClientId, ClusterAssignment, ClusteringOracle, FileSet, PeriodId};
use crate::error::{Error, Result};
use crate::popularity::top_files;
use crate::workload::Workload;

/// Persisted clustering artifacts for a run that skips training.
#[derive(Debug, Clone)]
pub struct Pretrained {
    pub model: KMeansModel,
    pub assignment: Vec<ClusterAssignment>,
}

/// Mutable state of one configuration run.
#[derive(Debug)]
pub struct SimulationRun {
    config: SimulationConfig,
    workload: Arc<Workload>,
    topology: Topology,
    model: Option<TrainedModel>,
    fitted: bool,
    reassignments: u64,
}

impl SimulationRun {
    /// Validate `config` against `workload` and create an empty run
    pub fn new(config: SimulationConfig, workload: Arc<Workload>) -> Result<Self> {
        config.validate()?;
        let periods = workload.period_count();
        if config.train_end_period >= periods {
            return Err(Error::Config(format!(
                "trainEndPeriod {} outside the {} periods of the trace",
                config.train_end_period, periods
            )));
        }
        if config.test_start_period >= periods {
            return Err(Error::Config(format!(
                "testStartPeriod {} outside the {} periods of the trace",
                config.test_start_period, periods
            )));
        }
        Ok(Self {
            config,
            workload,
            topology: Topology::new(),
            model: None,
            fitted: false,
            reassignments: 0,
        })
    }

    /// Run with `cells` empty small cells and no model, for driving the
    /// serving loop directly
    pub fn with_cells(config: SimulationConfig, workload: Arc<Workload>, cells: usize) -> Result<Self> {
        let mut run = Self::new(config, workload)?;
        run.topology = Topology::with_cells(cells);
        Ok(run)
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    pub fn workload(&self) -> &Workload {
        &self.workload
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn model(&self) -> Option<&TrainedModel> {
        self.model.as_ref()
    }

    pub fn reassignments(&self) -> u64 {
        self.reassignments
    }

    fn training_set(&self) -> Result<TrainingSet> {
        TrainingSet::build(
            &self.workload,
            self.config.train_start_period,
            self.config.train_end_period,
            self.config.training_features,
            self.config.similarity_formula,
        )
    }

    // =========================================================================
    // Training
    // =========================================================================

    /// Fit the oracle on the training window and place the training clients
    pub fn train(&mut self, oracle: &dyn ClusteringOracle) -> Result<()> {
        let set = self.training_set()?;
        let trained = TrainedModel::train(oracle, &set, self.config.cluster_number)?;
        self.install(trained)?;
        self.fitted = true;
        Ok(())
    }

    /// Install a persisted model and training assignment instead of fitting
    pub fn restore(&mut self, pretrained: Pretrained) -> Result<()> {
        let set = self.training_set()?;
        let trained = TrainedModel::restore(
            Box::new(pretrained.model),
            &set,
            &pretrained.assignment,
            &self.workload,
        )?;
        self.install(trained)?;
        self.fitted = false;
        Ok(())
    }

    /// One small cell per cluster; each training client joins its cluster's
    /// cell
    fn install(&mut self, trained: TrainedModel) -> Result<()> {
        let mut topology = Topology::with_cells(trained.clusters());
        for &(client, cluster) in trained.assignment() {
            topology.assign_client(client, &self.workload.client(client).popularity, CellId(cluster))?;
        }
        debug!(
            cells = topology.cells().len(),
            clients = topology.assigned_clients(),
            "Small cells created from clustering"
        );
        self.topology = topology;
        self.model = Some(trained);
        Ok(())
    }

    /// Group the small cells into cache storages
    pub fn arrange(&mut self) -> Result<usize> {
        let policy = self.config.cache_policy;
        let capacity = self.config.cache_storage_size;
        self.topology.arrange_cooperation(
            self.config.cooperation_threshold,
            self.config.similarity_formula,
            self.config.train_end_period,
            |_| policy.build(capacity),
        )
    }

    // =========================================================================
    // Serving
    // =========================================================================

    /// Cell for a returning client under the configured policy
    fn choose(&self, client: ClientId, period: PeriodId, filter: Option<&FileSet>) -> Result<CellId> {
        let popularity = self.workload.client(client).popularity.accumulated(period);
        match self.config.assignment_mode {
            AssignmentMode::Oracle => {
                let model = self
                    .model
                    .as_ref()
                    .ok_or_else(|| Error::Internal("oracle assignment without a trained model".to_string()))?;
                choose_by_oracle(&self.topology, model, client, popularity)
            }
            AssignmentMode::Similarity => choose_by_similarity(
                &self.topology,
                self.config.similarity_formula,
                client,
                popularity,
                period,
                filter,
            ),
        }
    }

    fn place(&mut self, client: ClientId, cell: CellId) -> Result<()> {
        let workload = Arc::clone(&self.workload);
        self.topology
            .assign_client(client, &workload.client(client).popularity, cell)?;
        self.reassignments += 1;
        Ok(())
    }

    /// Serving filter of a period: its top `files_limit` files
    fn serving_filter(&self, period: PeriodId) -> Option<FileSet> {
        let limit = self.config.files_limit;
        if limit == 0 {
            return None;
        }
        self.workload
            .period(period)
            .map(|p| top_files(&p.popular_files, limit))
    }

    /// Reassignment filter at the end of a period
    fn ending_filter(&self, period: PeriodId) -> Option<FileSet> {
        if !self.config.is_period_similarity || self.config.files_limit == 0 {
            return None;
        }
        let limit = self.config.files_limit;
        let current = self.workload.period(period)?;
        let next = self.workload.period(period + 1)?;
        let now = top_files(&current.popular_files, limit);
        let upcoming = top_files(&next.popular_files, limit);
        Some(now.intersection(&upcoming).copied().collect())
    }

    /// Route every request of `period` to its cache storage
    #[instrument(skip(self), fields(run = %self.config.name()))]
    pub fn serve_period(&mut self, period: PeriodId) -> Result<PeriodStats> {
        let workload = Arc::clone(&self.workload);
        let p = workload
            .period(period)
            .ok_or_else(|| Error::Internal(format!("period {} not in workload", period)))?;
        let size = self.config.file_size;
        let filter = self.serving_filter(period);

        let mut stats = PeriodStats::new(period, p.end);
        stats.transition(PeriodPhase::Serving)?;

        for request in &p.requests {
            if let Some(keep) = &filter {
                if !keep.contains(&request.file) {
                    stats.skipped += 1;
                    continue;
                }
            }

            let client = request.client;
            if self.topology.cell_of(client).is_none() {
                let history = &workload.client(client).popularity;
                let cell = if history.accumulated_before(period).is_empty() {
                    stats.new_clients.push(client);
                    first_touch(&self.topology, client, request.file)?
                } else {
                    self.choose(client, period, filter.as_ref())?
                };
                self.place(client, cell)?;
            }

            let cell = self
                .topology
                .cell_of(client)
                .ok_or_else(|| Error::Internal(format!("client {} has no cell", client)))?;
            let group = self.topology.group_of(cell)?;
            let storage = self.topology.group_mut(group)?;
            let (resident, meta) = storage.content_mut().cache_file(request.file, size);
            meta.touch(request.time);
            let resident = resident.min(size);
            storage.served += resident;
            storage.downloaded += size - resident;
            stats.record(resident, size);
        }

        Ok(stats)
    }

    /// Close a served period: compute its rates and reassign its new clients
    #[instrument(skip(self, stats), fields(run = %self.config.name(), period = stats.period))]
    pub fn end_period(&mut self, stats: &mut PeriodStats) -> Result<()> {
        stats.transition(PeriodPhase::EndingPeriod)?;
        let filter = self.ending_filter(stats.period);

        for &client in &stats.new_clients {
            let cell = self.choose(client, stats.period, filter.as_ref())?;
            self.place(client, cell)?;
        }

        stats.transition(PeriodPhase::Closed)?;
        info!(
            end = %stats.end,
            requests = stats.requests,
            served = stats.served,
            downloaded = stats.downloaded,
            hit_rate = stats.hit_rate(),
            new_clients = stats.new_clients.len(),
            "Period closed"
        );
        Ok(())
    }

    // =========================================================================
    // Whole Run
    // =========================================================================

    /// Cumulative popularity through `period` per cache storage
    fn group_popularity(&self, period: PeriodId) -> Vec<Vec<u64>> {
        let files = self.workload.file_count();
        self.topology
            .groups()
            .iter()
            .map(|g| {
                let table = g.popularity().accumulated(period);
                (0..files).map(|f| table.get(crate::domain::FileId(f))).collect()
            })
            .collect()
    }

    /// Train (or restore), arrange cooperation and simulate every tested
    /// period
    #[instrument(skip_all, fields(run = %self.config.name()))]
    pub fn execute(mut self, oracle: &dyn ClusteringOracle, pretrained: Option<Pretrained>) -> Result<RunReport> {
        match (self.config.is_trained, pretrained) {
            (true, Some(p)) => self.restore(p)?,
            (true, None) => {
                return Err(Error::Config(
                    "isTrained is set but no persisted clustering model was provided".to_string(),
                ))
            }
            (false, _) => self.train(oracle)?,
        }
        let groups = self.arrange()?;

        let mut periods = Vec::new();
        for period in self.config.test_start_period..self.workload.period_count() {
            let mut stats = self.serve_period(period)?;
            self.end_period(&mut stats)?;
            periods.push(PeriodSummary::from(&stats));
        }
        let last = self.workload.period_count().saturating_sub(1);
        let group_popularity = self.group_popularity(last);

        let (training, centroids) = match &self.model {
            Some(model) => (
                model.persisted_assignment(&self.workload),
                self.fitted.then(|| model.model().centroids().to_vec()),
            ),
            None => (Vec::new(), None),
        };

        let report = RunReport {
            name: self.config.name(),
            train_start: self.config.train_start_period,
            train_end: self.config.train_end_period,
            cells: self.topology.cells().len(),
            groups,
            reassignments: self.reassignments,
            periods,
            group_popularity,
            training,
            centroids,
        };
        info!(
            periods = report.periods.len(),
            hit_rate = report.hit_rate(),
            download_rate = report.download_rate(),
            "Run finished"
        );
        Ok(report)
    }
}
