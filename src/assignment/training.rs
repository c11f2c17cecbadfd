//! Training the clustering oracle
//!
//! ```text
//!   clients seen in [train_start, train_end]
//!                  │ net demand per client
//!                  ▼
//!   ┌─────────────────────────────┐
//!   │ Featurizer                  │  popularity: dense counts over files
//!   │   (rows scaled to unit L2)  │  similarity: score vs each training client
//!   └─────────────────────────────┘
//!                  │
//!                  ▼
//!        ClusteringOracle::fit(k, 50)  ──▶  one small cell per centroid
//! ```
//!
//! The same featurizer turns a client's cumulative popularity into a
//! prediction vector later in the run, so training and prediction vectors
//! always share one shape.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::domain::{ClientId, ClusterAssignment, ClusterModel, ClusteringOracle, PeriodId, MAX_ITERATIONS};
use crate::error::{Error, OracleStage, Result};
use crate::popularity::Popularities;
use crate::similarity::{point_to_set, SimilarityFormula};
use crate::workload::Workload;

/// Feature space the oracle is trained in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrainingFeatures {
    /// Per-file demand
    #[default]
    Popularity,
    /// Similarity to every training client
    Similarity,
}

impl std::fmt::Display for TrainingFeatures {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrainingFeatures::Popularity => write!(f, "popularity"),
            TrainingFeatures::Similarity => write!(f, "similarity"),
        }
    }
}

/// Scale a vector to unit L2 norm; all-zero vectors are left as they are
pub fn normalize_l2(v: &mut [f64]) {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        for x in v.iter_mut() {
            *x /= norm;
        }
    }
}

// =============================================================================
// Featurizer
// =============================================================================

/// Maps a popularity table to an oracle vector.
#[derive(Debug, Clone)]
pub struct Featurizer {
    features: TrainingFeatures,
    formula: SimilarityFormula,
    file_count: usize,
    /// Net demand of the training clients, used in similarity mode
    reference: Vec<Popularities>,
}

impl Featurizer {
    pub fn features(&self) -> TrainingFeatures {
        self.features
    }

    /// Length of every produced vector
    pub fn dimensions(&self) -> usize {
        match self.features {
            TrainingFeatures::Popularity => self.file_count,
            TrainingFeatures::Similarity => self.reference.len(),
        }
    }

    pub fn featurize(&self, popularity: &Popularities) -> Vec<f64> {
        let mut v = match self.features {
            TrainingFeatures::Popularity => popularity.to_dense(self.file_count),
            TrainingFeatures::Similarity => {
                let set: Vec<&Popularities> = self.reference.iter().collect();
                point_to_set(self.formula, popularity, &set, None)
            }
        };
        normalize_l2(&mut v);
        v
    }
}

// =============================================================================
// Training Set
// =============================================================================

/// Clients of the training window with their feature vectors.
#[derive(Debug, Clone)]
pub struct TrainingSet {
    pub start: PeriodId,
    pub end: PeriodId,
    clients: Vec<ClientId>,
    vectors: Vec<Vec<f64>>,
    featurizer: Featurizer,
}

impl TrainingSet {
    /// Collect every client active in `[start, end]` and featurize its net
    /// demand over the window.
    pub fn build(
        workload: &Workload,
        start: PeriodId,
        end: PeriodId,
        features: TrainingFeatures,
        formula: SimilarityFormula,
    ) -> Result<Self> {
        if start > end || end >= workload.period_count() {
            return Err(Error::Config(format!(
                "training window {}..={} outside the {} periods of the trace",
                start,
                end,
                workload.period_count()
            )));
        }

        let clients = workload.clients_in(start..=end);
        let demand: Vec<Popularities> = clients
            .iter()
            .map(|c| workload.client(*c).popularity.net_demand(start, end))
            .collect();

        let featurizer = Featurizer {
            features,
            formula,
            file_count: workload.file_count(),
            reference: match features {
                TrainingFeatures::Popularity => Vec::new(),
                TrainingFeatures::Similarity => demand.clone(),
            },
        };
        let vectors = demand.iter().map(|d| featurizer.featurize(d)).collect();

        debug!(
            start,
            end,
            clients = clients.len(),
            dims = featurizer.dimensions(),
            features = %features,
            "Training set built"
        );
        Ok(Self {
            start,
            end,
            clients,
            vectors,
            featurizer,
        })
    }

    pub fn clients(&self) -> &[ClientId] {
        &self.clients
    }

    pub fn vectors(&self) -> &[Vec<f64>] {
        &self.vectors
    }

    pub fn featurizer(&self) -> &Featurizer {
        &self.featurizer
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

// =============================================================================
// Trained Model
// =============================================================================

/// A fitted model together with how to featurize clients for it and where it
/// placed the training clients.
pub struct TrainedModel {
    model: Box<dyn ClusterModel>,
    featurizer: Featurizer,
    assignment: Vec<(ClientId, usize)>,
}

impl std::fmt::Debug for TrainedModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrainedModel")
            .field("clusters", &self.model.centroids().len())
            .field("features", &self.featurizer.features)
            .field("training_clients", &self.assignment.len())
            .finish()
    }
}

impl TrainedModel {
    /// Fit `k` clusters and record the guess for every training client
    pub fn train(oracle: &dyn ClusteringOracle, set: &TrainingSet, k: usize) -> Result<Self> {
        let model = oracle.fit(set.vectors(), k, MAX_ITERATIONS)?;
        let clusters = model.centroids().len();

        let mut assignment = Vec::with_capacity(set.len());
        for (client, vector) in set.clients().iter().zip(set.vectors()) {
            let guess = model.predict(vector)?;
            if guess >= clusters {
                return Err(Error::oracle(
                    OracleStage::Predict,
                    format!("cluster {} outside the {} fitted clusters", guess, clusters),
                ));
            }
            assignment.push((*client, guess));
        }

        info!(
            clusters,
            clients = assignment.len(),
            window = %format!("{}..={}", set.start, set.end),
            "Clustering model trained"
        );
        Ok(Self {
            model,
            featurizer: set.featurizer().clone(),
            assignment,
        })
    }

    /// Rebuild a trained model from a persisted model and training
    /// assignment. Client names are resolved against `workload`.
    pub fn restore(
        model: Box<dyn ClusterModel>,
        set: &TrainingSet,
        persisted: &[ClusterAssignment],
        workload: &Workload,
    ) -> Result<Self> {
        let clusters = model.centroids().len();
        let dims = set.featurizer().dimensions();
        if model.centroids().iter().any(|c| c.len() != dims) {
            return Err(Error::InvalidClusteringResult(format!(
                "model expects {} features per client, training window yields {}",
                model.centroids().first().map_or(0, |c| c.len()),
                dims
            )));
        }

        let mut seen = HashSet::new();
        let mut assignment = Vec::with_capacity(persisted.len());
        for entry in persisted {
            let client = workload.client_id(&entry.client).ok_or_else(|| {
                Error::InvalidClusteringResult(format!("unknown client '{}'", entry.client))
            })?;
            if entry.cluster >= clusters {
                return Err(Error::InvalidClusteringResult(format!(
                    "client '{}' assigned to cluster {} of {}",
                    entry.client, entry.cluster, clusters
                )));
            }
            if !seen.insert(client) {
                return Err(Error::InvalidClusteringResult(format!(
                    "client '{}' listed twice",
                    entry.client
                )));
            }
            assignment.push((client, entry.cluster));
        }

        info!(clusters, clients = assignment.len(), "Clustering model restored");
        Ok(Self {
            model,
            featurizer: set.featurizer().clone(),
            assignment,
        })
    }

    pub fn model(&self) -> &dyn ClusterModel {
        self.model.as_ref()
    }

    pub fn clusters(&self) -> usize {
        self.model.centroids().len()
    }

    pub fn featurizer(&self) -> &Featurizer {
        &self.featurizer
    }

    /// Training clients with their cluster ids
    pub fn assignment(&self) -> &[(ClientId, usize)] {
        &self.assignment
    }

    /// Cluster id for a client with the given cumulative popularity
    pub fn predict(&self, popularity: &Popularities) -> Result<usize> {
        let vector = self.featurizer.featurize(popularity);
        let cluster = self.model.predict(&vector)?;
        if cluster >= self.clusters() {
            return Err(Error::oracle(
                OracleStage::Predict,
                format!("cluster {} outside the {} fitted clusters", cluster, self.clusters()),
            ));
        }
        Ok(cluster)
    }

    /// Persistable form of the training assignment
    pub fn persisted_assignment(&self, workload: &Workload) -> Vec<ClusterAssignment> {
        self.assignment
            .iter()
            .map(|(client, cluster)| ClusterAssignment {
                client: workload.client(*client).name.clone(),
                cluster: *cluster,
            })
            .collect()
    }
}
