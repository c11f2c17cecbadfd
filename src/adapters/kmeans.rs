//! K-Means Clustering Adapter
//!
//! Implements the `ClusteringOracle` port with k-means++ seeding followed by
//! Lloyd iterations. Seeding draws from a `StdRng` seeded per oracle, so the
//! same training vectors always produce the same model.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{ClusterModel, ClusteringOracle};
use crate::error::{Error, OracleStage, Result};

/// Default seed used by the binary
pub const DEFAULT_SEED: u64 = 0x5eed_cace;

// =============================================================================
// Oracle
// =============================================================================

/// Deterministic k-means oracle.
#[derive(Debug, Clone)]
pub struct KMeansOracle {
    seed: u64,
}

impl Default for KMeansOracle {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl KMeansOracle {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// k-means++ seeding. Always yields exactly `k` centroids; when every
    /// remaining vector coincides with a chosen centroid the lowest unused
    /// index is taken.
    fn seed_centroids(&self, vectors: &[Vec<f64>], k: usize) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut chosen = vec![false; vectors.len()];
        let mut centroids = Vec::with_capacity(k);

        let first = rng.gen_range(0..vectors.len());
        chosen[first] = true;
        centroids.push(vectors[first].clone());

        while centroids.len() < k {
            let distances: Vec<f64> = vectors
                .iter()
                .map(|v| {
                    centroids
                        .iter()
                        .map(|c| squared_distance(v, c))
                        .fold(f64::INFINITY, f64::min)
                })
                .collect();
            let total: f64 = distances.iter().sum();

            let mut pick = None;
            if total > 0.0 {
                let target = rng.gen::<f64>() * total;
                let mut cumulative = 0.0;
                for (i, d) in distances.iter().enumerate() {
                    cumulative += d;
                    if *d > 0.0 && cumulative >= target {
                        pick = Some(i);
                        break;
                    }
                }
            }
            let index = match pick.or_else(|| chosen.iter().position(|c| !c)) {
                Some(i) => i,
                None => break,
            };
            chosen[index] = true;
            centroids.push(vectors[index].clone());
        }
        centroids
    }
}

impl ClusteringOracle for KMeansOracle {
    fn fit(&self, vectors: &[Vec<f64>], k: usize, max_iter: usize) -> Result<Box<dyn ClusterModel>> {
        if vectors.is_empty() {
            return Err(Error::oracle(OracleStage::Fit, "no training vectors"));
        }
        if k == 0 {
            return Err(Error::oracle(OracleStage::Fit, "cluster count must be positive"));
        }
        if k > vectors.len() {
            return Err(Error::oracle(
                OracleStage::Fit,
                format!("{} clusters requested for {} vectors", k, vectors.len()),
            ));
        }
        let dims = vectors[0].len();
        if vectors.iter().any(|v| v.len() != dims) {
            return Err(Error::oracle(OracleStage::Fit, "training vectors differ in length"));
        }
        if vectors.iter().flatten().any(|x| !x.is_finite()) {
            return Err(Error::oracle(OracleStage::Fit, "training vectors contain non-finite values"));
        }

        let mut centroids = self.seed_centroids(vectors, k);
        let mut labels = vec![usize::MAX; vectors.len()];
        let mut iterations = 0;

        for _ in 0..max_iter {
            iterations += 1;
            let next: Vec<usize> = vectors.iter().map(|v| nearest(&centroids, v)).collect();
            let changed = next != labels;
            labels = next;
            if !changed {
                break;
            }

            for (c, centroid) in centroids.iter_mut().enumerate() {
                let members: Vec<&Vec<f64>> = vectors
                    .iter()
                    .zip(labels.iter())
                    .filter(|(_, l)| **l == c)
                    .map(|(v, _)| v)
                    .collect();
                // An empty cluster keeps its previous centroid
                if members.is_empty() {
                    continue;
                }
                let mut mean = vec![0.0; dims];
                for v in &members {
                    for (m, x) in mean.iter_mut().zip(v.iter()) {
                        *m += x;
                    }
                }
                for m in mean.iter_mut() {
                    *m /= members.len() as f64;
                }
                *centroid = mean;
            }
        }

        debug!(k, dims, iterations, vectors = vectors.len(), "K-means fitted");
        Ok(Box::new(KMeansModel { centroids }))
    }
}

// =============================================================================
// Model
// =============================================================================

/// Fitted centroids. Serializable so trained runs can be reloaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KMeansModel {
    centroids: Vec<Vec<f64>>,
}

impl KMeansModel {
    /// Rebuild a model from persisted centroids
    pub fn from_centroids(centroids: Vec<Vec<f64>>) -> Result<Self> {
        let dims = match centroids.first() {
            Some(c) => c.len(),
            None => return Err(Error::oracle(OracleStage::Fit, "model has no centroids")),
        };
        if centroids.iter().any(|c| c.len() != dims) {
            return Err(Error::oracle(OracleStage::Fit, "centroids differ in length"));
        }
        Ok(Self { centroids })
    }

    pub fn into_centroids(self) -> Vec<Vec<f64>> {
        self.centroids
    }

    pub fn dimensions(&self) -> usize {
        self.centroids.first().map_or(0, |c| c.len())
    }
}

impl ClusterModel for KMeansModel {
    fn predict(&self, vector: &[f64]) -> Result<usize> {
        if vector.len() != self.dimensions() {
            return Err(Error::oracle(
                OracleStage::Predict,
                format!(
                    "vector has {} dimensions, model has {}",
                    vector.len(),
                    self.dimensions()
                ),
            ));
        }
        if vector.iter().any(|x| !x.is_finite()) {
            return Err(Error::oracle(OracleStage::Predict, "vector contains non-finite values"));
        }
        Ok(nearest(&self.centroids, vector))
    }

    fn centroids(&self) -> &[Vec<f64>] {
        &self.centroids
    }
}

fn squared_distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Index of the closest centroid; ties go to the lower index
fn nearest(centroids: &[Vec<f64>], v: &[f64]) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (i, c) in centroids.iter().enumerate() {
        let d = squared_distance(v, c);
        if d < best_distance {
            best = i;
            best_distance = d;
        }
    }
    best
}
