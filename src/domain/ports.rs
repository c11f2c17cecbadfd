//! Domain Ports (Port/Adapter Pattern)
//!
//! The simulation core depends on two external collaborators that it only
//! knows through these traits:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Simulation Core                         │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │   ClusteringOracle / ClusterModel │ CacheContent    │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Adapters                              │
//! │        KMeansOracle          │        ContentStore           │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};

use crate::domain::types::FileId;
use crate::error::Result;

// =============================================================================
// Clustering Port
// =============================================================================

/// Iteration budget handed to every fit call.
pub const MAX_ITERATIONS: usize = 50;

/// Port for fitting a clustering model on training vectors.
///
/// A failure from `fit` is an `Error::OracleFailure` and ends the run that
/// requested it.
pub trait ClusteringOracle: Send + Sync {
    /// Fit `k` clusters on `vectors` within `max_iter` iterations.
    fn fit(&self, vectors: &[Vec<f64>], k: usize, max_iter: usize)
        -> Result<Box<dyn ClusterModel>>;
}

/// A fitted clustering model.
pub trait ClusterModel: Send + Sync + std::fmt::Debug {
    /// Predict the cluster id of one vector.
    fn predict(&self, vector: &[f64]) -> Result<usize>;

    /// Cluster centroids, one per cluster id.
    fn centroids(&self) -> &[Vec<f64>];
}

// =============================================================================
// Cache Content Port
// =============================================================================

/// Per-file metadata kept by a cache storage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedFile {
    pub file: FileId,
    /// Bytes of the file currently resident
    pub cached_bytes: u64,
    /// Requests served for this file
    pub count: u64,
    /// Time of the most recent request
    pub last_request: Option<DateTime<Utc>>,
}

impl CachedFile {
    pub fn new(file: FileId) -> Self {
        Self {
            file,
            cached_bytes: 0,
            count: 0,
            last_request: None,
        }
    }

    /// Record a request against this file
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.count += 1;
        self.last_request = Some(at);
    }
}

/// Port for the content-admission policy of a single cache storage.
///
/// The simulator never decides what is resident; it asks the storage how many
/// bytes of the requested file were already cached and updates the returned
/// metadata.
pub trait CacheContent: Send {
    /// Look up `file` (of `size` bytes), returning the bytes resident before
    /// this request and the file's metadata handle. The policy may admit the
    /// file as a side effect.
    fn cache_file(&mut self, file: FileId, size: u64) -> (u64, &mut CachedFile);

    /// True when some bytes of `file` are resident
    fn holds(&self, file: FileId) -> bool;

    /// Total capacity in bytes
    fn capacity(&self) -> u64;

    /// Remaining free bytes
    fn space(&self) -> u64;
}
