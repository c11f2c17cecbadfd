//! Infrastructure Adapters
//!
//! Concrete implementations of the domain ports plus the file formats the
//! simulator reads and writes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Domain Layer                              │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │                    Ports (Traits)                           │ │
//! │  │        ClusteringOracle / ClusterModel │ CacheContent       │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                     Adapters (This Module)                       │
//! │  ┌────────────────────────────────────────────────────────────┐ │
//! │  │ KMeansOracle / KMeansModel │ ContentStore (CachePolicy)    │ │
//! │  │ trace reader               │ ResultStore                   │ │
//! │  └────────────────────────────────────────────────────────────┘ │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use edgecoop::adapters::{CachePolicy, KMeansOracle};
//! use edgecoop::domain::{ClusteringOracle, MAX_ITERATIONS};
//!
//! let oracle = KMeansOracle::default();
//! let model = oracle.fit(&vectors, 4, MAX_ITERATIONS)?;
//! let store = CachePolicy::FillOnce.build(1 << 30);
//! ```

mod content_store;
mod kmeans;
mod results;
mod trace;

pub use content_store::{CachePolicy, ContentStore};
pub use kmeans::{KMeansModel, KMeansOracle, DEFAULT_SEED};
pub use results::{
    read_assignments, write_assignments, write_matrix, write_rates, ResultStore,
    CLUSTERING_MODEL_FILE, CLUSTERING_RESULT_FILE,
};
pub use trace::{load_trace, parse_timestamp, read_trace};
