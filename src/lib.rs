//! edgecoop - Cooperative Edge Caching Simulator
//!
//! Replays a timestamped request trace against a network of small cells that
//! cache content for the clients they serve. Clients are grouped into small
//! cells by clustering their request history; small cells whose demand is
//! alike share one cache storage. Each configuration of a batch reports the
//! hit rate and download rate of every tested period.
//!
//! # Architecture
//!
//! ```text
//!   trace ──▶ Workload ──▶ SimulationRun ──▶ RunReport ──▶ ResultStore
//!                │             │  ▲
//!                │             ▼  │
//!                │        Topology (cells, cache storages)
//!                │             │
//!                └──▶ PopularityHistory / similarity / clustering oracle
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Trace reader, k-means oracle, cache content, result files
//! - [`assignment`] - Training set, trained model and client placement
//! - [`cluster`] - Small cells, cache storages and cooperation
//! - [`config`] - Batch configuration
//! - [`domain`] - Identifiers and port traits
//! - [`error`] - Error types
//! - [`metrics`] - Prometheus metrics of a batch
//! - [`popularity`] - Per-period popularity tables
//! - [`similarity`] - Popularity similarity formulas
//! - [`simulator`] - Run and batch drivers
//! - [`workload`] - Interned, period-sliced trace

pub mod adapters;
pub mod assignment;
pub mod cluster;
pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod popularity;
pub mod similarity;
pub mod simulator;
pub mod workload;

// Re-export commonly used types
pub use config::SimulationConfig;
pub use error::{Error, Result};
pub use simulator::{run_batch, BatchOptions, RunOutcome, RunPlan, RunReport, SimulationRun};
pub use workload::Workload;
