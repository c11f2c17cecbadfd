//! Domain Layer
//!
//! Value objects shared by every component and the port traits the
//! simulation core depends on.
//!
//! - **Types** (`types.rs`) - Dense identifiers and the request record
//! - **Ports** (`ports.rs`) - Clustering oracle and cache-content contracts

pub mod ports;
pub mod types;

pub use ports::{CacheContent, CachedFile, ClusterModel, ClusteringOracle, MAX_ITERATIONS};
pub use types::{CellId, ClientId, ClusterAssignment, FileId, FileSet, GroupId, PeriodId, Request};
