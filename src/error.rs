//! Error types for the edge cooperation simulator

use thiserror::Error;

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while loading inputs or running a simulation
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Metrics registry error
    #[error("Metrics error: {0}")]
    Metrics(#[from] prometheus::Error),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    Config(String),

    /// Duration parse error
    #[error("Failed to parse duration: {0}")]
    DurationParse(String),

    /// Malformed line in a request trace
    #[error("Invalid trace at line {line}: {reason}")]
    InvalidTrace { line: usize, reason: String },

    /// Malformed persisted clustering result
    #[error("Invalid clustering result: {0}")]
    InvalidClusteringResult(String),

    // =========================================================================
    // Simulation Errors
    // =========================================================================
    /// The clustering oracle failed to fit or predict; ends the run
    #[error("Clustering oracle failed during {stage}: {reason}")]
    OracleFailure { stage: OracleStage, reason: String },

    /// A run was asked to place a client but owns no small cells
    #[error("No small cells available for assignment")]
    NoSmallCells,

    /// Small cell id outside the run's topology
    #[error("Small cell not found: {0}")]
    CellNotFound(usize),

    /// Cache storage id outside the run's topology
    #[error("Cache storage not found: {0}")]
    GroupNotFound(usize),

    /// A small cell is serving traffic without an owning cache storage
    #[error("Small cell {0} has no cache storage")]
    UngroupedCell(usize),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Which oracle call failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleStage {
    Fit,
    Predict,
}

impl std::fmt::Display for OracleStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleStage::Fit => write!(f, "fit"),
            OracleStage::Predict => write!(f, "predict"),
        }
    }
}

impl Error {
    /// Build an oracle failure for the given stage
    pub fn oracle(stage: OracleStage, reason: impl Into<String>) -> Self {
        Error::OracleFailure {
            stage,
            reason: reason.into(),
        }
    }

    /// True when the error is confined to one configuration run.
    ///
    /// Input and configuration errors affect every run of a batch; oracle
    /// failures only abort the configuration that hit them.
    pub fn is_run_local(&self) -> bool {
        matches!(self, Error::OracleFailure { .. } | Error::NoSmallCells)
    }
}
