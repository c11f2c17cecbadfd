//! Client assignment policy
//!
//! Decides which small cell serves a client:
//!
//! - **Oracle** - featurize the client's cumulative popularity and take the
//!   cell of the predicted cluster.
//! - **Similarity** - score the client against every cache storage and take
//!   the least-loaded cell of the best one; with no positive score, the
//!   least-loaded cell overall.
//! - **First touch** - a client with no prior demand goes to the least-loaded
//!   cell among the storages already holding the requested file.

mod training;

pub use training::{normalize_l2, Featurizer, TrainedModel, TrainingFeatures, TrainingSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cluster::Topology;
use crate::domain::{CellId, ClientId, FileId, FileSet, PeriodId};
use crate::error::{Error, Result};
use crate::popularity::Popularities;
use crate::similarity::{point_to_set, SimilarityFormula};

/// How returning clients are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssignmentMode {
    /// Ask the trained clustering model
    Oracle,
    /// Compare against cache storage popularity
    #[default]
    Similarity,
}

impl std::fmt::Display for AssignmentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AssignmentMode::Oracle => write!(f, "oracle"),
            AssignmentMode::Similarity => write!(f, "similarity"),
        }
    }
}

/// Cell chosen by similarity to each cache storage's cumulative popularity
/// at `period`.
///
/// The best storage must score strictly above 0 and above every earlier
/// storage; otherwise the least-loaded cell of the whole topology wins.
pub fn choose_by_similarity(
    topology: &Topology,
    formula: SimilarityFormula,
    client: ClientId,
    popularity: &Popularities,
    period: PeriodId,
    filter: Option<&FileSet>,
) -> Result<CellId> {
    let tables: Vec<&Popularities> = topology
        .groups()
        .iter()
        .map(|g| g.popularity().accumulated(period))
        .collect();
    let scores = point_to_set(formula, popularity, &tables, filter);

    let mut best = None;
    let mut best_score = 0.0;
    for (i, s) in scores.iter().enumerate() {
        if *s > best_score {
            best = Some(i);
            best_score = *s;
        }
    }

    let chosen = best.and_then(|i| topology.least_loaded(topology.groups()[i].cells().iter().copied()));
    match chosen {
        Some(cell) => {
            debug!(client = %client, cell = %cell, score = best_score, "Assigned by similarity");
            Ok(cell)
        }
        None => {
            let cell = topology.least_loaded_cell()?;
            debug!(client = %client, cell = %cell, "No similar cache storage, least-loaded fallback");
            Ok(cell)
        }
    }
}

/// Cold-start placement for a client whose first request is for `file`.
pub fn first_touch(topology: &Topology, client: ClientId, file: FileId) -> Result<CellId> {
    match topology.least_loaded(topology.cells_holding(file)) {
        Some(cell) => {
            debug!(client = %client, file = %file, cell = %cell, "First touch near cached copy");
            Ok(cell)
        }
        None => {
            let cell = topology.least_loaded_cell()?;
            debug!(client = %client, file = %file, cell = %cell, "First touch, file not cached");
            Ok(cell)
        }
    }
}

/// Cell of the cluster the trained model predicts for `popularity`.
pub fn choose_by_oracle(
    topology: &Topology,
    model: &TrainedModel,
    client: ClientId,
    popularity: &Popularities,
) -> Result<CellId> {
    let cluster = model.predict(popularity)?;
    let cell = CellId(cluster);
    if cell.index() >= topology.cells().len() {
        return Err(Error::CellNotFound(cell.index()));
    }
    debug!(client = %client, cell = %cell, "Assigned by clustering model");
    Ok(cell)
}
