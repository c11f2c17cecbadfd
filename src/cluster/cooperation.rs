//! Cooperation grouping
//!
//! Partitions small cells into cache storages with a single greedy pass:
//!
//! 1. A negative threshold disables cooperation; every cell is its own group.
//! 2. Otherwise cells are visited in index order. An unclaimed cell becomes
//!    the anchor of a new group, and every later unclaimed cell whose
//!    similarity to the anchor reaches the threshold joins it.
//!
//! Admission is checked against the anchor only. Two members need not be
//! similar to each other, and a cell close to a non-anchor member but not to
//! the anchor starts or joins another group.

use tracing::{debug, info};

use super::Topology;
use crate::domain::{CacheContent, CellId, GroupId, PeriodId};
use crate::error::Result;
use crate::similarity::{pairwise_matrix, SimilarityFormula};

/// Greedy anchor-based partition of `0..n` given a symmetric similarity
/// matrix. Groups are returned in anchor order, members in index order.
pub fn group_by_anchor(similarity: &[Vec<f64>], threshold: f64) -> Vec<Vec<usize>> {
    let n = similarity.len();
    if threshold < 0.0 {
        return (0..n).map(|i| vec![i]).collect();
    }

    let mut claimed = vec![false; n];
    let mut groups = Vec::new();
    for anchor in 0..n {
        if claimed[anchor] {
            continue;
        }
        claimed[anchor] = true;
        let mut members = vec![anchor];
        for candidate in (anchor + 1)..n {
            if !claimed[candidate] && similarity[anchor][candidate] >= threshold {
                claimed[candidate] = true;
                members.push(candidate);
            }
        }
        groups.push(members);
    }
    groups
}

impl Topology {
    /// Replace the current grouping with a fresh cooperation grouping.
    ///
    /// Cell similarity is measured on cumulative popularity at `period`.
    /// Each group gets a new content store from `make_content`, and every
    /// member is attached through [`Topology::move_cell`] so group
    /// aggregations start empty and are seeded by the transfers.
    pub fn arrange_cooperation<F>(
        &mut self,
        threshold: f64,
        formula: SimilarityFormula,
        period: PeriodId,
        mut make_content: F,
    ) -> Result<usize>
    where
        F: FnMut(GroupId) -> Box<dyn CacheContent>,
    {
        let partition = if threshold < 0.0 {
            (0..self.cells.len()).map(|i| vec![i]).collect()
        } else {
            let tables: Vec<_> = self
                .cells
                .iter()
                .map(|c| c.popularity.accumulated(period))
                .collect();
            let matrix = pairwise_matrix(formula, &tables, None);
            group_by_anchor(&matrix, threshold)
        };

        self.clear_groups();
        for members in &partition {
            let id = GroupId(self.groups.len());
            let group = self.add_group(make_content(id));
            for &cell in members {
                self.move_cell(CellId(cell), group)?;
            }
            debug!(group = %group, cells = ?members, "Cache storage formed");
        }

        info!(
            cells = self.cells.len(),
            groups = self.groups.len(),
            threshold,
            formula = %formula,
            "Cooperation arranged"
        );
        Ok(self.groups.len())
    }
}
