//! Set-level similarity computations

use super::SimilarityFormula;
use crate::domain::FileSet;
use crate::popularity::Popularities;

/// Symmetric |items|×|items| similarity matrix.
///
/// Only the upper triangle is computed and mirrored; the diagonal stays 0
/// since an entity is never compared with itself.
pub fn pairwise_matrix(
    formula: SimilarityFormula,
    items: &[&Popularities],
    filter: Option<&FileSet>,
) -> Vec<Vec<f64>> {
    let n = items.len();
    let mut m = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in (i + 1)..n {
            let s = formula.similarity(items[i], items[j], filter);
            m[i][j] = s;
            m[j][i] = s;
        }
    }
    m
}

/// Similarity of one entity to each member of a set.
pub fn point_to_set(
    formula: SimilarityFormula,
    point: &Popularities,
    set: &[&Popularities],
    filter: Option<&FileSet>,
) -> Vec<f64> {
    set.iter()
        .map(|other| formula.similarity(point, other, filter))
        .collect()
}
