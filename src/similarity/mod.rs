//! Similarity Engine
//!
//! Scores the resemblance of two demand tables. Both tables are restricted to
//! the files they have in common (optionally narrowed by a filter), each
//! restriction is normalized to a distribution, and a [`SimilarityFormula`]
//! compares the two distributions.
//!
//! An empty intersection scores 0; it is not an error.

mod matrix;

pub use matrix::{pairwise_matrix, point_to_set};

use serde::{Deserialize, Serialize};

use crate::domain::FileSet;
use crate::error::{Error, Result};
use crate::popularity::{Distribution, Popularities};

// =============================================================================
// Formula
// =============================================================================

/// Formula comparing two normalized popularity distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SimilarityFormula {
    /// Dot product over the product of L2 norms
    #[default]
    Cosine,
    /// `1 - exp(-dot product)`
    Exponential,
}

impl SimilarityFormula {
    /// Apply the formula to two distributions over the same files
    pub fn apply(&self, a: &Distribution, b: &Distribution) -> f64 {
        match self {
            SimilarityFormula::Cosine => cosine(a, b),
            SimilarityFormula::Exponential => exponential(a, b),
        }
    }

    /// Similarity of two demand tables, optionally restricted to `filter`
    pub fn similarity(&self, a: &Popularities, b: &Popularities, filter: Option<&FileSet>) -> f64 {
        let common: FileSet = a
            .files()
            .filter(|f| b.contains(*f))
            .filter(|f| filter.map_or(true, |keep| keep.contains(f)))
            .collect();
        if common.is_empty() {
            return 0.0;
        }
        self.apply(
            &a.restricted_to(&common).normalize(),
            &b.restricted_to(&common).normalize(),
        )
    }
}

impl std::fmt::Display for SimilarityFormula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SimilarityFormula::Cosine => write!(f, "cosine"),
            SimilarityFormula::Exponential => write!(f, "exponential"),
        }
    }
}

impl std::str::FromStr for SimilarityFormula {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cosine" => Ok(SimilarityFormula::Cosine),
            "exponential" => Ok(SimilarityFormula::Exponential),
            other => Err(Error::Config(format!(
                "unknown similarity formula: {}",
                other
            ))),
        }
    }
}

fn cosine(a: &Distribution, b: &Distribution) -> f64 {
    let (mut aa, mut bb, mut ab) = (0.0, 0.0, 0.0);
    for (file, v) in a {
        let w = b.get(file).copied().unwrap_or(0.0);
        aa += v * v;
        bb += w * w;
        ab += v * w;
    }
    // b may hold files a lacks
    for (file, w) in b {
        if !a.contains_key(file) {
            bb += w * w;
        }
    }
    if aa == 0.0 || bb == 0.0 {
        return 0.0;
    }
    ab / (aa.sqrt() * bb.sqrt())
}

fn exponential(a: &Distribution, b: &Distribution) -> f64 {
    let dot: f64 = a
        .iter()
        .map(|(file, v)| v * b.get(file).copied().unwrap_or(0.0))
        .sum();
    1.0 - (-dot).exp()
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FileId;

    fn pop(entries: &[(usize, u64)]) -> Popularities {
        entries.iter().map(|&(f, c)| (FileId(f), c)).collect()
    }

    #[test]
    fn test_identical_distributions_cosine_is_one() {
        let a = pop(&[(0, 1), (1, 2)]);
        let b = pop(&[(0, 2), (1, 4)]);
        let s = SimilarityFormula::Cosine.similarity(&a, &b, None);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_is_zero() {
        let a = pop(&[(0, 1)]);
        let b = pop(&[(1, 1)]);
        assert_eq!(SimilarityFormula::Cosine.similarity(&a, &b, None), 0.0);
        assert_eq!(SimilarityFormula::Exponential.similarity(&a, &b, None), 0.0);
    }

    #[test]
    fn test_empty_table_is_zero() {
        let a = pop(&[(0, 1)]);
        let empty = Popularities::new();
        assert_eq!(SimilarityFormula::Cosine.similarity(&a, &empty, None), 0.0);
        assert_eq!(SimilarityFormula::Cosine.similarity(&empty, &empty, None), 0.0);
    }

    #[test]
    fn test_only_common_files_count() {
        // File 2 is only in b and must not affect the score
        let a = pop(&[(0, 1), (1, 1)]);
        let b = pop(&[(0, 1), (1, 1), (2, 100)]);
        let s = SimilarityFormula::Cosine.similarity(&a, &b, None);
        assert!((s - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_filter_restricts_comparison() {
        let a = pop(&[(0, 1), (1, 9)]);
        let b = pop(&[(0, 9), (1, 1)]);
        let only_zero: FileSet = [FileId(0)].into();
        let s = SimilarityFormula::Cosine.similarity(&a, &b, Some(&only_zero));
        assert!((s - 1.0).abs() < 1e-12);

        let nothing: FileSet = [FileId(7)].into();
        assert_eq!(
            SimilarityFormula::Cosine.similarity(&a, &b, Some(&nothing)),
            0.0
        );
    }

    #[test]
    fn test_exponential_value() {
        // Single common file: both distributions are {f: 1.0}, dot = 1
        let a = pop(&[(0, 3)]);
        let b = pop(&[(0, 5)]);
        let s = SimilarityFormula::Exponential.similarity(&a, &b, None);
        assert!((s - (1.0 - (-1.0f64).exp())).abs() < 1e-12);
    }

    #[test]
    fn test_formula_parse_and_display() {
        assert_eq!(
            "Cosine".parse::<SimilarityFormula>().unwrap(),
            SimilarityFormula::Cosine
        );
        assert_eq!(
            "exponential".parse::<SimilarityFormula>().unwrap(),
            SimilarityFormula::Exponential
        );
        assert!("jaccard".parse::<SimilarityFormula>().is_err());
        assert_eq!(SimilarityFormula::Exponential.to_string(), "exponential");
    }

    #[test]
    fn test_formula_deserializes_from_name() {
        let f: SimilarityFormula = serde_json::from_str("\"exponential\"").unwrap();
        assert_eq!(f, SimilarityFormula::Exponential);
        assert!(serde_json::from_str::<SimilarityFormula>("\"euclid\"").is_err());
    }
}
