//! Property-Based Tests for popularity bookkeeping and cooperation
//!
//! # Test Properties
//!
//! 1. **Similarity Bounds**: both formulas are symmetric and lie in [0, 1]
//! 2. **Partition**: cooperation grouping places every cell in one group
//! 3. **Conservation**: a storage always holds the sum of its cells, and a
//!    cell the sum of its clients, under any sequence of transfers
//! 4. **Monotonicity**: cumulative popularity never decreases over periods

#![cfg(test)]

use proptest::prelude::*;

use super::{group_by_anchor, Topology};
use crate::adapters::{CachePolicy, ContentStore};
use crate::domain::{CellId, ClientId, FileId, GroupId};
use crate::popularity::{Popularities, PopularityHistory};
use crate::similarity::SimilarityFormula;

// =============================================================================
// Property Strategies
// =============================================================================

const PERIODS: usize = 4;
const FILES: usize = 6;

/// Demand table over a handful of files
fn popularity_strategy() -> impl Strategy<Value = Popularities> {
    prop::collection::vec((0..FILES, 1u64..20), 0..8)
        .prop_map(|counts| counts.into_iter().map(|(f, c)| (FileId(f), c)).collect())
}

/// Sealed history with requests spread over `PERIODS` periods
fn history_strategy() -> impl Strategy<Value = PopularityHistory> {
    prop::collection::vec((0..PERIODS, 0..FILES, 1u64..5), 0..20).prop_map(|requests| {
        let mut h = PopularityHistory::with_periods(PERIODS);
        for (p, f, c) in requests {
            h.record(p, FileId(f), c);
        }
        h.seal();
        h
    })
}

/// Symmetric matrix with values in [0, 1] and a zero diagonal
fn matrix_strategy() -> impl Strategy<Value = Vec<Vec<f64>>> {
    (1usize..8).prop_flat_map(|n| {
        prop::collection::vec(0.0f64..=1.0, n * n).prop_map(move |values| {
            let mut m = vec![vec![0.0; n]; n];
            for i in 0..n {
                for j in (i + 1)..n {
                    m[i][j] = values[i * n + j];
                    m[j][i] = values[i * n + j];
                }
            }
            m
        })
    })
}

#[derive(Debug, Clone)]
enum Transfer {
    Assign { client: usize, cell: usize },
    Move { cell: usize, group: usize },
}

fn transfer_strategy(cells: usize, groups: usize, clients: usize) -> impl Strategy<Value = Transfer> {
    prop_oneof![
        (0..clients, 0..cells).prop_map(|(client, cell)| Transfer::Assign { client, cell }),
        (0..cells, 0..groups).prop_map(|(cell, group)| Transfer::Move { cell, group }),
    ]
}

fn assert_sum_matches(expected: &[&PopularityHistory], actual: &PopularityHistory) -> Result<(), TestCaseError> {
    for pn in 0..PERIODS {
        for f in 0..FILES {
            let file = FileId(f);
            let sum: u64 = expected.iter().map(|h| h.accumulated(pn).get(file)).sum();
            prop_assert_eq!(actual.accumulated(pn).get(file), sum);
            let sum: u64 = expected.iter().map(|h| h.period(pn).get(file)).sum();
            prop_assert_eq!(actual.period(pn).get(file), sum);
        }
    }
    Ok(())
}

// =============================================================================
// Similarity Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Property: similarity is symmetric and bounded for both formulas.
    #[test]
    fn prop_similarity_symmetric_and_bounded(
        a in popularity_strategy(),
        b in popularity_strategy(),
    ) {
        for formula in [SimilarityFormula::Cosine, SimilarityFormula::Exponential] {
            let ab = formula.similarity(&a, &b, None);
            let ba = formula.similarity(&b, &a, None);
            prop_assert!((ab - ba).abs() < 1e-12, "{} not symmetric: {} vs {}", formula, ab, ba);
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&ab), "{} out of range: {}", formula, ab);
        }
    }

    /// Property: grouping is a partition of the cells and every group starts
    /// with its lowest index.
    #[test]
    fn prop_grouping_is_partition(
        matrix in matrix_strategy(),
        threshold in -0.5f64..=1.0,
    ) {
        let groups = group_by_anchor(&matrix, threshold);
        let mut seen: Vec<usize> = groups.iter().flatten().copied().collect();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..matrix.len()).collect::<Vec<_>>());

        for members in &groups {
            prop_assert!(!members.is_empty());
            prop_assert!(members.windows(2).all(|w| w[0] < w[1]));
            let anchor = members[0];
            for &m in &members[1..] {
                prop_assert!(matrix[anchor][m] >= threshold);
            }
        }
        if threshold < 0.0 {
            prop_assert_eq!(groups.len(), matrix.len());
        }
    }

    /// Property: cumulative popularity is non-decreasing and its last table
    /// equals the sum of every period.
    #[test]
    fn prop_cumulative_is_monotonic(history in history_strategy()) {
        for f in 0..FILES {
            let file = FileId(f);
            for pn in 1..PERIODS {
                prop_assert!(history.accumulated(pn - 1).get(file) <= history.accumulated(pn).get(file));
            }
            let total: u64 = (0..PERIODS).map(|pn| history.period(pn).get(file)).sum();
            prop_assert_eq!(history.accumulated(PERIODS - 1).get(file), total);
        }
    }
}

// =============================================================================
// Conservation Properties
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Property: aggregated popularity is conserved by client and cell
    /// transfers.
    #[test]
    fn prop_transfers_conserve_popularity(
        demands in prop::collection::vec(history_strategy(), 1..6),
        transfers in prop::collection::vec(transfer_strategy(3, 2, 6), 0..30),
    ) {
        let mut topology = Topology::with_cells(3);
        for _ in 0..2 {
            let group = topology.add_group(Box::new(ContentStore::new(CachePolicy::Unlimited, 100)));
            topology.move_cell(CellId(group.index()), group)?;
        }
        topology.move_cell(CellId(2), GroupId(0))?;

        for transfer in transfers {
            match transfer {
                Transfer::Assign { client, cell } if client < demands.len() => {
                    topology.assign_client(ClientId(client), &demands[client], CellId(cell))?;
                }
                Transfer::Assign { .. } => {}
                Transfer::Move { cell, group } => topology.move_cell(CellId(cell), GroupId(group))?,
            }
        }

        for cell in topology.cells() {
            let members: Vec<&PopularityHistory> =
                cell.clients().iter().map(|c| &demands[c.index()]).collect();
            assert_sum_matches(&members, cell.popularity())?;
        }
        for group in topology.groups() {
            let members: Vec<&PopularityHistory> = group
                .cells()
                .iter()
                .map(|&c| topology.cells()[c.index()].popularity())
                .collect();
            assert_sum_matches(&members, group.popularity())?;
        }
    }
}
