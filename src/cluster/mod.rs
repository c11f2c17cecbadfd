//! Small cells and cache storages
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐   ┌──────────────────────────────┐
//! │   CacheStorage (group 0)     │   │   CacheStorage (group 1)     │
//! │   aggregated popularity      │   │   aggregated popularity      │
//! │   ContentStore               │   │   ContentStore               │
//! │  ┌───────────┐ ┌───────────┐ │   │  ┌───────────┐               │
//! │  │ SmallCell │ │ SmallCell │ │   │  │ SmallCell │               │
//! │  │  clients  │ │  clients  │ │   │  │  clients  │               │
//! │  └───────────┘ └───────────┘ │   │  └───────────┘               │
//! └──────────────────────────────┘   └──────────────────────────────┘
//! ```
//!
//! Clients belong to exactly one small cell; small cells belong to exactly
//! one cache storage. Both relations are id-based and only change through the
//! transfer operations in [`Topology`], which move aggregated popularity along
//! with membership so a storage always holds the sum of its cells.

mod cooperation;
mod topology;
mod transfer;

#[cfg(test)]
mod proptest;

pub use cooperation::group_by_anchor;
pub use topology::Topology;

use std::collections::BTreeSet;

use crate::domain::{CacheContent, CellId, ClientId, FileId, GroupId};
use crate::popularity::{rank_files, PopularityHistory};

// =============================================================================
// Small Cell
// =============================================================================

/// Edge cell serving a set of clients.
#[derive(Debug, Clone)]
pub struct SmallCell {
    pub id: CellId,
    pub(crate) clients: BTreeSet<ClientId>,
    pub(crate) popularity: PopularityHistory,
    pub(crate) group: Option<GroupId>,
}

impl SmallCell {
    pub fn new(id: CellId) -> Self {
        Self {
            id,
            clients: BTreeSet::new(),
            popularity: PopularityHistory::new(),
            group: None,
        }
    }

    pub fn clients(&self) -> &BTreeSet<ClientId> {
        &self.clients
    }

    /// Number of clients currently assigned
    pub fn load(&self) -> usize {
        self.clients.len()
    }

    /// Sum of the demand of the assigned clients
    pub fn popularity(&self) -> &PopularityHistory {
        &self.popularity
    }

    /// Owning cache storage
    pub fn group(&self) -> Option<GroupId> {
        self.group
    }
}

// =============================================================================
// Cache Storage
// =============================================================================

/// A cooperation group: small cells sharing one logical cache.
pub struct CacheStorage {
    pub id: GroupId,
    pub(crate) cells: Vec<CellId>,
    pub(crate) popularity: PopularityHistory,
    pub(crate) content: Box<dyn CacheContent>,
    /// Bytes served from the cache
    pub served: u64,
    /// Bytes fetched from the origin
    pub downloaded: u64,
}

impl std::fmt::Debug for CacheStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStorage")
            .field("id", &self.id)
            .field("cells", &self.cells)
            .field("capacity", &self.content.capacity())
            .field("space", &self.content.space())
            .field("served", &self.served)
            .field("downloaded", &self.downloaded)
            .finish()
    }
}

impl CacheStorage {
    pub fn new(id: GroupId, content: Box<dyn CacheContent>) -> Self {
        Self {
            id,
            cells: Vec::new(),
            popularity: PopularityHistory::new(),
            content,
            served: 0,
            downloaded: 0,
        }
    }

    /// Member small cells in attachment order
    pub fn cells(&self) -> &[CellId] {
        &self.cells
    }

    /// Sum of the member cells' popularity
    pub fn popularity(&self) -> &PopularityHistory {
        &self.popularity
    }

    pub fn content(&self) -> &dyn CacheContent {
        self.content.as_ref()
    }

    pub fn content_mut(&mut self) -> &mut dyn CacheContent {
        self.content.as_mut()
    }

    pub fn capacity(&self) -> u64 {
        self.content.capacity()
    }

    pub fn space(&self) -> u64 {
        self.content.space()
    }

    /// Files ranked by aggregated cumulative demand at `period`
    pub fn popular_files(&self, period: usize) -> Vec<FileId> {
        rank_files(self.popularity.accumulated(period).iter())
    }

    /// Fraction of requested bytes served from the cache
    pub fn hit_rate(&self) -> f64 {
        let total = self.served + self.downloaded;
        if total == 0 {
            0.0
        } else {
            self.served as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{CachePolicy, ContentStore};

    fn history(requests: &[(usize, usize, u64)]) -> PopularityHistory {
        let mut h = PopularityHistory::with_periods(2);
        for &(period, file, count) in requests {
            h.record(period, FileId(file), count);
        }
        h.seal();
        h
    }

    #[test]
    fn test_storage_ranks_aggregated_cumulative_demand() {
        let mut t = Topology::with_cells(2);
        t.assign_client(ClientId(0), &history(&[(0, 2, 3), (1, 1, 5)]), CellId(0))
            .unwrap();
        t.assign_client(ClientId(1), &history(&[(0, 0, 3)]), CellId(1))
            .unwrap();
        let g = t.add_group(Box::new(ContentStore::new(CachePolicy::Unlimited, 100)));
        t.move_cell(CellId(0), g).unwrap();
        t.move_cell(CellId(1), g).unwrap();

        let storage = t.group(g).unwrap();
        // Ties rank by file id
        assert_eq!(storage.popular_files(0), vec![FileId(0), FileId(2)]);
        assert_eq!(storage.popular_files(1), vec![FileId(1), FileId(0), FileId(2)]);
        assert_eq!(storage.hit_rate(), 0.0);
    }
}
