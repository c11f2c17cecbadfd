//! Topology - the per-run graph of clients, small cells and cache storages

use std::collections::HashMap;

use super::{CacheStorage, SmallCell};
use crate::domain::{CacheContent, CellId, ClientId, FileId, GroupId};
use crate::error::{Error, Result};

/// Owns every small cell and cache storage of one simulation run together
/// with the client → cell relation.
#[derive(Debug, Default)]
pub struct Topology {
    pub(crate) cells: Vec<SmallCell>,
    pub(crate) groups: Vec<CacheStorage>,
    pub(crate) client_cells: HashMap<ClientId, CellId>,
}

impl Topology {
    pub fn new() -> Self {
        Self::default()
    }

    /// Topology with `count` empty, ungrouped small cells
    pub fn with_cells(count: usize) -> Self {
        let mut t = Self::new();
        for _ in 0..count {
            t.add_cell();
        }
        t
    }

    pub fn add_cell(&mut self) -> CellId {
        let id = CellId(self.cells.len());
        self.cells.push(SmallCell::new(id));
        id
    }

    /// Add an empty cache storage
    pub fn add_group(&mut self, content: Box<dyn CacheContent>) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(CacheStorage::new(id, content));
        id
    }

    /// Drop every cache storage and detach all cells
    pub(crate) fn clear_groups(&mut self) {
        self.groups.clear();
        for cell in self.cells.iter_mut() {
            cell.group = None;
        }
    }

    pub fn cells(&self) -> &[SmallCell] {
        &self.cells
    }

    pub fn groups(&self) -> &[CacheStorage] {
        &self.groups
    }

    pub fn cell(&self, id: CellId) -> Result<&SmallCell> {
        self.cells.get(id.index()).ok_or(Error::CellNotFound(id.index()))
    }

    pub fn group(&self, id: GroupId) -> Result<&CacheStorage> {
        self.groups
            .get(id.index())
            .ok_or(Error::GroupNotFound(id.index()))
    }

    pub fn group_mut(&mut self, id: GroupId) -> Result<&mut CacheStorage> {
        self.groups
            .get_mut(id.index())
            .ok_or(Error::GroupNotFound(id.index()))
    }

    /// Cell the client is currently assigned to
    pub fn cell_of(&self, client: ClientId) -> Option<CellId> {
        self.client_cells.get(&client).copied()
    }

    /// Cache storage that owns `cell`
    pub fn group_of(&self, cell: CellId) -> Result<GroupId> {
        self.cell(cell)?
            .group
            .ok_or(Error::UngroupedCell(cell.index()))
    }

    /// Cell with the fewest clients among `candidates`.
    ///
    /// Ties go to the lowest cell id.
    pub fn least_loaded<I>(&self, candidates: I) -> Option<CellId>
    where
        I: IntoIterator<Item = CellId>,
    {
        candidates
            .into_iter()
            .filter_map(|id| self.cells.get(id.index()))
            .min_by_key(|cell| (cell.load(), cell.id))
            .map(|cell| cell.id)
    }

    /// Cell with the fewest clients across the whole run
    pub fn least_loaded_cell(&self) -> Result<CellId> {
        self.least_loaded(self.cells.iter().map(|c| c.id))
            .ok_or(Error::NoSmallCells)
    }

    /// Cells whose cache storage holds some bytes of `file`
    pub fn cells_holding(&self, file: FileId) -> Vec<CellId> {
        self.groups
            .iter()
            .filter(|g| g.content.holds(file))
            .flat_map(|g| g.cells.iter().copied())
            .collect()
    }

    /// Number of clients with a cell
    pub fn assigned_clients(&self) -> usize {
        self.client_cells.len()
    }
}
