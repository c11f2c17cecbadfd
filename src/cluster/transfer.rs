//! Ownership transfer
//!
//! Moving a member between owners always moves its popularity with it:
//!
//! 1. Leave the old owner's member set and subtract the member's tables from
//!    the old owner's aggregation.
//! 2. Add the member's tables to the new owner's aggregation.
//! 3. Join the new owner's member set and point the member at it.
//!
//! Aggregations are never rebuilt from the member lists.

use tracing::trace;

use super::Topology;
use crate::domain::{CellId, ClientId, GroupId};
use crate::error::{Error, Result};
use crate::popularity::PopularityHistory;

impl Topology {
    /// Move small cell `cell` into cache storage `target`.
    pub fn move_cell(&mut self, cell: CellId, target: GroupId) -> Result<()> {
        if cell.index() >= self.cells.len() {
            return Err(Error::CellNotFound(cell.index()));
        }
        if target.index() >= self.groups.len() {
            return Err(Error::GroupNotFound(target.index()));
        }

        let previous = self.cells[cell.index()].group;
        if previous == Some(target) {
            return Ok(());
        }

        let moving = &self.cells[cell.index()].popularity;
        if let Some(old) = previous {
            let old_group = &mut self.groups[old.index()];
            old_group.cells.retain(|c| *c != cell);
            old_group.popularity.release(moving);
        }
        let new_group = &mut self.groups[target.index()];
        new_group.popularity.absorb(moving);
        new_group.cells.push(cell);
        self.cells[cell.index()].group = Some(target);

        trace!(cell = %cell, from = ?previous, to = %target, "Small cell moved");
        Ok(())
    }

    /// Assign `client`, whose demand is `demand`, to small cell `cell`.
    ///
    /// The client's demand leaves its previous cell and that cell's storage,
    /// and joins the new cell and its storage.
    pub fn assign_client(
        &mut self,
        client: ClientId,
        demand: &PopularityHistory,
        cell: CellId,
    ) -> Result<()> {
        if cell.index() >= self.cells.len() {
            return Err(Error::CellNotFound(cell.index()));
        }

        let previous = self.client_cells.get(&client).copied();
        if previous == Some(cell) {
            return Ok(());
        }

        if let Some(old) = previous {
            let old_cell = &mut self.cells[old.index()];
            old_cell.clients.remove(&client);
            old_cell.popularity.release(demand);
            if let Some(g) = old_cell.group {
                self.groups[g.index()].popularity.release(demand);
            }
        }

        let new_cell = &mut self.cells[cell.index()];
        new_cell.clients.insert(client);
        new_cell.popularity.absorb(demand);
        if let Some(g) = new_cell.group {
            self.groups[g.index()].popularity.absorb(demand);
        }
        self.client_cells.insert(client, cell);

        trace!(client = %client, from = ?previous, to = %cell, "Client assigned");
        Ok(())
    }
}
