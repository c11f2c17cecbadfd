//! Workload - files, clients and periods of a request trace
//!
//! A [`Workload`] is immutable once built and is shared (behind an `Arc`) by
//! every simulation run that uses the same period duration. All per-run
//! mutable state lives in [`crate::simulator::SimulationRun`].

mod builder;

pub use builder::WorkloadBuilder;

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::ops::RangeInclusive;

use crate::domain::{ClientId, FileId, PeriodId, Request};
use crate::popularity::PopularityHistory;

// =============================================================================
// Registry Records
// =============================================================================

/// A file seen in the trace.
#[derive(Debug, Clone)]
pub struct FileRecord {
    pub id: FileId,
    pub name: String,
    pub popularity: PopularityHistory,
}

/// A client seen in the trace.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: String,
    pub popularity: PopularityHistory,
}

/// One time window of the trace.
#[derive(Debug, Clone)]
pub struct Period {
    pub id: PeriodId,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Requests in timestamp order
    pub requests: Vec<Request>,
    /// Clients with at least one request in this period
    pub clients: BTreeSet<ClientId>,
    /// Clients whose first request falls in this period
    pub first_seen: Vec<ClientId>,
    /// Files ranked by demand during this period
    pub popular_files: Vec<FileId>,
    /// Files ranked by demand accumulated through this period
    pub popular_files_accumulated: Vec<FileId>,
}

// =============================================================================
// Workload
// =============================================================================

/// Immutable request trace split into periods.
#[derive(Debug, Clone)]
pub struct Workload {
    files: Vec<FileRecord>,
    clients: Vec<ClientRecord>,
    periods: Vec<Period>,
    file_index: HashMap<String, FileId>,
    client_index: HashMap<String, ClientId>,
}

impl Workload {
    pub fn files(&self) -> &[FileRecord] {
        &self.files
    }

    pub fn clients(&self) -> &[ClientRecord] {
        &self.clients
    }

    pub fn periods(&self) -> &[Period] {
        &self.periods
    }

    pub fn file(&self, id: FileId) -> &FileRecord {
        &self.files[id.index()]
    }

    pub fn client(&self, id: ClientId) -> &ClientRecord {
        &self.clients[id.index()]
    }

    pub fn period(&self, id: PeriodId) -> Option<&Period> {
        self.periods.get(id)
    }

    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    pub fn period_count(&self) -> usize {
        self.periods.len()
    }

    pub fn file_id(&self, name: &str) -> Option<FileId> {
        self.file_index.get(name).copied()
    }

    pub fn client_id(&self, name: &str) -> Option<ClientId> {
        self.client_index.get(name).copied()
    }

    /// Clients with requests anywhere in `window`, ascending by id
    pub fn clients_in(&self, window: RangeInclusive<PeriodId>) -> Vec<ClientId> {
        let mut seen = BTreeSet::new();
        for period in self.periods.iter().filter(|p| window.contains(&p.id)) {
            seen.extend(period.clients.iter().copied());
        }
        seen.into_iter().collect()
    }

    /// Total requests in the trace
    pub fn request_count(&self) -> usize {
        self.periods.iter().map(|p| p.requests.len()).sum()
    }
}
