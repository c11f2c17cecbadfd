//! Popularity Model
//!
//! Per-entity demand counters. Every client, file, small cell and cache
//! storage carries a [`PopularityHistory`]: one table of per-file counts for
//! each period plus the running cumulative table through that period.
//!
//! Aggregated entities (small cells, cache storages) never recompute their
//! tables; they [`absorb`](PopularityHistory::absorb) and
//! [`release`](PopularityHistory::release) the histories of their members as
//! membership changes.

mod ranking;

pub use ranking::{rank_files, top_files};

use std::collections::BTreeMap;

use crate::domain::{FileId, FileSet, PeriodId};

static EMPTY: Popularities = Popularities(BTreeMap::new());

// =============================================================================
// Popularities
// =============================================================================

/// File → request count. Zero counts are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Popularities(BTreeMap<FileId, u64>);

/// File → fraction of the total demand.
pub type Distribution = BTreeMap<FileId, f64>;

impl Popularities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for `file`, 0 when absent
    #[inline]
    pub fn get(&self, file: FileId) -> u64 {
        self.0.get(&file).copied().unwrap_or(0)
    }

    pub fn add(&mut self, file: FileId, count: u64) {
        if count > 0 {
            *self.0.entry(file).or_insert(0) += count;
        }
    }

    /// Remove `count` requests for `file`, dropping the entry at zero
    pub fn subtract(&mut self, file: FileId, count: u64) {
        if let Some(current) = self.0.get_mut(&file) {
            *current = current.saturating_sub(count);
            if *current == 0 {
                self.0.remove(&file);
            }
        }
    }

    /// Total demand
    pub fn sum(&self) -> u64 {
        self.0.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FileId, u64)> + '_ {
        self.0.iter().map(|(f, c)| (*f, *c))
    }

    /// Files with non-zero demand, ascending
    pub fn files(&self) -> impl Iterator<Item = FileId> + '_ {
        self.0.keys().copied()
    }

    pub fn contains(&self, file: FileId) -> bool {
        self.0.contains_key(&file)
    }

    /// Keep only the files in `files`
    pub fn restricted_to(&self, files: &FileSet) -> Popularities {
        Popularities(
            self.0
                .iter()
                .filter(|(f, _)| files.contains(f))
                .map(|(f, c)| (*f, *c))
                .collect(),
        )
    }

    /// Counts divided by the total; empty for an empty table
    pub fn normalize(&self) -> Distribution {
        let total = self.sum();
        if total == 0 {
            return Distribution::new();
        }
        self.0
            .iter()
            .map(|(f, c)| (*f, *c as f64 / total as f64))
            .collect()
    }

    /// Dense vector over files `0..file_count`
    pub fn to_dense(&self, file_count: usize) -> Vec<f64> {
        let mut v = vec![0.0; file_count];
        for (f, c) in self.iter() {
            if f.index() < file_count {
                v[f.index()] = c as f64;
            }
        }
        v
    }

    /// Add every count of `other`
    pub fn merge(&mut self, other: &Popularities) {
        for (f, c) in other.iter() {
            self.add(f, c);
        }
    }

    /// Subtract every count of `other`
    pub fn unmerge(&mut self, other: &Popularities) {
        for (f, c) in other.iter() {
            self.subtract(f, c);
        }
    }
}

impl FromIterator<(FileId, u64)> for Popularities {
    fn from_iter<I: IntoIterator<Item = (FileId, u64)>>(iter: I) -> Self {
        let mut p = Popularities::new();
        for (f, c) in iter {
            p.add(f, c);
        }
        p
    }
}

// =============================================================================
// Popularity History
// =============================================================================

/// Per-period and cumulative popularity of one entity.
///
/// Reads past the end of the tables behave as if no further demand was
/// observed: the per-period table is empty and the cumulative table carries
/// the last known totals forward.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopularityHistory {
    period: Vec<Popularities>,
    accumulated: Vec<Popularities>,
}

impl PopularityHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// History with `periods` empty tables
    pub fn with_periods(periods: usize) -> Self {
        Self {
            period: vec![Popularities::new(); periods],
            accumulated: vec![Popularities::new(); periods],
        }
    }

    /// Number of periods tracked
    pub fn periods(&self) -> usize {
        self.period.len()
    }

    /// Demand observed during `period`
    pub fn period(&self, period: PeriodId) -> &Popularities {
        self.period.get(period).unwrap_or(&EMPTY)
    }

    /// Demand observed from the first period through `period`
    pub fn accumulated(&self, period: PeriodId) -> &Popularities {
        self.accumulated
            .get(period)
            .or_else(|| self.accumulated.last())
            .unwrap_or(&EMPTY)
    }

    /// Demand accumulated strictly before `period`
    pub fn accumulated_before(&self, period: PeriodId) -> &Popularities {
        match period.checked_sub(1) {
            Some(previous) => self.accumulated(previous),
            None => &EMPTY,
        }
    }

    /// Count one or more requests during `period`.
    ///
    /// Only the per-period table changes; call [`seal`](Self::seal) once all
    /// requests are recorded to rebuild the cumulative tables.
    pub fn record(&mut self, period: PeriodId, file: FileId, count: u64) {
        self.grow(period + 1);
        self.period[period].add(file, count);
    }

    /// Rebuild cumulative tables from the per-period tables
    pub fn seal(&mut self) {
        let mut running = Popularities::new();
        self.accumulated = self
            .period
            .iter()
            .map(|p| {
                running.merge(p);
                running.clone()
            })
            .collect();
    }

    /// Net demand inside `[start, end]`.
    ///
    /// Cumulative at `end`, minus cumulative at `start`, plus the per-period
    /// count at `start`.
    pub fn net_demand(&self, start: PeriodId, end: PeriodId) -> Popularities {
        let start_acc = self.accumulated(start);
        let start_period = self.period(start);
        self.accumulated(end)
            .iter()
            .map(|(f, count)| {
                let net = count.saturating_sub(start_acc.get(f)) + start_period.get(f);
                (f, net)
            })
            .collect()
    }

    /// Add every table of `other` into this history, growing as needed
    pub fn absorb(&mut self, other: &PopularityHistory) {
        self.grow(other.periods());
        for (pn, p) in other.period.iter().enumerate() {
            self.period[pn].merge(p);
        }
        for pn in 0..self.accumulated.len() {
            self.accumulated[pn].merge(other.accumulated(pn));
        }
    }

    /// Subtract every table of `other` from this history
    pub fn release(&mut self, other: &PopularityHistory) {
        for (pn, p) in other.period.iter().enumerate().take(self.period.len()) {
            self.period[pn].unmerge(p);
        }
        for pn in 0..self.accumulated.len() {
            self.accumulated[pn].unmerge(other.accumulated(pn));
        }
    }

    fn grow(&mut self, periods: usize) {
        if self.period.len() < periods {
            self.period.resize_with(periods, Popularities::new);
        }
        if self.accumulated.len() < periods {
            let last = self.accumulated.last().cloned().unwrap_or_default();
            self.accumulated.resize(periods, last);
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
