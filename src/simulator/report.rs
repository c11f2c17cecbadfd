//! Run results

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::period::{rate, PeriodStats};
use crate::domain::{ClusterAssignment, PeriodId};

/// Final counters of one closed period.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodSummary {
    pub period: PeriodId,
    pub end: DateTime<Utc>,
    pub served: u64,
    pub downloaded: u64,
    pub requests: u64,
    pub skipped: u64,
    pub new_clients: usize,
    pub hit_rate: f64,
    pub download_rate: f64,
}

impl From<&PeriodStats> for PeriodSummary {
    fn from(stats: &PeriodStats) -> Self {
        Self {
            period: stats.period,
            end: stats.end,
            served: stats.served,
            downloaded: stats.downloaded,
            requests: stats.requests,
            skipped: stats.skipped,
            new_clients: stats.new_clients.len(),
            hit_rate: stats.hit_rate(),
            download_rate: stats.download_rate(),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub name: String,
    pub train_start: PeriodId,
    pub train_end: PeriodId,
    pub cells: usize,
    pub groups: usize,
    /// Client placements made while serving, including end-of-period moves
    pub reassignments: u64,
    pub periods: Vec<PeriodSummary>,
    /// Cumulative popularity through the last tested period, including
    /// clients placed while serving. One row per cache storage, one column
    /// per file
    pub group_popularity: Vec<Vec<u64>>,
    /// Where training placed each client
    pub training: Vec<ClusterAssignment>,
    /// Centroids of a freshly fitted model; `None` when the model was reloaded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub centroids: Option<Vec<Vec<f64>>>,
}

impl RunReport {
    pub fn served(&self) -> u64 {
        self.periods.iter().map(|p| p.served).sum()
    }

    pub fn downloaded(&self) -> u64 {
        self.periods.iter().map(|p| p.downloaded).sum()
    }

    pub fn requests(&self) -> u64 {
        self.periods.iter().map(|p| p.requests).sum()
    }

    /// Hit rate over every tested period
    pub fn hit_rate(&self) -> f64 {
        rate(self.served(), self.served(), self.downloaded())
    }

    /// Download rate over every tested period
    pub fn download_rate(&self) -> f64 {
        rate(self.downloaded(), self.served(), self.downloaded())
    }

    /// `(period end, hit rate)` pairs in period order
    pub fn hit_rates(&self) -> impl Iterator<Item = (DateTime<Utc>, f64)> + '_ {
        self.periods.iter().map(|p| (p.end, p.hit_rate))
    }
}
