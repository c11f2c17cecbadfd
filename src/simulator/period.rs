//! Period lifecycle
//!
//! ```text
//!   Idle ──▶ Serving ──▶ EndingPeriod ──▶ Closed
//! ```
//!
//! A period serves its requests, computes its rates and reassigns the
//! clients it saw for the first time. Phases only move forward.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::{ClientId, PeriodId};
use crate::error::{Error, Result};

// =============================================================================
// Period State Machine
// =============================================================================

/// Phases of one simulated period
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum PeriodPhase {
    /// Not started
    Idle,
    /// Requests are being routed to cache storages
    Serving,
    /// Rates computed, new clients being reassigned
    EndingPeriod,
    /// Done; counters are final
    Closed,
}

impl PeriodPhase {
    /// Phase that may follow this one
    pub fn next(self) -> Option<PeriodPhase> {
        match self {
            PeriodPhase::Idle => Some(PeriodPhase::Serving),
            PeriodPhase::Serving => Some(PeriodPhase::EndingPeriod),
            PeriodPhase::EndingPeriod => Some(PeriodPhase::Closed),
            PeriodPhase::Closed => None,
        }
    }
}

impl std::fmt::Display for PeriodPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PeriodPhase::Idle => write!(f, "Idle"),
            PeriodPhase::Serving => write!(f, "Serving"),
            PeriodPhase::EndingPeriod => write!(f, "EndingPeriod"),
            PeriodPhase::Closed => write!(f, "Closed"),
        }
    }
}

/// Ratio of `part` to `served + downloaded`; 0 without traffic
pub fn rate(part: u64, served: u64, downloaded: u64) -> f64 {
    let total = served + downloaded;
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

// =============================================================================
// Period Statistics
// =============================================================================

/// Counters of one period while it is simulated.
#[derive(Debug, Clone)]
pub struct PeriodStats {
    pub period: PeriodId,
    pub end: DateTime<Utc>,
    phase: PeriodPhase,
    /// Bytes served from cache storages
    pub served: u64,
    /// Bytes fetched from the origin
    pub downloaded: u64,
    /// Requests routed to a cache storage
    pub requests: u64,
    /// Requests outside the period's file filter
    pub skipped: u64,
    /// Clients placed by first touch during this period
    pub new_clients: Vec<ClientId>,
}

impl PeriodStats {
    pub fn new(period: PeriodId, end: DateTime<Utc>) -> Self {
        Self {
            period,
            end,
            phase: PeriodPhase::Idle,
            served: 0,
            downloaded: 0,
            requests: 0,
            skipped: 0,
            new_clients: Vec::new(),
        }
    }

    pub fn phase(&self) -> PeriodPhase {
        self.phase
    }

    /// Advance to `to`, which must directly follow the current phase
    pub fn transition(&mut self, to: PeriodPhase) -> Result<()> {
        if self.phase.next() != Some(to) {
            return Err(Error::Internal(format!(
                "period {} cannot move from {} to {}",
                self.period, self.phase, to
            )));
        }
        self.phase = to;
        Ok(())
    }

    /// Account one routed request of `size` bytes with `resident` bytes cached
    pub fn record(&mut self, resident: u64, size: u64) {
        self.requests += 1;
        self.served += resident;
        self.downloaded += size.saturating_sub(resident);
    }

    pub fn hit_rate(&self) -> f64 {
        rate(self.served, self.served, self.downloaded)
    }

    pub fn download_rate(&self) -> f64 {
        rate(self.downloaded, self.served, self.downloaded)
    }
}
