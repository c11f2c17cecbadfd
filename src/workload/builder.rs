//! Workload construction from raw requests

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashMap};
use std::time::Duration;
use tracing::debug;

use super::{ClientRecord, FileRecord, Period, Workload};
use crate::domain::{ClientId, FileId, Request};
use crate::error::{Error, Result};
use crate::popularity::{rank_files, PopularityHistory};

/// Collects raw requests and splits them into fixed-length periods.
///
/// Periods start at the earliest timestamp. Files and clients receive dense
/// ids in order of first appearance after sorting by time.
#[derive(Debug)]
pub struct WorkloadBuilder {
    period_duration: Duration,
    raw: Vec<(DateTime<Utc>, String, String)>,
}

impl WorkloadBuilder {
    pub fn new(period_duration: Duration) -> Self {
        Self {
            period_duration,
            raw: Vec::new(),
        }
    }

    /// Add one request for `file` by `client` at `time`
    pub fn push(&mut self, time: DateTime<Utc>, file: impl Into<String>, client: impl Into<String>) {
        self.raw.push((time, file.into(), client.into()));
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    /// Sort, bucket into periods and tally popularity
    pub fn build(mut self) -> Result<Workload> {
        let period_secs = self.period_duration.as_secs() as i64;
        if period_secs <= 0 {
            return Err(Error::Config(
                "period duration must be at least one second".to_string(),
            ));
        }
        let step = chrono::Duration::seconds(period_secs);

        self.raw.sort_by_key(|(time, _, _)| *time);
        let origin = match self.raw.first() {
            Some((time, _, _)) => *time,
            None => {
                return Err(Error::InvalidTrace {
                    line: 0,
                    reason: "trace contains no requests".to_string(),
                })
            }
        };
        let period_of = |time: DateTime<Utc>| ((time - origin).num_seconds() / period_secs) as usize;
        let period_count = self
            .raw
            .last()
            .map(|(time, _, _)| period_of(*time) + 1)
            .unwrap_or(1);

        let mut files: Vec<FileRecord> = Vec::new();
        let mut clients: Vec<ClientRecord> = Vec::new();
        let mut file_index: HashMap<String, FileId> = HashMap::new();
        let mut client_index: HashMap<String, ClientId> = HashMap::new();
        let mut periods: Vec<Period> = (0..period_count)
            .map(|id| {
                let start = origin + step * id as i32;
                Period {
                    id,
                    start,
                    end: start + step,
                    requests: Vec::new(),
                    clients: BTreeSet::new(),
                    first_seen: Vec::new(),
                    popular_files: Vec::new(),
                    popular_files_accumulated: Vec::new(),
                }
            })
            .collect();

        for (time, file_name, client_name) in self.raw {
            let pn = period_of(time);

            let file = *file_index.entry(file_name.clone()).or_insert_with(|| {
                let id = FileId(files.len());
                files.push(FileRecord {
                    id,
                    name: file_name,
                    popularity: PopularityHistory::with_periods(period_count),
                });
                id
            });
            let client = match client_index.get(&client_name) {
                Some(id) => *id,
                None => {
                    let id = ClientId(clients.len());
                    clients.push(ClientRecord {
                        id,
                        name: client_name.clone(),
                        popularity: PopularityHistory::with_periods(period_count),
                    });
                    client_index.insert(client_name, id);
                    periods[pn].first_seen.push(id);
                    id
                }
            };

            files[file.index()].popularity.record(pn, file, 1);
            clients[client.index()].popularity.record(pn, file, 1);
            periods[pn].clients.insert(client);
            periods[pn].requests.push(Request::new(time, file, client));
        }

        for f in files.iter_mut() {
            f.popularity.seal();
        }
        for c in clients.iter_mut() {
            c.popularity.seal();
        }
        for period in periods.iter_mut() {
            let pn = period.id;
            period.popular_files =
                rank_files(files.iter().map(|f| (f.id, f.popularity.period(pn).get(f.id))));
            period.popular_files_accumulated =
                rank_files(files.iter().map(|f| (f.id, f.popularity.accumulated(pn).get(f.id))));
        }

        debug!(
            periods = period_count,
            files = files.len(),
            clients = clients.len(),
            "Workload built"
        );

        Ok(Workload {
            files,
            clients,
            periods,
            file_index,
            client_index,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, minute, 0).unwrap()
    }

    fn hourly() -> WorkloadBuilder {
        WorkloadBuilder::new(Duration::from_secs(3600))
    }

    #[test]
    fn test_requests_are_bucketed_by_period() {
        let mut b = hourly();
        b.push(at(0, 10), "x", "c1");
        b.push(at(0, 50), "x", "c2");
        b.push(at(2, 15), "y", "c1");
        let w = b.build().unwrap();

        assert_eq!(w.period_count(), 3);
        assert_eq!(w.periods()[0].requests.len(), 2);
        assert!(w.periods()[1].requests.is_empty());
        assert_eq!(w.periods()[2].requests.len(), 1);
        assert_eq!(w.periods()[1].start, at(1, 10));
        assert_eq!(w.periods()[1].end, at(2, 10));
    }

    #[test]
    fn test_out_of_order_input_is_sorted() {
        let mut b = hourly();
        b.push(at(1, 0), "late", "c1");
        b.push(at(0, 0), "early", "c2");
        let w = b.build().unwrap();

        // First appearance after sorting decides ids
        assert_eq!(w.file_id("early"), Some(FileId(0)));
        assert_eq!(w.client_id("c2"), Some(ClientId(0)));
        let times: Vec<_> = w
            .periods()
            .iter()
            .flat_map(|p| p.requests.iter().map(|r| r.time))
            .collect();
        assert!(times.windows(2).all(|t| t[0] <= t[1]));
    }

    #[test]
    fn test_popularity_tallies() {
        let mut b = hourly();
        b.push(at(0, 0), "x", "c1");
        b.push(at(0, 1), "x", "c1");
        b.push(at(1, 0), "x", "c2");
        let w = b.build().unwrap();

        let x = w.file_id("x").unwrap();
        let c1 = w.client_id("c1").unwrap();
        assert_eq!(w.file(x).popularity.period(0).get(x), 2);
        assert_eq!(w.file(x).popularity.accumulated(1).get(x), 3);
        assert_eq!(w.client(c1).popularity.accumulated(1).get(x), 2);
        assert!(w.client(c1).popularity.period(1).is_empty());
    }

    #[test]
    fn test_first_seen_and_rankings() {
        let mut b = hourly();
        b.push(at(0, 0), "x", "c1");
        b.push(at(1, 0), "y", "c1");
        b.push(at(1, 1), "y", "c2");
        b.push(at(1, 2), "z", "c2");
        let w = b.build().unwrap();

        let c2 = w.client_id("c2").unwrap();
        assert_eq!(w.periods()[1].first_seen, vec![c2]);

        let y = w.file_id("y").unwrap();
        assert_eq!(w.periods()[1].popular_files[0], y);
        // Every file appears in every ranking
        assert_eq!(w.periods()[0].popular_files.len(), 3);
        assert_eq!(w.periods()[1].popular_files_accumulated.len(), 3);
    }

    #[test]
    fn test_empty_trace_is_rejected() {
        assert!(hourly().build().is_err());
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        let mut b = WorkloadBuilder::new(Duration::from_secs(0));
        b.push(at(0, 0), "x", "c1");
        assert!(matches!(b.build(), Err(Error::Config(_))));
    }
}
