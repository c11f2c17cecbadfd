//! Request Trace Reader
//!
//! Reads delimited `timestamp, file, client` lines into a [`Workload`].
//! Fields are separated by commas or tabs. Timestamps may be RFC 3339,
//! `YYYY-MM-DD HH:MM:SS` (taken as UTC) or integer Unix seconds. Blank lines,
//! `#` comments and a leading header row are skipped.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::error::{Error, Result};
use crate::workload::{Workload, WorkloadBuilder};

/// Parse one trace timestamp
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&t));
    }
    s.parse::<i64>()
        .ok()
        .and_then(|secs| Utc.timestamp_opt(secs, 0).single())
}

fn split_fields(line: &str) -> Vec<&str> {
    let sep = if line.contains('\t') { '\t' } else { ',' };
    line.split(sep).map(str::trim).collect()
}

fn is_header(fields: &[&str]) -> bool {
    fields
        .first()
        .map(|f| matches!(f.to_lowercase().as_str(), "time" | "timestamp"))
        .unwrap_or(false)
}

/// Read a trace from any buffered reader and split it into periods
pub fn read_trace<R: BufRead>(reader: R, period_duration: Duration) -> Result<Workload> {
    let mut builder = WorkloadBuilder::new(period_duration);

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let number = index + 1;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let fields = split_fields(trimmed);
        if number == 1 && is_header(&fields) {
            continue;
        }
        if fields.len() != 3 {
            return Err(Error::InvalidTrace {
                line: number,
                reason: format!("expected 3 fields, found {}", fields.len()),
            });
        }
        let time = parse_timestamp(fields[0]).ok_or_else(|| Error::InvalidTrace {
            line: number,
            reason: format!("unrecognized timestamp '{}'", fields[0]),
        })?;
        if fields[1].is_empty() || fields[2].is_empty() {
            return Err(Error::InvalidTrace {
                line: number,
                reason: "empty file or client identifier".to_string(),
            });
        }
        builder.push(time, fields[1], fields[2]);
    }

    builder.build()
}

/// Read the trace file at `path`
pub fn load_trace(path: &Path, period_duration: Duration) -> Result<Workload> {
    let file = File::open(path)?;
    let workload = read_trace(BufReader::new(file), period_duration)?;
    info!(
        path = %path.display(),
        requests = workload.request_count(),
        periods = workload.period_count(),
        files = workload.file_count(),
        clients = workload.clients().len(),
        "Request trace loaded"
    );
    Ok(workload)
}
