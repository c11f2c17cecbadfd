//! Result Files Adapter
//!
//! Reads and writes the simulator's file artifacts inside one output
//! directory:
//!
//! | File                                      | Content                        |
//! |-------------------------------------------|--------------------------------|
//! | `<run name>.csv`                          | `period_end \t hit_rate`       |
//! | `cluster_file_popularity_<s>_<e>.csv`     | group × file cumulative counts |
//! | `clustering_result.csv`                   | `client \t cluster`            |
//! | `clustering_model.json`                   | k-means centroids              |

use chrono::{DateTime, Utc};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::kmeans::KMeansModel;
use crate::domain::{ClusterAssignment, PeriodId};
use crate::error::{Error, Result};

pub const CLUSTERING_RESULT_FILE: &str = "clustering_result.csv";
pub const CLUSTERING_MODEL_FILE: &str = "clustering_model.json";

/// Period end as written in rate files
const PERIOD_END_FORMAT: &str = "%Y-%m-%d %H";

// =============================================================================
// Writer-level helpers
// =============================================================================

/// Write one `period_end \t rate` line per period, rates with 5 decimals
pub fn write_rates<W, I>(mut out: W, rates: I) -> Result<()>
where
    W: Write,
    I: IntoIterator<Item = (DateTime<Utc>, f64)>,
{
    for (end, rate) in rates {
        writeln!(out, "{}\t{:.5}", end.format(PERIOD_END_FORMAT), rate)?;
    }
    out.flush()?;
    Ok(())
}

/// Write a tab-separated count matrix, one row per line
pub fn write_matrix<W: Write>(mut out: W, rows: &[Vec<u64>]) -> Result<()> {
    for row in rows {
        let line: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        writeln!(out, "{}", line.join("\t"))?;
    }
    out.flush()?;
    Ok(())
}

pub fn write_assignments<W: Write>(mut out: W, assignments: &[ClusterAssignment]) -> Result<()> {
    for a in assignments {
        writeln!(out, "{}\t{}", a.client, a.cluster)?;
    }
    out.flush()?;
    Ok(())
}

/// Parse `client \t cluster` lines
pub fn read_assignments<R: BufRead>(reader: R) -> Result<Vec<ClusterAssignment>> {
    let mut assignments = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (client, cluster) = line.split_once('\t').ok_or_else(|| {
            Error::InvalidClusteringResult(format!("line {}: missing tab separator", index + 1))
        })?;
        let cluster = cluster.trim().parse::<usize>().map_err(|e| {
            Error::InvalidClusteringResult(format!("line {}: bad cluster id: {}", index + 1, e))
        })?;
        assignments.push(ClusterAssignment {
            client: client.trim().to_string(),
            cluster,
        });
    }
    Ok(assignments)
}

// =============================================================================
// Directory-level store
// =============================================================================

/// Artifacts of a batch, rooted at one directory.
#[derive(Debug, Clone)]
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn create(&self, name: &str) -> Result<(PathBuf, BufWriter<File>)> {
        let path = self.dir.join(name);
        let file = File::create(&path)?;
        Ok((path, BufWriter::new(file)))
    }

    /// Per-period rates of one run, named after the run
    pub fn write_run_rates<I>(&self, run_name: &str, rates: I) -> Result<PathBuf>
    where
        I: IntoIterator<Item = (DateTime<Utc>, f64)>,
    {
        let (path, out) = self.create(&format!("{}.csv", run_name))?;
        write_rates(out, rates)?;
        debug!(path = %path.display(), "Rates written");
        Ok(path)
    }

    /// Group popularity matrix for the training window
    pub fn write_group_popularity(
        &self,
        train_start: PeriodId,
        train_end: PeriodId,
        rows: &[Vec<u64>],
    ) -> Result<PathBuf> {
        let name = format!("cluster_file_popularity_{}_{}.csv", train_start, train_end);
        let (path, out) = self.create(&name)?;
        write_matrix(out, rows)?;
        debug!(path = %path.display(), groups = rows.len(), "Group popularity written");
        Ok(path)
    }

    pub fn write_clustering_result(&self, assignments: &[ClusterAssignment]) -> Result<PathBuf> {
        let (path, out) = self.create(CLUSTERING_RESULT_FILE)?;
        write_assignments(out, assignments)?;
        Ok(path)
    }

    pub fn read_clustering_result(&self) -> Result<Vec<ClusterAssignment>> {
        let file = File::open(self.dir.join(CLUSTERING_RESULT_FILE))?;
        read_assignments(BufReader::new(file))
    }

    pub fn write_model(&self, model: &KMeansModel) -> Result<PathBuf> {
        let (path, mut out) = self.create(CLUSTERING_MODEL_FILE)?;
        serde_json::to_writer_pretty(&mut out, model)?;
        out.flush()?;
        Ok(path)
    }

    pub fn read_model(&self) -> Result<KMeansModel> {
        let file = File::open(self.dir.join(CLUSTERING_MODEL_FILE))?;
        let model: KMeansModel = serde_json::from_reader(BufReader::new(file))?;
        // Re-validate centroid shapes
        KMeansModel::from_centroids(model.into_centroids())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::TimeZone;
    use std::io::Cursor;

    #[test]
    fn test_rates_format() {
        let end = Utc.with_ymd_and_hms(2017, 3, 1, 11, 0, 0).unwrap();
        let mut buf = Vec::new();
        write_rates(&mut buf, vec![(end, 2.0 / 3.0)]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "2017-03-01 11\t0.66667\n");
    }

    #[test]
    fn test_matrix_format() {
        let mut buf = Vec::new();
        write_matrix(&mut buf, &[vec![1, 0, 2], vec![0, 3, 0]]).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "1\t0\t2\n0\t3\t0\n");
    }

    #[test]
    fn test_read_assignments() {
        let parsed = read_assignments(Cursor::new("alice\t0\n\nbob\t2\n")).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[1].client, "bob");
        assert_eq!(parsed[1].cluster, 2);

        assert_matches!(
            read_assignments(Cursor::new("alice 0\n")),
            Err(Error::InvalidClusteringResult(_))
        );
        assert_matches!(
            read_assignments(Cursor::new("alice\tx\n")),
            Err(Error::InvalidClusteringResult(_))
        );
    }

    #[test]
    fn test_store_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ResultStore::new(dir.path());

        let assignments = vec![
            ClusterAssignment { client: "a".into(), cluster: 1 },
            ClusterAssignment { client: "b".into(), cluster: 0 },
        ];
        store.write_clustering_result(&assignments).unwrap();
        assert_eq!(store.read_clustering_result().unwrap(), assignments);

        let model = KMeansModel::from_centroids(vec![vec![0.0, 1.0]]).unwrap();
        store.write_model(&model).unwrap();
        assert_eq!(store.read_model().unwrap(), model);

        let path = store.write_group_popularity(0, 2, &[vec![4, 1]]).unwrap();
        assert!(path.ends_with("cluster_file_popularity_0_2.csv"));
    }

    #[test]
    fn test_missing_model_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        assert_matches!(ResultStore::new(dir.path()).read_model(), Err(Error::Io(_)));
    }
}
