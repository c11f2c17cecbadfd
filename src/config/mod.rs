//! Simulation configuration
//!
//! A batch file holds a list of [`SimulationConfig`] entries, in JSON or YAML
//! depending on the file extension. Field names are camelCase; every field
//! has a default so a config only needs to state what it changes.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::adapters::CachePolicy;
use crate::assignment::{AssignmentMode, TrainingFeatures};
use crate::domain::PeriodId;
use crate::error::{Error, Result};
use crate::similarity::SimilarityFormula;

// =============================================================================
// SimulationConfig
// =============================================================================

/// One simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationConfig {
    /// Optional run name; derived from the parameters when absent
    #[serde(default)]
    pub name: Option<String>,

    /// Minimum similarity to an anchor for a small cell to join its cache
    /// storage. Negative disables cooperation.
    #[serde(default = "default_cooperation_threshold")]
    pub cooperation_threshold: f64,

    #[serde(default)]
    pub similarity_formula: SimilarityFormula,

    /// Restrict end-of-period reassignment to files popular in this period
    /// and the next
    #[serde(default)]
    pub is_period_similarity: bool,

    #[serde(default)]
    pub cache_policy: CachePolicy,

    /// Serve only the top N files of each period; 0 serves everything
    #[serde(default)]
    pub files_limit: usize,

    /// Size of every file in bytes
    #[serde(default = "default_file_size")]
    pub file_size: u64,

    /// Capacity of every cache storage in bytes
    #[serde(default = "default_cache_storage_size")]
    pub cache_storage_size: u64,

    #[serde(default)]
    pub assignment_mode: AssignmentMode,

    #[serde(default)]
    pub training_features: TrainingFeatures,

    #[serde(default)]
    pub train_start_period: PeriodId,

    #[serde(default)]
    pub train_end_period: PeriodId,

    /// First served period
    #[serde(default = "default_test_start_period")]
    pub test_start_period: PeriodId,

    /// Number of clusters, and therefore small cells
    #[serde(default = "default_cluster_number")]
    pub cluster_number: usize,

    /// Reload the persisted model and training assignment instead of fitting
    #[serde(default)]
    pub is_trained: bool,

    /// Period length. Uses Go-style duration format (e.g., "1h", "30m").
    #[serde(default = "default_period_duration")]
    pub period_duration: String,
}

fn default_cooperation_threshold() -> f64 {
    -1.0
}

fn default_file_size() -> u64 {
    1
}

fn default_cache_storage_size() -> u64 {
    1000
}

fn default_test_start_period() -> PeriodId {
    1
}

fn default_cluster_number() -> usize {
    2
}

fn default_period_duration() -> String {
    "1h".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            name: None,
            cooperation_threshold: default_cooperation_threshold(),
            similarity_formula: SimilarityFormula::default(),
            is_period_similarity: false,
            cache_policy: CachePolicy::default(),
            files_limit: 0,
            file_size: default_file_size(),
            cache_storage_size: default_cache_storage_size(),
            assignment_mode: AssignmentMode::default(),
            training_features: TrainingFeatures::default(),
            train_start_period: 0,
            train_end_period: 0,
            test_start_period: default_test_start_period(),
            cluster_number: default_cluster_number(),
            is_trained: false,
            period_duration: default_period_duration(),
        }
    }
}

impl SimulationConfig {
    /// Check values that do not depend on the trace
    pub fn validate(&self) -> Result<()> {
        if !self.cooperation_threshold.is_finite() {
            return Err(Error::Config("cooperationThreshold must be finite".to_string()));
        }
        if self.file_size == 0 {
            return Err(Error::Config("fileSize must be positive".to_string()));
        }
        if self.cluster_number == 0 {
            return Err(Error::Config("clusterNumber must be positive".to_string()));
        }
        if self.train_start_period > self.train_end_period {
            return Err(Error::Config(format!(
                "trainStartPeriod {} is after trainEndPeriod {}",
                self.train_start_period, self.train_end_period
            )));
        }
        self.period()?;
        Ok(())
    }

    /// Parsed period duration
    pub fn period(&self) -> Result<Duration> {
        parse_duration(&self.period_duration)
    }

    /// Run name, also the stem of its rate file
    pub fn name(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!(
                "{}_{}_{}_{}_{}_{}",
                self.similarity_formula,
                self.is_period_similarity,
                self.cache_policy,
                self.files_limit,
                self.file_size,
                self.cache_storage_size
            ),
        }
    }
}

// =============================================================================
// Loading
// =============================================================================

/// Parse a list of configs; YAML for `.yaml`/`.yml`, JSON otherwise
pub fn parse_configs(content: &str, yaml: bool) -> Result<Vec<SimulationConfig>> {
    let configs: Vec<SimulationConfig> = if yaml {
        serde_yaml::from_str(content)?
    } else {
        serde_json::from_str(content)?
    };
    if configs.is_empty() {
        return Err(Error::Config("no simulation configs".to_string()));
    }
    for (i, config) in configs.iter().enumerate() {
        config
            .validate()
            .map_err(|e| Error::Config(format!("config #{}: {}", i, e)))?;
    }
    Ok(configs)
}

/// Read and validate the batch file at `path`
pub fn load_configs(path: &Path) -> Result<Vec<SimulationConfig>> {
    let content = std::fs::read_to_string(path)?;
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let configs = parse_configs(&content, yaml)?;
    info!(path = %path.display(), count = configs.len(), "Configs loaded");
    Ok(configs)
}

/// Suffix colliding run names with their position in the batch
///
/// The first run keeps its name; later runs with the same name become
/// `{name}_{index}`.
pub fn disambiguate_names(configs: &mut [SimulationConfig]) {
    let mut seen = std::collections::HashSet::new();
    for (i, config) in configs.iter_mut().enumerate() {
        let name = config.name();
        if !seen.insert(name.clone()) {
            let renamed = format!("{}_{}", name, i);
            seen.insert(renamed.clone());
            config.name = Some(renamed);
        }
    }
}

// =============================================================================
// Duration Parsing
// =============================================================================

/// Parse a Go-style duration string (e.g., "1h", "30m", "1h30m", "2d")
///
/// A trailing number without unit counts as seconds.
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim();
    if s.is_empty() {
        return Err(Error::DurationParse("empty duration string".to_string()));
    }

    let mut total_secs: u64 = 0;
    let mut digits = String::new();
    let mut take = |digits: &mut String, unit: u64| -> Result<()> {
        let n: u64 = digits
            .parse()
            .map_err(|_| Error::DurationParse(format!("invalid number in duration: {}", s)))?;
        digits.clear();
        total_secs = n
            .checked_mul(unit)
            .and_then(|v| total_secs.checked_add(v))
            .ok_or_else(|| Error::DurationParse(format!("duration overflows: {}", s)))?;
        Ok(())
    };

    for c in s.chars() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }
        let unit = match c.to_ascii_lowercase() {
            'd' => 86400,
            'h' => 3600,
            'm' => 60,
            's' => 1,
            _ => return Err(Error::DurationParse(format!("unknown duration unit: {}", c))),
        };
        take(&mut digits, unit)?;
    }
    if !digits.is_empty() {
        take(&mut digits, 1)?;
    }

    if total_secs == 0 {
        return Err(Error::DurationParse(
            "duration must be greater than 0".to_string(),
        ));
    }
    Ok(Duration::from_secs(total_secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    // =========================================================================
    // parse_duration Tests
    // =========================================================================

    #[test]
    fn test_parse_duration_units() {
        assert_eq!(parse_duration("1h").unwrap(), Duration::from_secs(3600));
        assert_eq!(parse_duration("30m").unwrap(), Duration::from_secs(1800));
        assert_eq!(parse_duration("45s").unwrap(), Duration::from_secs(45));
        assert_eq!(parse_duration("1D").unwrap(), Duration::from_secs(86400));
    }

    #[test]
    fn test_parse_duration_combined() {
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert_eq!(parse_duration("1d12h").unwrap(), Duration::from_secs(129600));
        assert_eq!(parse_duration(" 90 ").unwrap(), Duration::from_secs(90));
    }

    #[test]
    fn test_parse_duration_errors() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("h").is_err());
        assert!(parse_duration("0m").is_err());
        assert!(parse_duration("3w").is_err());
    }

    // =========================================================================
    // SimulationConfig Tests
    // =========================================================================

    #[test]
    fn test_defaults_from_empty_object() {
        let configs = parse_configs("[{}]", false).unwrap();
        assert_eq!(configs[0], SimulationConfig::default());
        assert_eq!(configs[0].period().unwrap(), Duration::from_secs(3600));
    }

    #[test]
    fn test_json_fields_are_camel_case() {
        let json = r#"[{
            "cooperationThreshold": 0.8,
            "similarityFormula": "exponential",
            "isPeriodSimilarity": true,
            "cachePolicy": "fill-once",
            "filesLimit": 100,
            "fileSize": 10,
            "cacheStorageSize": 5000,
            "assignmentMode": "oracle",
            "trainingFeatures": "similarity",
            "trainStartPeriod": 0,
            "trainEndPeriod": 23,
            "testStartPeriod": 24,
            "clusterNumber": 8,
            "isTrained": true,
            "periodDuration": "30m"
        }]"#;
        let c = &parse_configs(json, false).unwrap()[0];
        assert_eq!(c.similarity_formula, SimilarityFormula::Exponential);
        assert_eq!(c.cache_policy, CachePolicy::FillOnce);
        assert_eq!(c.assignment_mode, AssignmentMode::Oracle);
        assert_eq!(c.training_features, TrainingFeatures::Similarity);
        assert_eq!(c.train_end_period, 23);
        assert!(c.is_trained);
        assert_eq!(c.name(), "exponential_true_fill-once_100_10_5000");
    }

    #[test]
    fn test_yaml_configs() {
        let yaml = "- clusterNumber: 3\n  periodDuration: 2h\n- name: baseline\n";
        let configs = parse_configs(yaml, true).unwrap();
        assert_eq!(configs.len(), 2);
        assert_eq!(configs[0].cluster_number, 3);
        assert_eq!(configs[1].name(), "baseline");
    }

    #[test]
    fn test_unknown_names_fail_at_load() {
        assert_matches!(
            parse_configs(r#"[{"cachePolicy": "lru"}]"#, false),
            Err(Error::Json(_))
        );
        assert_matches!(
            parse_configs(r#"[{"similarityFormula": "jaccard"}]"#, false),
            Err(Error::Json(_))
        );
    }

    #[test]
    fn test_validation() {
        assert_matches!(parse_configs("[]", false), Err(Error::Config(_)));
        assert_matches!(
            parse_configs(r#"[{"trainStartPeriod": 3, "trainEndPeriod": 1}]"#, false),
            Err(Error::Config(_))
        );
        assert_matches!(
            parse_configs(r#"[{"clusterNumber": 0}]"#, false),
            Err(Error::Config(_))
        );
        assert_matches!(
            parse_configs(r#"[{"periodDuration": "soon"}]"#, false),
            Err(Error::Config(_))
        );
    }

    #[test]
    fn test_disambiguate_names() {
        let mut configs = vec![
            SimulationConfig::default(),
            SimulationConfig::default(),
            SimulationConfig {
                file_size: 5,
                ..SimulationConfig::default()
            },
        ];
        disambiguate_names(&mut configs);
        let names: Vec<_> = configs.iter().map(|c| c.name()).collect();
        assert_eq!(names[0], "cosine_false_unlimited_0_1_1000");
        assert_eq!(names[1], "cosine_false_unlimited_0_1_1000_1");
        assert_eq!(names[2], "cosine_false_unlimited_0_5_1000");
    }

    #[test]
    fn test_load_configs_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("configs.yml");
        std::fs::write(&path, "- fileSize: 4\n").unwrap();
        assert_eq!(load_configs(&path).unwrap()[0].file_size, 4);
    }
}
