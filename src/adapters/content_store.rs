//! Content Store Adapter
//!
//! Implements the `CacheContent` port with simple admission policies. No
//! policy here evicts; a storage either grows without bound or fills up once.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::{CacheContent, CachedFile, FileId};
use crate::error::{Error, Result};

/// Admission policy of a cache storage, selected by name in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CachePolicy {
    /// Every requested file becomes fully resident; capacity is not enforced
    #[default]
    Unlimited,
    /// Files are admitted while space remains; a file that does not fit is
    /// admitted partially and nothing is ever evicted
    FillOnce,
}

impl CachePolicy {
    /// Build an empty store of `capacity` bytes using this policy
    pub fn build(self, capacity: u64) -> Box<dyn CacheContent> {
        Box::new(ContentStore::new(self, capacity))
    }
}

impl std::fmt::Display for CachePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CachePolicy::Unlimited => write!(f, "unlimited"),
            CachePolicy::FillOnce => write!(f, "fill-once"),
        }
    }
}

impl std::str::FromStr for CachePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "unlimited" => Ok(CachePolicy::Unlimited),
            "fill-once" | "fillonce" => Ok(CachePolicy::FillOnce),
            other => Err(Error::Config(format!("unknown cache policy: {}", other))),
        }
    }
}

/// In-memory per-storage file table.
#[derive(Debug, Clone)]
pub struct ContentStore {
    policy: CachePolicy,
    capacity: u64,
    space: u64,
    files: BTreeMap<FileId, CachedFile>,
}

impl ContentStore {
    pub fn new(policy: CachePolicy, capacity: u64) -> Self {
        Self {
            policy,
            capacity,
            space: capacity,
            files: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Number of files with metadata
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn get(&self, file: FileId) -> Option<&CachedFile> {
        self.files.get(&file)
    }

    /// Bytes to admit for a file that is not resident yet
    fn admit(&mut self, size: u64) -> u64 {
        match self.policy {
            CachePolicy::Unlimited => {
                self.space = self.space.saturating_sub(size);
                size
            }
            CachePolicy::FillOnce => {
                let admitted = size.min(self.space);
                self.space -= admitted;
                admitted
            }
        }
    }
}

impl CacheContent for ContentStore {
    fn cache_file(&mut self, file: FileId, size: u64) -> (u64, &mut CachedFile) {
        let resident = self
            .files
            .get(&file)
            .map(|f| f.cached_bytes.min(size))
            .unwrap_or(0);
        let admitted = if resident == 0 { self.admit(size) } else { 0 };

        let entry = self
            .files
            .entry(file)
            .or_insert_with(|| CachedFile::new(file));
        entry.cached_bytes += admitted;
        (resident, entry)
    }

    fn holds(&self, file: FileId) -> bool {
        self.files.get(&file).map_or(false, |f| f.cached_bytes > 0)
    }

    fn capacity(&self) -> u64 {
        self.capacity
    }

    fn space(&self) -> u64 {
        self.space
    }
}
