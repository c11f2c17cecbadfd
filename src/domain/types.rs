//! Domain value objects
//!
//! Identifiers are dense indexes into the registries that own the entities,
//! so relations between entities are stored as plain ids instead of pointers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Index of a period inside a workload.
pub type PeriodId = usize;

/// Set of files used to restrict comparisons and serving.
pub type FileSet = BTreeSet<FileId>;

macro_rules! dense_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(pub usize);

        impl $name {
            pub fn new(index: usize) -> Self {
                Self(index)
            }

            /// Position of the entity in its owning registry
            #[inline]
            pub fn index(self) -> usize {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

dense_id!(
    /// File identifier (value object).
    FileId
);
dense_id!(
    /// Client identifier (value object).
    ClientId
);
dense_id!(
    /// Small cell identifier; equals the cluster id the cell was created for.
    CellId
);
dense_id!(
    /// Cache storage (cooperation group) identifier.
    GroupId
);

/// One request from the trace. Immutable input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub time: DateTime<Utc>,
    pub file: FileId,
    pub client: ClientId,
}

impl Request {
    pub fn new(time: DateTime<Utc>, file: FileId, client: ClientId) -> Self {
        Self { time, file, client }
    }
}

/// Training-window placement of one client, keyed by the trace's client name
/// so it can be persisted and reloaded against another workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub client: String,
    pub cluster: usize,
}
