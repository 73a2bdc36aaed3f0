//! JSON report formatter.
//!
//! # Output Schema
//!
//! Missing files:
//!
//! ```json
//! {
//!   "generated_at": "2024-01-01T00:00:00Z",
//!   "count": 1,
//!   "entries": [
//!     { "path": "/archive/a.jpg", "size": 3409, "fingerprint": "9119..." }
//!   ]
//! }
//! ```
//!
//! Duplicate clusters:
//!
//! ```json
//! {
//!   "generated_at": "2024-01-01T00:00:00Z",
//!   "summary": {
//!     "clusters": 1,
//!     "total_files": 2,
//!     "duplicate_files": 1,
//!     "reclaimable_bytes": 3555
//!   },
//!   "clusters": [
//!     { "size": 3555, "fingerprint": "5d2c...", "paths": ["/a/d1", "/a/d2"] }
//!   ]
//! }
//! ```

use std::io::Write;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::OutputError;
use crate::compare::{Cluster, DuplicateSummary};
use crate::index::FileEntry;

/// Missing-file report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonMissingOutput {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Number of entries
    pub count: usize,
    /// Entries missing from the reference
    pub entries: Vec<FileEntry>,
}

impl JsonMissingOutput {
    /// Create a report stamped with the current time.
    #[must_use]
    pub fn new(entries: &[FileEntry]) -> Self {
        Self {
            generated_at: Utc::now(),
            count: entries.len(),
            entries: entries.to_vec(),
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), OutputError> {
        write_json(writer, self)
    }
}

/// One duplicate cluster in JSON form.
#[derive(Debug, Clone, Serialize)]
pub struct JsonCluster {
    /// Size shared by every member
    pub size: u64,
    /// Fingerprint shared by every member
    pub fingerprint: String,
    /// Member paths
    pub paths: Vec<String>,
}

impl From<&Cluster> for JsonCluster {
    fn from(cluster: &Cluster) -> Self {
        Self {
            size: cluster.size,
            fingerprint: cluster.fingerprint.clone(),
            paths: cluster.entries.iter().map(|e| e.path.clone()).collect(),
        }
    }
}

/// Duplicate-cluster report.
#[derive(Debug, Clone, Serialize)]
pub struct JsonDuplicatesOutput {
    /// When the report was produced
    pub generated_at: DateTime<Utc>,
    /// Totals over all clusters
    pub summary: DuplicateSummary,
    /// The clusters
    pub clusters: Vec<JsonCluster>,
}

impl JsonDuplicatesOutput {
    /// Create a report stamped with the current time.
    #[must_use]
    pub fn new(clusters: &[Cluster]) -> Self {
        Self {
            generated_at: Utc::now(),
            summary: DuplicateSummary::from_clusters(clusters),
            clusters: clusters.iter().map(JsonCluster::from).collect(),
        }
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write pretty-printed JSON followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), OutputError> {
        write_json(writer, self)
    }
}

fn write_json<W: Write, T: Serialize>(writer: &mut W, value: &T) -> Result<(), OutputError> {
    serde_json::to_writer_pretty(&mut *writer, value)?;
    writer.write_all(b"\n")?;
    Ok(())
}
