//! Clusters of content-identical entries within one index.
//!
//! # Overview
//!
//! Duplicate detection is two-level bucketing:
//!
//! 1. The index already groups entries by size. Buckets with a single entry
//!    cannot contain a duplicate and are skipped without looking inside.
//! 2. Each remaining bucket is grouped by fingerprint. Every fingerprint
//!    group with two or more members is a [`Cluster`].
//!
//! No pair of files is ever compared directly.

use std::collections::HashMap;

use bytesize::ByteSize;
use serde::Serialize;

use crate::index::{FileEntry, Index};

/// A group of two or more entries with equal size and fingerprint.
///
/// Members are peers: no entry is singled out as the original.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cluster {
    /// Size shared by every member
    pub size: u64,
    /// Fingerprint shared by every member
    pub fingerprint: String,
    /// The members, in index order
    pub entries: Vec<FileEntry>,
}

impl Cluster {
    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if this cluster has no members.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Paths of the members.
    #[must_use]
    pub fn paths(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.path.as_str()).collect()
    }

    /// Bytes that keeping a single member would free.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.size * self.entries.len().saturating_sub(1) as u64
    }
}

/// Totals over a list of clusters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateSummary {
    /// Number of clusters
    pub clusters: usize,
    /// Files across all clusters
    pub total_files: usize,
    /// Files beyond the first of each cluster
    pub duplicate_files: usize,
    /// Sum of [`Cluster::wasted_space`]
    pub reclaimable_bytes: u64,
}

impl DuplicateSummary {
    /// Summarize `clusters`.
    #[must_use]
    pub fn from_clusters(clusters: &[Cluster]) -> Self {
        clusters.iter().fold(Self::default(), |mut acc, c| {
            acc.clusters += 1;
            acc.total_files += c.len();
            acc.duplicate_files += c.len().saturating_sub(1);
            acc.reclaimable_bytes += c.wasted_space();
            acc
        })
    }

    /// Reclaimable space in human-readable form.
    #[must_use]
    pub fn reclaimable_display(&self) -> String {
        ByteSize(self.reclaimable_bytes).to_string()
    }
}

/// Find all clusters of content-identical entries in `index`.
///
/// Clusters come out bucket by bucket in ascending size; within a bucket, in
/// the order their fingerprint first appears. Members keep bucket order.
#[must_use]
pub fn duplicates(index: &Index) -> Vec<Cluster> {
    let clusters: Vec<Cluster> = index
        .buckets()
        .filter(|(_, entries)| entries.len() > 1)
        .flat_map(|(size, entries)| cluster_bucket(size, entries))
        .collect();

    log::debug!(
        "Found {} duplicate clusters among {} files",
        clusters.len(),
        index.file_count()
    );
    clusters
}

/// Group one size bucket by fingerprint, keeping groups of two or more.
fn cluster_bucket(size: u64, entries: &[FileEntry]) -> Vec<Cluster> {
    let mut position: HashMap<&str, usize> = HashMap::new();
    let mut groups: Vec<Vec<&FileEntry>> = Vec::new();

    for entry in entries {
        let slot = *position.entry(entry.fingerprint.as_str()).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });
        groups[slot].push(entry);
    }

    groups
        .into_iter()
        .filter(|members| members.len() > 1)
        .map(|members| Cluster {
            size,
            fingerprint: members[0].fingerprint.clone(),
            entries: members.into_iter().cloned().collect(),
        })
        .collect()
}
