//! Size-bucketed content indexes of archives.
//!
//! # Overview
//!
//! An [`Index`] maps a file size to every [`FileEntry`] of that size. Two
//! files can only share content if they share a size, so every comparison
//! downstream looks up the matching bucket first and compares fingerprints
//! only inside it.
//!
//! # Architecture
//!
//! * [`indexer`]: walks an [`Archive`] root and builds its index.
//! * [`store`]: persists an index as a binary artifact and loads it back.

pub mod indexer;
pub mod store;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use indexer::{DirectoryIndexer, IndexStats, IndexerConfig};
pub use store::ARTIFACT_VERSION;

/// One catalogued file.
///
/// `(size, fingerprint)` decides content equality. `path` is carried for
/// display and output only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileEntry {
    /// Absolute path at index time
    pub path: String,
    /// File length in bytes at index time
    pub size: u64,
    /// Hex-encoded content fingerprint
    pub fingerprint: String,
}

impl FileEntry {
    /// Create a new FileEntry.
    #[must_use]
    pub fn new(path: impl Into<String>, size: u64, fingerprint: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size,
            fingerprint: fingerprint.into(),
        }
    }

    /// The content-equality key of this entry.
    #[must_use]
    pub fn content_key(&self) -> (u64, &str) {
        (self.size, &self.fingerprint)
    }

    /// Whether `other` is considered the same content.
    #[must_use]
    pub fn same_content(&self, other: &FileEntry) -> bool {
        self.content_key() == other.content_key()
    }
}

/// Mapping from file size to the entries of that size.
///
/// Every entry stored under key `k` has `size == k`: [`Index::insert`] derives
/// the key from the entry, so the invariant cannot be broken from outside.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Index {
    buckets: BTreeMap<u64, Vec<FileEntry>>,
}

impl Index {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an entry to the bucket for its size.
    pub fn insert(&mut self, entry: FileEntry) {
        self.buckets.entry(entry.size).or_default().push(entry);
    }

    /// Entries of the given size, if any.
    #[must_use]
    pub fn bucket(&self, size: u64) -> Option<&[FileEntry]> {
        self.buckets.get(&size).map(Vec::as_slice)
    }

    /// Iterate over `(size, entries)` buckets in ascending size order.
    pub fn buckets(&self) -> impl Iterator<Item = (u64, &[FileEntry])> {
        self.buckets.iter().map(|(size, entries)| (*size, entries.as_slice()))
    }

    /// Iterate over every entry, bucket by bucket.
    pub fn entries(&self) -> impl Iterator<Item = &FileEntry> {
        self.buckets.values().flatten()
    }

    /// Number of distinct sizes.
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of entries across all buckets.
    #[must_use]
    pub fn file_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Sum of the sizes of all entries.
    #[must_use]
    pub fn total_bytes(&self) -> u64 {
        self.buckets
            .iter()
            .map(|(size, entries)| size * entries.len() as u64)
            .sum()
    }

    /// Check if the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Fold `other` into this index.
    ///
    /// Buckets absent here are adopted whole; present buckets are extended
    /// with the incoming entries after the existing ones. Nothing is
    /// deduplicated.
    pub fn absorb(&mut self, other: Index) {
        for (size, entries) in other.buckets {
            self.buckets.entry(size).or_default().extend(entries);
        }
    }

    /// Keep only entries for which `keep` returns true.
    ///
    /// Buckets left empty are removed. Returns the number of entries dropped.
    pub fn retain<F>(&mut self, mut keep: F) -> usize
    where
        F: FnMut(&FileEntry) -> bool,
    {
        let mut dropped = 0;
        self.buckets.retain(|_, entries| {
            let before = entries.len();
            entries.retain(|entry| keep(entry));
            dropped += before - entries.len();
            !entries.is_empty()
        });
        dropped
    }

    /// Check that every entry lives under its own size and no bucket is empty.
    ///
    /// Returns the first offending `(key, entry size)` pair.
    pub(crate) fn validate(&self) -> Result<(), (u64, Option<u64>)> {
        for (size, entries) in &self.buckets {
            if entries.is_empty() {
                return Err((*size, None));
            }
            if let Some(bad) = entries.iter().find(|e| e.size != *size) {
                return Err((*size, Some(bad.size)));
            }
        }
        Ok(())
    }
}

impl FromIterator<FileEntry> for Index {
    fn from_iter<T: IntoIterator<Item = FileEntry>>(iter: T) -> Self {
        let mut index = Index::new();
        for entry in iter {
            index.insert(entry);
        }
        index
    }
}

impl Extend<FileEntry> for Index {
    fn extend<T: IntoIterator<Item = FileEntry>>(&mut self, iter: T) {
        for entry in iter {
            self.insert(entry);
        }
    }
}

/// A file-system root paired with the location of its index artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    /// Directory whose files are catalogued
    pub root: PathBuf,
    /// Where the index artifact lives
    pub index: PathBuf,
}

impl Archive {
    /// Create a new archive description.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, index: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    /// An archive is indexed iff its artifact exists and is non-empty.
    #[must_use]
    pub fn is_indexed(&self) -> bool {
        artifact_has_content(&self.index)
    }
}

impl std::fmt::Display for Archive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}={}", self.root.display(), self.index.display())
    }
}

/// Whether `path` exists and has a length greater than zero.
pub(crate) fn artifact_has_content(path: &Path) -> bool {
    std::fs::metadata(path).is_ok_and(|m| m.len() > 0)
}

/// Errors that can occur while building, saving or loading an index.
///
/// Each of these is fatal for the archive it concerns.
#[derive(thiserror::Error, Debug)]
pub enum IndexError {
    /// The archive root does not exist.
    #[error("Archive root not found: {0}")]
    RootNotFound(PathBuf),

    /// The archive root is not a directory.
    #[error("Archive root is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An index artifact with content is already present.
    #[error("Index artifact already exists: {0} (remove it to re-index)")]
    AlreadyExists(PathBuf),

    /// The artifact could not be decoded.
    #[error("Corrupt index artifact {path}: {reason}")]
    Corrupt {
        /// Artifact path
        path: PathBuf,
        /// What was wrong with it
        reason: String,
    },

    /// The artifact decoded but its checksum does not match its content.
    #[error("Index artifact checksum mismatch: {0}")]
    ChecksumMismatch(PathBuf),

    /// The artifact was written by an incompatible format version.
    #[error("Unsupported index artifact version {found} in {path} (expected {expected})")]
    UnsupportedVersion {
        /// Artifact path
        path: PathBuf,
        /// Version found in the artifact
        found: u32,
        /// Version this build reads
        expected: u32,
    },

    /// The index could not be encoded.
    #[error("Failed to encode index: {0}")]
    Encode(String),

    /// Building the fingerprinting thread pool failed.
    #[error("Failed to build thread pool: {0}")]
    ThreadPool(String),

    /// An I/O error occurred on the artifact or root.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
