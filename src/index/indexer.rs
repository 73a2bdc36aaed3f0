//! Archive indexing: walk, fingerprint, bucket, persist.
//!
//! # Overview
//!
//! [`DirectoryIndexer`] turns an [`Archive`] root into an [`Index`]:
//!
//! 1. **Walk** - collect every regular file below the root
//! 2. **Fingerprint** - sample and hash each file on a bounded rayon pool
//! 3. **Bucket** - insert successful fingerprints into the index by size
//! 4. **Persist** - write the artifact once everything above has finished
//!
//! Files that cannot be visited or fingerprinted are logged and left out.
//! They never fail the archive.
//!
//! # Example
//!
//! ```no_run
//! use archman::index::{Archive, DirectoryIndexer, IndexerConfig};
//!
//! let indexer = DirectoryIndexer::new(IndexerConfig::default().with_io_threads(8));
//! let archive = Archive::new("/mnt/backup", "/var/lib/archman/backup.idx");
//!
//! let index = indexer.read_index(&archive).unwrap();
//! println!("{} files in {} size buckets", index.file_count(), index.bucket_count());
//! ```

use std::path::Path;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;

use super::{store, Archive, FileEntry, Index, IndexError};
use crate::progress::ProgressCallback;
use crate::scanner::{fingerprint, WalkedFile, Walker, WalkerConfig};

/// Log a running total every this many indexed files.
const LOG_INTERVAL: usize = 1000;

/// Configuration for the indexer.
#[derive(Clone)]
pub struct IndexerConfig {
    /// Number of threads fingerprinting files in parallel.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Directory traversal options.
    pub walker: WalkerConfig,
    /// Optional progress callback.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for IndexerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexerConfig")
            .field("io_threads", &self.io_threads)
            .field("walker", &self.walker)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "..."),
            )
            .finish()
    }
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            io_threads: 4,
            walker: WalkerConfig::default(),
            progress_callback: None,
        }
    }
}

impl IndexerConfig {
    /// Set the number of fingerprinting threads.
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads;
        self
    }

    /// Set the walker configuration.
    #[must_use]
    pub fn with_walker_config(mut self, config: WalkerConfig) -> Self {
        self.walker = config;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Statistics from one indexing pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    /// Files that made it into the index
    pub files_indexed: usize,
    /// Sum of the sizes of indexed files
    pub bytes_indexed: u64,
    /// Files that could not be visited or fingerprinted
    pub files_skipped: usize,
    /// Distinct sizes in the resulting index
    pub bucket_count: usize,
    /// Wall time spent walking and fingerprinting
    pub duration: Duration,
}

impl IndexStats {
    /// Indexed volume in human-readable form.
    #[must_use]
    pub fn bytes_display(&self) -> String {
        ByteSize(self.bytes_indexed).to_string()
    }
}

/// Builds, persists and loads archive indexes.
#[derive(Debug, Default)]
pub struct DirectoryIndexer {
    config: IndexerConfig,
}

impl DirectoryIndexer {
    /// Create a new indexer with the given configuration.
    #[must_use]
    pub fn new(config: IndexerConfig) -> Self {
        Self { config }
    }

    /// Create a new indexer with default configuration.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self::default()
    }

    /// Load an archive's index, creating it first if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Any [`IndexError`] from [`Self::create_index`] or from loading the
    /// artifact. A corrupt artifact is never regenerated automatically.
    pub fn read_index(&self, archive: &Archive) -> Result<Index, IndexError> {
        if !archive.is_indexed() {
            self.create_index(archive)?;
        }

        let index = store::load(&archive.index)?;
        log::info!(
            "Read {} buckets / {} files from {}",
            index.bucket_count(),
            index.file_count(),
            archive.index.display()
        );
        Ok(index)
    }

    /// Index the archive root and persist the result.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::AlreadyExists`] if the artifact already has
    /// content, root errors if the root is missing or not a directory, and
    /// I/O errors from writing the artifact.
    pub fn create_index(&self, archive: &Archive) -> Result<IndexStats, IndexError> {
        if archive.is_indexed() {
            return Err(IndexError::AlreadyExists(archive.index.clone()));
        }

        let (index, stats) = self.build_index(&archive.root)?;
        store::save(&index, &archive.index)?;
        log::info!(
            "Saved {} buckets for {} to {}",
            index.bucket_count(),
            archive.root.display(),
            archive.index.display()
        );
        Ok(stats)
    }

    /// Walk and fingerprint `root` without persisting anything.
    ///
    /// # Errors
    ///
    /// Returns an error if the root is unusable or the thread pool cannot be
    /// built. Per-file failures are counted in [`IndexStats::files_skipped`].
    pub fn build_index(&self, root: &Path) -> Result<(Index, IndexStats), IndexError> {
        let start_time = Instant::now();
        let root = validate_root(root)?;
        log::info!("Indexing {}", root.display());
        if let Some(ref callback) = self.config.progress_callback {
            let label = root.file_name().unwrap_or(root.as_os_str());
            callback.on_message(&label.to_string_lossy());
        }

        let (files, walk_errors) = self.walk(&root);
        let fingerprinted = self.fingerprint_all(files)?;

        let mut index = Index::new();
        let mut stats = IndexStats {
            files_skipped: walk_errors,
            ..Default::default()
        };

        for (file, digest) in fingerprinted {
            match digest {
                Some(digest) => {
                    stats.files_indexed += 1;
                    stats.bytes_indexed += file.size;
                    index.insert(FileEntry::new(
                        file.path.to_string_lossy(),
                        file.size,
                        digest,
                    ));
                }
                None => stats.files_skipped += 1,
            }
        }

        stats.bucket_count = index.bucket_count();
        stats.duration = start_time.elapsed();

        log::info!(
            "Indexed {} files / {} ({} skipped) in {:.2?}",
            stats.files_indexed,
            stats.bytes_display(),
            stats.files_skipped,
            stats.duration
        );

        Ok((index, stats))
    }

    /// Collect regular files below `root`, counting visit failures.
    fn walk(&self, root: &Path) -> (Vec<WalkedFile>, usize) {
        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("walking", 0);
        }

        let walker = Walker::new(root, self.config.walker.clone());
        let mut files = Vec::new();
        let mut errors = 0;

        for result in walker.walk() {
            match result {
                Ok(file) => {
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(files.len() + 1, &file.path.to_string_lossy());
                    }
                    files.push(file);
                }
                Err(e) => {
                    log::warn!("Failed to index file: {}", e);
                    errors += 1;
                }
            }
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("walking");
        }

        log::debug!(
            "Walk of {} found {} files ({} errors)",
            root.display(),
            files.len(),
            errors
        );
        (files, errors)
    }

    /// Fingerprint every file on a bounded pool, preserving walk order.
    fn fingerprint_all(
        &self,
        files: Vec<WalkedFile>,
    ) -> Result<Vec<(WalkedFile, Option<String>)>, IndexError> {
        if files.is_empty() {
            log::debug!("No files to fingerprint");
            return Ok(Vec::new());
        }

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_start("fingerprinting", files.len());
        }

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.io_threads)
            .build()
            .map_err(|e| IndexError::ThreadPool(e.to_string()))?;

        let completed = AtomicUsize::new(0);
        let completed_bytes = AtomicU64::new(0);
        let results = pool.install(|| {
            files
                .into_par_iter()
                .map(|file| {
                    let digest = fingerprint(&file.path);
                    if digest.is_some() {
                        log::trace!("Fingerprinted: {}", file.path.display());
                    }

                    let done = completed.fetch_add(1, Ordering::Relaxed) + 1;
                    let bytes = completed_bytes.fetch_add(file.size, Ordering::Relaxed) + file.size;
                    if done % LOG_INTERVAL == 0 {
                        log::info!("Indexed {} files / {}", done, ByteSize(bytes));
                    }
                    if let Some(ref callback) = self.config.progress_callback {
                        callback.on_progress(done, &file.path.to_string_lossy());
                        callback.on_item_completed(file.size);
                    }

                    (file, digest)
                })
                .collect::<Vec<_>>()
        });

        if let Some(ref callback) = self.config.progress_callback {
            callback.on_phase_end("fingerprinting");
        }

        Ok(results)
    }
}

/// Make `root` absolute and check it is an existing directory.
fn validate_root(root: &Path) -> Result<std::path::PathBuf, IndexError> {
    let metadata = std::fs::metadata(root).map_err(|source| match source.kind() {
        std::io::ErrorKind::NotFound => IndexError::RootNotFound(root.to_path_buf()),
        _ => IndexError::Io {
            path: root.to_path_buf(),
            source,
        },
    })?;

    if !metadata.is_dir() {
        return Err(IndexError::NotADirectory(root.to_path_buf()));
    }

    std::path::absolute(root).map_err(|source| IndexError::Io {
        path: root.to_path_buf(),
        source,
    })
}
