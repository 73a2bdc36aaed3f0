//! Scanner module for directory traversal and file fingerprinting.
//!
//! This module provides functionality for:
//! - Directory walking using jwalk
//! - Content fingerprinting with sampled SHA-1
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and file discovery
//! - [`fingerprint`]: Head/tail sampling fingerprints
//!
//! # Example
//!
//! ```no_run
//! use archman::scanner::{fingerprint, Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("."), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(file) => {
//!             if let Some(digest) = fingerprint(&file.path) {
//!                 println!("{} {} {}", digest, file.size, file.path.display());
//!             }
//!         }
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod fingerprint;
pub mod walker;

use std::path::PathBuf;

// Re-export main types
pub use fingerprint::{fingerprint, fingerprint_bytes, try_fingerprint, CHUNK_SIZE};
pub use walker::Walker;

/// A regular file discovered during a walk.
///
/// Carries only what the indexer needs before fingerprinting: where the file
/// is and how large it was when it was visited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkedFile {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes at visit time
    pub size: u64,
}

impl WalkedFile {
    /// Create a new WalkedFile.
    #[must_use]
    pub fn new(path: PathBuf, size: u64) -> Self {
        Self { path, size }
    }
}

/// Configuration for directory walking.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    /// Cycles are detected by jwalk and reported as errors.
    pub follow_symlinks: bool,
}

impl WalkerConfig {
    /// Set whether symbolic links are followed.
    #[must_use]
    pub fn with_follow_symlinks(mut self, follow: bool) -> Self {
        self.follow_symlinks = follow;
        self
    }
}

/// Errors that can occur during directory scanning.
///
/// All of these are per-entry failures: the walk reports them and moves on
/// to the next sibling.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The path disappeared between listing and visiting.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// A symlink loop was detected while following links.
    #[error("Symlink loop detected at {0}")]
    Loop(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl ScanError {
    /// Path the error refers to.
    #[must_use]
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::PermissionDenied(p) | Self::NotFound(p) | Self::Loop(p) => p,
            Self::Io { path, .. } => path,
        }
    }
}

/// Errors that can occur while fingerprinting a file.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    /// The specified file was not found.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl FingerprintError {
    /// Classify an I/O error raised while reading `path`.
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
