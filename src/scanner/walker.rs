//! Directory walker implementation using jwalk.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct for traversing an archive root
//! and collecting every regular file beneath it, together with its size.
//! Directories are descended into but never reported. Hidden files are
//! included: an archive is catalogued in full.
//!
//! Per-entry failures (unreadable directory, file deleted mid-walk, symlink
//! loop) are yielded as [`ScanError`] values and the walk carries on with the
//! remaining siblings.
//!
//! # Example
//!
//! ```no_run
//! use archman::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/mnt/photos"), WalkerConfig::default());
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::{ScanError, WalkedFile, WalkerConfig};

/// Directory walker for file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given path.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
        }
    }

    /// Root directory this walker traverses.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the directory tree, yielding regular files.
    ///
    /// Children are visited in file-name order so repeated walks over an
    /// unchanged tree yield the same sequence.
    pub fn walk(&self) -> impl Iterator<Item = Result<WalkedFile, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(false)
            .process_read_dir(|_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
            });

        walk_dir
            .into_iter()
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    if path == self.root {
                        return None;
                    }

                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        return None;
                    }

                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    let metadata = if self.config.follow_symlinks {
                        std::fs::metadata(&path)
                    } else {
                        std::fs::symlink_metadata(&path)
                    };

                    match metadata {
                        Ok(m) if m.is_file() => Some(Ok(WalkedFile::new(path, m.len()))),
                        Ok(_) => {
                            log::trace!("Skipping non-regular file: {}", path.display());
                            None
                        }
                        Err(e) => Some(Err(self.handle_io_error(&path, e))),
                    }
                }
                Err(e) => Some(Err(self.handle_jwalk_error(e))),
            })
    }

    /// Classify an I/O error raised while visiting `path`.
    fn handle_io_error(&self, path: &Path, error: std::io::Error) -> ScanError {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path.to_path_buf())
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                ScanError::NotFound(path.to_path_buf())
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                }
            }
        }
    }

    /// Convert a jwalk error, keeping the loop case distinct.
    fn handle_jwalk_error(&self, error: jwalk::Error) -> ScanError {
        let path = error
            .path()
            .map_or_else(|| self.root.clone(), Path::to_path_buf);

        if error.loop_ancestor().is_some() {
            log::warn!("Symlink loop detected at {}", path.display());
            return ScanError::Loop(path);
        }

        match error.io_error().map(std::io::Error::kind) {
            Some(std::io::ErrorKind::PermissionDenied) => {
                log::warn!("Permission denied: {}", path.display());
                ScanError::PermissionDenied(path)
            }
            Some(std::io::ErrorKind::NotFound) => {
                log::debug!("Path not found during walk: {}", path.display());
                ScanError::NotFound(path)
            }
            _ => {
                log::warn!("Walker error for {}: {}", path.display(), error);
                ScanError::Io {
                    path,
                    source: std::io::Error::other(error.to_string()),
                }
            }
        }
    }
}
