//! Entry filters that shrink an index before comparison.
//!
//! # Overview
//!
//! A filter is a `keep(entry) -> bool` predicate. Filters are applied through
//! [`Index::retain`], which drops rejected entries and prunes emptied buckets,
//! so the comparison algorithms run unmodified on the result.
//!
//! Three filters ship with the crate:
//!
//! * [`NonEmptyFilter`]: drops zero-length files.
//! * [`RegexFilter`]: keeps entries whose path matches at least one pattern.
//! * [`ExifFilter`]: keeps images that carry camera make or model metadata.
//!
//! # Example
//!
//! ```
//! use archman::filter::{FilterSet, NonEmptyFilter, RegexFilter};
//! use archman::index::{FileEntry, Index};
//!
//! let mut index: Index = vec![
//!     FileEntry::new("/photos/a.jpg", 10, "f1"),
//!     FileEntry::new("/photos/empty.jpg", 0, "f2"),
//!     FileEntry::new("/music/b.mp3", 20, "f3"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let filters = FilterSet::new()
//!     .with(NonEmptyFilter)
//!     .with(RegexFilter::new(&["^/photos/"]).unwrap());
//!
//! assert_eq!(filters.apply(&mut index), 2);
//! assert_eq!(index.file_count(), 1);
//! ```

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::index::{FileEntry, Index};

/// Extensions the EXIF reader understands, used when `*` is configured.
pub const EXIF_SUPPORTED_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "jpe", "jfif", "tif", "tiff", "heic", "heif", "avif", "png", "webp",
];

/// Extensions checked by default.
pub const DEFAULT_EXIF_EXTENSIONS: &[&str] =
    &["jpg", "jpeg", "tif", "tiff", "heic", "heif", "png", "webp"];

/// Errors raised while building filters.
#[derive(Error, Debug)]
pub enum FilterError {
    /// A path pattern does not compile.
    #[error("Invalid regex pattern '{pattern}': {source}")]
    InvalidRegex {
        /// The offending pattern
        pattern: String,
        /// Compilation error
        #[source]
        source: regex::Error,
    },

    /// An extension list entry is not one the EXIF reader understands.
    #[error("Unsupported EXIF extension '{0}'")]
    InvalidExtension(String),
}

/// A predicate deciding whether an entry stays in an index.
pub trait EntryFilter: Send + Sync {
    /// Return `true` to keep `entry`.
    fn keep(&self, entry: &FileEntry) -> bool;

    /// Short name used in log lines.
    fn name(&self) -> &str {
        "custom"
    }
}

impl<F> EntryFilter for F
where
    F: Fn(&FileEntry) -> bool + Send + Sync,
{
    fn keep(&self, entry: &FileEntry) -> bool {
        self(entry)
    }
}

/// Drops zero-length files.
#[derive(Debug, Clone, Copy, Default)]
pub struct NonEmptyFilter;

impl EntryFilter for NonEmptyFilter {
    fn keep(&self, entry: &FileEntry) -> bool {
        entry.size > 0
    }

    fn name(&self) -> &str {
        "non-empty"
    }
}

/// Keeps entries whose path matches at least one pattern.
///
/// Patterns are unanchored searches over the full path. An empty pattern
/// list keeps everything.
#[derive(Debug, Clone, Default)]
pub struct RegexFilter {
    patterns: Vec<Regex>,
}

impl RegexFilter {
    /// Compile `patterns`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidRegex`] for the first pattern that does
    /// not compile.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> Result<Self, FilterError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p.as_ref()).map_err(|source| FilterError::InvalidRegex {
                    pattern: p.as_ref().to_string(),
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Number of compiled patterns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Check if no patterns are configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

impl EntryFilter for RegexFilter {
    fn keep(&self, entry: &FileEntry) -> bool {
        self.patterns.is_empty() || self.patterns.iter().any(|re| re.is_match(&entry.path))
    }

    fn name(&self) -> &str {
        "regex"
    }
}

/// Which side of a comparison the EXIF filter applies to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExifScope {
    /// Only the merged source indexes
    Sources,
    /// Only the target index
    Target,
    /// Both sides
    #[default]
    Both,
}

impl ExifScope {
    /// Whether source indexes are filtered.
    #[must_use]
    pub fn includes_sources(self) -> bool {
        matches!(self, Self::Sources | Self::Both)
    }

    /// Whether the target index is filtered.
    #[must_use]
    pub fn includes_target(self) -> bool {
        matches!(self, Self::Target | Self::Both)
    }
}

/// Keeps image files that carry an EXIF `Make` or `Model` tag in IFD0.
///
/// The file is read from disk at the entry's path. Files with another
/// extension, unreadable files and files without EXIF data are dropped.
#[derive(Debug, Clone)]
pub struct ExifFilter {
    extensions: Vec<String>,
}

impl ExifFilter {
    /// Build a filter for the given extensions, without leading dots.
    ///
    /// A `*` entry expands to [`EXIF_SUPPORTED_EXTENSIONS`].
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvalidExtension`] for an extension outside
    /// [`EXIF_SUPPORTED_EXTENSIONS`].
    pub fn new<S: AsRef<str>>(extensions: &[S]) -> Result<Self, FilterError> {
        if extensions.iter().any(|e| e.as_ref() == "*") {
            return Ok(Self {
                extensions: EXIF_SUPPORTED_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            });
        }

        let extensions = extensions
            .iter()
            .map(|e| {
                let ext = e.as_ref().trim_start_matches('.').to_ascii_lowercase();
                if EXIF_SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
                    Ok(ext)
                } else {
                    Err(FilterError::InvalidExtension(e.as_ref().to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { extensions })
    }

    /// The lowercase extensions this filter accepts.
    #[must_use]
    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    fn has_supported_extension(&self, path: &Path) -> bool {
        path.extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.extensions.iter().any(|e| *e == ext))
    }
}

impl Default for ExifFilter {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_EXIF_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
        }
    }
}

impl EntryFilter for ExifFilter {
    fn keep(&self, entry: &FileEntry) -> bool {
        let path = Path::new(&entry.path);
        self.has_supported_extension(path) && has_camera_metadata(path)
    }

    fn name(&self) -> &str {
        "exif"
    }
}

/// Whether the file at `path` has an EXIF IFD0 `Make` or `Model` field.
#[must_use]
pub fn has_camera_metadata(path: &Path) -> bool {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            log::debug!("Cannot open {} for EXIF: {}", path.display(), e);
            return false;
        }
    };

    match exif::Reader::new().read_from_container(&mut BufReader::new(file)) {
        Ok(data) => [exif::Tag::Make, exif::Tag::Model]
            .into_iter()
            .any(|tag| data.get_field(tag, exif::In::PRIMARY).is_some()),
        Err(e) => {
            log::trace!("No EXIF data in {}: {}", path.display(), e);
            false
        }
    }
}

/// An ordered list of filters applied together.
#[derive(Default)]
pub struct FilterSet {
    filters: Vec<Box<dyn EntryFilter>>,
}

impl std::fmt::Debug for FilterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.filters.iter().map(|filter| filter.name()))
            .finish()
    }
}

impl FilterSet {
    /// Create an empty filter set, which keeps everything.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter.
    #[must_use]
    pub fn with(mut self, filter: impl EntryFilter + 'static) -> Self {
        self.push(filter);
        self
    }

    /// Add a filter in place.
    pub fn push(&mut self, filter: impl EntryFilter + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Number of filters.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Check if the set holds no filters.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Whether every filter keeps `entry`.
    #[must_use]
    pub fn keep(&self, entry: &FileEntry) -> bool {
        self.filters.iter().all(|f| f.keep(entry))
    }

    /// Drop every entry of `index` rejected by any filter.
    ///
    /// Returns the number of entries dropped.
    pub fn apply(&self, index: &mut Index) -> usize {
        if self.filters.is_empty() {
            return 0;
        }
        let dropped = index.retain(|entry| self.keep(entry));
        log::debug!("Filters {:?} dropped {} entries", self, dropped);
        dropped
    }
}
