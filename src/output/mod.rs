//! Report writers for comparison results.
//!
//! This module renders results in two formats:
//! - plain text, one path per line, for shell pipelines
//! - JSON for automation and scripting
//!
//! Report files are created with create-new semantics: an existing file is
//! never overwritten.
//!
//! # Example
//!
//! ```
//! use archman::cli::OutputFormat;
//! use archman::index::FileEntry;
//! use archman::output::Report;
//!
//! let missing = vec![FileEntry::new("/photos/a.jpg", 10, "f1")];
//! let mut out = Vec::new();
//! Report::Missing(&missing).write_to(&mut out, OutputFormat::Text).unwrap();
//! assert_eq!(out, b"/photos/a.jpg\n");
//! ```

pub mod json;
pub mod text;

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::cli::OutputFormat;
use crate::compare::Cluster;
use crate::index::FileEntry;

pub use json::{JsonCluster, JsonDuplicatesOutput, JsonMissingOutput};

/// Errors that can occur while writing a report.
#[derive(thiserror::Error, Debug)]
pub enum OutputError {
    /// The report file already exists.
    #[error("Output file already exists: {0}")]
    AlreadyExists(PathBuf),

    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error writing report: {0}")]
    Io(#[from] io::Error),
}

/// A result set ready to be written.
#[derive(Debug, Clone, Copy)]
pub enum Report<'a> {
    /// Entries with no counterpart in the reference
    Missing(&'a [FileEntry]),
    /// Duplicate clusters
    Duplicates(&'a [Cluster]),
}

impl Report<'_> {
    /// Stem used for timestamped file names.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Report::Missing(_) => "missing",
            Report::Duplicates(_) => "duplicates",
        }
    }

    /// Number of top-level items: entries or clusters.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Report::Missing(entries) => entries.len(),
            Report::Duplicates(clusters) => clusters.len(),
        }
    }

    /// Check if the report holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Render the report to `writer`.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, format: OutputFormat) -> Result<(), OutputError> {
        match (self, format) {
            (Report::Missing(entries), OutputFormat::Text) => text::write_missing(writer, entries)?,
            (Report::Duplicates(clusters), OutputFormat::Text) => {
                text::write_duplicates(writer, clusters)?;
            }
            (Report::Missing(entries), OutputFormat::Json) => {
                JsonMissingOutput::new(entries).write_to(writer)?;
            }
            (Report::Duplicates(clusters), OutputFormat::Json) => {
                JsonDuplicatesOutput::new(clusters).write_to(writer)?;
            }
        }
        Ok(())
    }

    /// Render the report into a new file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`OutputError::AlreadyExists`] if `path` exists, or an I/O or
    /// serialization error.
    pub fn write_file(&self, path: &Path, format: OutputFormat) -> Result<(), OutputError> {
        let mut writer = BufWriter::new(create_new(path)?);
        self.write_to(&mut writer, format)?;
        writer.flush()?;
        log::info!("Wrote {} {} to {}", self.len(), self.kind(), path.display());
        Ok(())
    }

    /// File name `<kind>-<millis>.<ext>` for a run started at `millis`.
    #[must_use]
    pub fn timestamped_name(&self, millis: i64, format: OutputFormat) -> String {
        format!("{}-{}.{}", self.kind(), millis, format.extension())
    }
}

/// Open `path` for writing, failing if it already exists.
///
/// # Errors
///
/// Returns [`OutputError::AlreadyExists`] or the underlying I/O error.
pub fn create_new(path: &Path) -> Result<File, OutputError> {
    OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => OutputError::AlreadyExists(path.to_path_buf()),
            _ => OutputError::Io(e),
        })
}
