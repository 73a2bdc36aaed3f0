//! Command-line interface definitions for archman.
//!
//! This module defines all CLI arguments, subcommands, and options using the clap derive API.
//! Global options (verbosity, color, configuration file) apply to every subcommand.
//!
//! # Example
//!
//! ```bash
//! # Index one archive (or print the stats of an existing index)
//! archman index ~/Pictures ~/.cache/archman/pictures.idx
//!
//! # Which files on the phone are not in any backup?
//! archman missing \
//!     --source /mnt/backup1=/idx/backup1.idx \
//!     --source /mnt/backup2=/idx/backup2.idx \
//!     --target /media/phone=/idx/phone.idx
//!
//! # Duplicate clusters within one archive, as JSON
//! archman duplicates /mnt/backup1=/idx/backup1.idx --format json
//!
//! # Full pipeline from the configuration file
//! archman -v run --output-dir reports
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::index::Archive;

/// Content-addressable archive indexer.
///
/// archman fingerprints every file of an archive into a size-bucketed index,
/// then answers which files of one archive are missing from a set of others,
/// and which files are duplicated within an archive.
#[derive(Debug, Parser)]
#[command(name = "archman")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Report errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Configuration file (defaults to the platform config directory)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands for archman.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Index one archive, or load its existing index, and print its stats
    Index(IndexArgs),
    /// List target files with no counterpart in any source archive
    Missing(MissingArgs),
    /// List clusters of identical files within one archive
    Duplicates(DuplicatesArgs),
    /// Run the configured pipeline: missing files and duplicates
    Run(RunArgs),
}

/// Options shared by every subcommand that may build an index.
#[derive(Debug, Clone, Default, Args)]
pub struct IndexingArgs {
    /// Number of I/O threads for fingerprinting (default: 4)
    ///
    /// Lower values reduce disk thrashing on HDDs.
    #[arg(long, value_name = "N")]
    pub io_threads: Option<usize>,

    /// Follow symbolic links while indexing
    #[arg(long, overrides_with = "no_follow_symlinks")]
    pub follow_symlinks: bool,

    /// Do not follow symbolic links, even if the configuration says so
    #[arg(long, overrides_with = "follow_symlinks")]
    pub no_follow_symlinks: bool,
}

/// Arguments for the index subcommand.
#[derive(Debug, Args)]
pub struct IndexArgs {
    /// Directory to index
    #[arg(value_name = "ROOT")]
    pub root: PathBuf,

    /// Location of the index artifact
    #[arg(value_name = "INDEX")]
    pub index: PathBuf,

    #[command(flatten)]
    pub indexing: IndexingArgs,
}

impl IndexArgs {
    /// The archive described by the positional arguments.
    #[must_use]
    pub fn archive(&self) -> Archive {
        Archive::new(&self.root, &self.index)
    }
}

/// Arguments for the missing subcommand.
#[derive(Debug, Args)]
pub struct MissingArgs {
    /// Source archive as ROOT=INDEX (can be specified multiple times)
    ///
    /// Falls back to `sources` from the configuration when omitted.
    #[arg(short, long = "source", value_name = "ROOT=INDEX", value_parser = parse_archive)]
    pub sources: Vec<Archive>,

    /// Target archive as ROOT=INDEX
    ///
    /// Falls back to `target` from the configuration when omitted.
    #[arg(short, long, value_name = "ROOT=INDEX", value_parser = parse_archive)]
    pub target: Option<Archive>,

    /// Write the report to this file instead of stdout (never overwritten)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub indexing: IndexingArgs,
}

/// Arguments for the duplicates subcommand.
#[derive(Debug, Args)]
pub struct DuplicatesArgs {
    /// Archive to inspect as ROOT=INDEX
    #[arg(value_name = "ROOT=INDEX", value_parser = parse_archive)]
    pub archive: Archive,

    /// Write the report to this file instead of stdout (never overwritten)
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub indexing: IndexingArgs,
}

/// Arguments for the run subcommand.
#[derive(Debug, Args)]
pub struct RunArgs {
    /// Directory receiving missing-<millis> and duplicates-<millis> reports
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub output_dir: PathBuf,

    /// Report format
    #[arg(short, long, value_enum, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub indexing: IndexingArgs,
}

/// Output format for reports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One path per line
    #[default]
    Text,
    /// JSON document for scripting
    Json,
}

impl OutputFormat {
    /// File extension for reports in this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Text => "txt",
            OutputFormat::Json => "json",
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}

/// Parse an archive given as `ROOT=INDEX`.
///
/// The string is split at the first `=`, so index paths may contain `=`.
///
/// # Examples
///
/// ```
/// use archman::cli::parse_archive;
/// use std::path::PathBuf;
///
/// let archive = parse_archive("/mnt/photos=/idx/photos.idx").unwrap();
/// assert_eq!(archive.root, PathBuf::from("/mnt/photos"));
/// assert_eq!(archive.index, PathBuf::from("/idx/photos.idx"));
///
/// assert!(parse_archive("/mnt/photos").is_err());
/// ```
///
/// # Errors
///
/// Returns an error if there is no `=` or either side is empty.
pub fn parse_archive(s: &str) -> Result<Archive, String> {
    let (root, index) = s
        .split_once('=')
        .ok_or_else(|| format!("Expected ROOT=INDEX, got '{s}'"))?;

    let (root, index) = (root.trim(), index.trim());
    if root.is_empty() {
        return Err(format!("Archive root is empty in '{s}'"));
    }
    if index.is_empty() {
        return Err(format!("Index path is empty in '{s}'"));
    }

    Ok(Archive::new(root, index))
}
