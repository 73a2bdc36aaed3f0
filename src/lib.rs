//! archman - content-addressable archive indexer
//!
//! archman fingerprints every file of an archive (a directory tree) into a
//! size-bucketed index, persists it, and compares indexes to answer two
//! questions: which files of a target archive are missing from the union of
//! a set of source archives, and which files are duplicated within an
//! archive.
//!
//! # Architecture
//!
//! * [`scanner`]: directory walking and sampled SHA-1 fingerprints
//! * [`index`]: size-bucketed indexes, their construction and persistence
//! * [`compare`]: merge, missing-file diff and duplicate clustering
//! * [`filter`]: predicates that shrink an index before comparison
//! * [`output`]: text and JSON reports
//! * [`cli`], [`config`], [`logging`], [`progress`], [`error`]: the
//!   application shell driven by [`run_app`]

pub mod cli;
pub mod compare;
pub mod config;
pub mod error;
pub mod filter;
pub mod index;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bytesize::ByteSize;
use yansi::Paint;

use crate::cli::{Cli, Commands, DuplicatesArgs, IndexArgs, MissingArgs, OutputFormat, RunArgs};
use crate::compare::{Cluster, DuplicateSummary};
use crate::config::Config;
use crate::error::ExitCode;
use crate::filter::EntryFilter;
use crate::index::{Archive, DirectoryIndexer, FileEntry, Index};
use crate::output::Report;
use crate::progress::Progress;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error if the configuration is unusable, the target archive
/// (or every source archive) cannot be indexed or loaded, or a report cannot
/// be written.
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet, cli.no_color);
    if cli.no_color {
        yansi::disable();
    }

    let mut config =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    let app = App { quiet: cli.quiet };

    match cli.command {
        Commands::Index(args) => {
            config.merge_indexing_args(&args.indexing);
            app.index(&config, &args)
        }
        Commands::Missing(args) => {
            config.merge_indexing_args(&args.indexing);
            app.missing(&config, args)
        }
        Commands::Duplicates(args) => {
            config.merge_indexing_args(&args.indexing);
            app.duplicates(&config, &args)
        }
        Commands::Run(args) => {
            config.merge_indexing_args(&args.indexing);
            app.run(&config, &args)
        }
    }
}

/// Master and target indexes after merging and filtering.
#[derive(Debug)]
pub struct Comparison {
    /// Merge of every source archive that could be read
    pub master: Index,
    /// The target archive's index
    pub target: Index,
    /// Source archives skipped because they failed
    pub skipped_sources: usize,
}

impl Comparison {
    /// Index every archive, merge the sources and apply configured filters.
    ///
    /// A failing source is logged and skipped. A failing target, or every
    /// source failing, is an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the target or all sources fail, or the filter
    /// configuration is invalid.
    pub fn build(
        indexer: &DirectoryIndexer,
        config: &Config,
        sources: &[Archive],
        target: &Archive,
    ) -> Result<Self> {
        let mut indexes = Vec::with_capacity(sources.len());
        let mut skipped_sources = 0;
        for source in sources {
            match indexer.read_index(source) {
                Ok(index) => indexes.push(index),
                Err(e) => {
                    log::error!("Skipping source archive {}: {}", source, e);
                    skipped_sources += 1;
                }
            }
        }
        if indexes.is_empty() && skipped_sources > 0 {
            anyhow::bail!("All {} source archives failed to index", skipped_sources);
        }

        let mut master = compare::merge(indexes);
        log::info!(
            "Built master index containing {} buckets and {} files",
            master.bucket_count(),
            master.file_count()
        );

        let mut target = indexer
            .read_index(target)
            .with_context(|| format!("Failed to read target archive {target}"))?;

        let filters = config.entry_filters()?;
        filters.apply(&mut master);
        filters.apply(&mut target);

        if let Some((exif, scope)) = config.exif()? {
            if scope.includes_sources() {
                let dropped = master.retain(|e| exif.keep(e));
                log::info!("EXIF filter dropped {} source files", dropped);
            }
            if scope.includes_target() {
                let dropped = target.retain(|e| exif.keep(e));
                log::info!("EXIF filter dropped {} target files", dropped);
            }
        }

        Ok(Self {
            master,
            target,
            skipped_sources,
        })
    }

    /// Target entries with no counterpart in the master index.
    #[must_use]
    pub fn missing(&self) -> Vec<FileEntry> {
        let missing = compare::missing(&self.master, &self.target);
        log::info!(
            "Missing {} of {} target files",
            missing.len(),
            self.target.file_count()
        );
        missing
    }

    /// Duplicate clusters within the target.
    #[must_use]
    pub fn target_duplicates(&self) -> Vec<Cluster> {
        compare::duplicates(&self.target)
    }
}

#[derive(Debug)]
struct App {
    quiet: bool,
}

impl App {
    fn indexer(&self, config: &Config) -> DirectoryIndexer {
        let mut indexer_config = config.indexer_config();
        if !self.quiet {
            indexer_config = indexer_config.with_progress_callback(Arc::new(Progress::new(false)));
        }
        DirectoryIndexer::new(indexer_config)
    }

    fn index(&self, config: &Config, args: &IndexArgs) -> Result<ExitCode> {
        let archive = args.archive();
        let indexer = self.indexer(config);

        let created = !archive.is_indexed();
        let index = indexer
            .read_index(&archive)
            .with_context(|| format!("Failed to index archive {archive}"))?;

        let verb = if created { "Indexed" } else { "Loaded" };
        self.status(format_args!(
            "{} {}: {} files in {} size buckets, {}",
            verb.green().bold(),
            archive.root.display(),
            index.file_count(),
            index.bucket_count(),
            ByteSize(index.total_bytes())
        ));
        Ok(ExitCode::Success)
    }

    fn missing(&self, config: &Config, args: MissingArgs) -> Result<ExitCode> {
        let sources = if args.sources.is_empty() {
            config.require_sources()?.to_vec()
        } else {
            args.sources
        };
        let target = match args.target {
            Some(target) => target,
            None => config.require_target()?.clone(),
        };

        let comparison = Comparison::build(&self.indexer(config), config, &sources, &target)?;
        let missing = comparison.missing();

        write_report(Report::Missing(&missing), args.output.as_deref(), args.format)?;
        self.missing_summary(missing.len(), comparison.target.file_count());
        self.skipped_summary(comparison.skipped_sources);

        Ok(ExitCode::for_outcome(
            !missing.is_empty(),
            comparison.skipped_sources,
        ))
    }

    fn duplicates(&self, config: &Config, args: &DuplicatesArgs) -> Result<ExitCode> {
        let mut index = self
            .indexer(config)
            .read_index(&args.archive)
            .with_context(|| format!("Failed to read archive {}", args.archive))?;

        config.entry_filters()?.apply(&mut index);
        if let Some((exif, _)) = config.exif()? {
            index.retain(|e| exif.keep(e));
        }

        let clusters = compare::duplicates(&index);
        write_report(Report::Duplicates(&clusters), args.output.as_deref(), args.format)?;
        self.duplicates_summary(&clusters);

        Ok(ExitCode::for_outcome(!clusters.is_empty(), 0))
    }

    fn run(&self, config: &Config, args: &RunArgs) -> Result<ExitCode> {
        let sources = config.require_sources()?;
        let target = config.require_target()?;

        let comparison = Comparison::build(&self.indexer(config), config, sources, target)?;
        let missing = comparison.missing();
        let clusters = comparison.target_duplicates();

        std::fs::create_dir_all(&args.output_dir).with_context(|| {
            format!("Failed to create output directory {}", args.output_dir.display())
        })?;
        let millis = chrono::Utc::now().timestamp_millis();
        for report in [Report::Missing(&missing), Report::Duplicates(&clusters)] {
            let path = args
                .output_dir
                .join(report.timestamped_name(millis, args.format));
            report.write_file(&path, args.format)?;
            self.status(format_args!("{} {}", "Wrote".green(), path.display()));
        }

        self.missing_summary(missing.len(), comparison.target.file_count());
        self.duplicates_summary(&clusters);
        self.skipped_summary(comparison.skipped_sources);

        Ok(ExitCode::for_outcome(
            !missing.is_empty() || !clusters.is_empty(),
            comparison.skipped_sources,
        ))
    }

    fn missing_summary(&self, missing: usize, total: usize) {
        let count = if missing == 0 {
            missing.green().bold()
        } else {
            missing.yellow().bold()
        };
        self.status(format_args!("Missing {count} of {total} target files"));
    }

    fn duplicates_summary(&self, clusters: &[Cluster]) {
        let summary = DuplicateSummary::from_clusters(clusters);
        self.status(format_args!(
            "{} duplicate clusters, {} redundant files, {} reclaimable",
            summary.clusters.bold(),
            summary.duplicate_files,
            summary.reclaimable_display().cyan()
        ));
    }

    fn skipped_summary(&self, skipped: usize) {
        if skipped > 0 {
            self.status(format_args!(
                "{} {} source archives were skipped, see the log above",
                "Warning:".red().bold(),
                skipped
            ));
        }
    }

    /// Print a summary line to stderr unless quiet.
    fn status(&self, line: std::fmt::Arguments<'_>) {
        if !self.quiet {
            eprintln!("{line}");
        }
    }
}

/// Write `report` to `path`, or to stdout when no path is given.
fn write_report(report: Report<'_>, path: Option<&Path>, format: OutputFormat) -> Result<()> {
    match path {
        Some(path) => report
            .write_file(path, format)
            .with_context(|| format!("Failed to write report to {}", path.display())),
        None => {
            let stdout = std::io::stdout();
            let mut lock = stdout.lock();
            report.write_to(&mut lock, format)?;
            lock.flush()?;
            Ok(())
        }
    }
}
