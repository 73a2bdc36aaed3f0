//! Application configuration management.
//!
//! Configuration is layered with figment, lowest precedence first:
//!
//! 1. built-in defaults
//! 2. a TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. environment variables prefixed `ARCHMAN_` (`__` separates nested keys)
//! 4. command-line flags, merged with [`Config::merge_indexing_args`]
//!
//! # Example file
//!
//! ```toml
//! regex_filters = ['(?i)\.(jpe?g|png|heic)$']
//! ignore_empty_files = true
//! io_threads = 8
//!
//! [[sources]]
//! root = "/mnt/backup1"
//! index = "/var/lib/archman/backup1.idx"
//!
//! [target]
//! root = "/media/phone"
//! index = "/var/lib/archman/phone.idx"
//!
//! [exif_filter]
//! enabled = true
//! extensions = ["jpg", "heic"]
//! scope = "both"
//! ```

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use crate::cli::IndexingArgs;
use crate::filter::{
    ExifFilter, ExifScope, FilterError, FilterSet, NonEmptyFilter, RegexFilter,
    DEFAULT_EXIF_EXTENSIONS,
};
use crate::index::{Archive, IndexerConfig};
use crate::scanner::WalkerConfig;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "ARCHMAN_";

/// Errors that can occur while loading or validating the configuration.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    /// An explicitly requested configuration file does not exist.
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// A provider failed or a value has the wrong type.
    #[error("Invalid configuration: {0}")]
    Invalid(#[from] Box<figment::Error>),

    /// A filter setting is invalid.
    #[error("Invalid filter configuration: {0}")]
    Filter(#[from] FilterError),

    /// `io_threads` is zero.
    #[error("io_threads must be at least 1")]
    NoThreads,

    /// A command needs an archive that was not given.
    #[error("No {0} archive configured (pass it on the command line or set it in the configuration file)")]
    MissingArchive(&'static str),
}

/// EXIF camera-metadata filter settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExifFilterConfig {
    /// Whether the filter runs at all
    pub enabled: bool,
    /// Extensions to inspect; `*` selects every supported one
    pub extensions: Vec<String>,
    /// Which side of the comparison is filtered
    pub scope: ExifScope,
}

impl Default for ExifFilterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            extensions: DEFAULT_EXIF_EXTENSIONS.iter().map(|e| (*e).to_string()).collect(),
            scope: ExifScope::Both,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Archives merged into the master index
    pub sources: Vec<Archive>,
    /// Archive checked against the master index
    pub target: Option<Archive>,
    /// Keep only entries whose path matches one of these; empty keeps all
    pub regex_filters: Vec<String>,
    /// Drop zero-length files before comparing
    pub ignore_empty_files: bool,
    /// EXIF camera-metadata filter
    pub exif_filter: ExifFilterConfig,
    /// Threads used for fingerprinting
    pub io_threads: usize,
    /// Follow symbolic links while indexing
    pub follow_symlinks: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sources: Vec::new(),
            target: None,
            regex_filters: Vec::new(),
            ignore_empty_files: false,
            exif_filter: ExifFilterConfig::default(),
            io_threads: 4,
            follow_symlinks: false,
        }
    }
}

impl Config {
    /// Load configuration from `path`, or from the default location.
    ///
    /// A missing default file is not an error; a missing explicit file is.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] for a missing explicit file, and
    /// [`ConfigError::Invalid`] or a validation error otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(explicit) => {
                if !explicit.is_file() {
                    return Err(ConfigError::NotFound(explicit.to_path_buf()));
                }
                Some(explicit.to_path_buf())
            }
            None => Self::default_path().filter(|p| p.is_file()),
        };

        match &path {
            Some(p) => log::debug!("Loading configuration from {}", p.display()),
            None => log::debug!("No configuration file, using defaults and environment"),
        }

        Self::load_from(path.as_deref())
    }

    /// Load configuration layering defaults, `path` (if any) and environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if extraction fails, or a validation
    /// error.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config: Config = Self::figment(path).extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    /// The figment used by [`Config::load_from`].
    #[must_use]
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// The platform-specific default configuration file.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("org", "archman", "archman").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Check values that deserialize fine but cannot be used.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NoThreads`] or [`ConfigError::Filter`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.io_threads == 0 {
            return Err(ConfigError::NoThreads);
        }
        RegexFilter::new(&self.regex_filters)?;
        ExifFilter::new(&self.exif_filter.extensions)?;
        Ok(())
    }

    /// Apply command-line indexing flags on top of the loaded values.
    pub fn merge_indexing_args(&mut self, args: &IndexingArgs) {
        if let Some(threads) = args.io_threads {
            self.io_threads = threads;
        }
        if args.follow_symlinks {
            self.follow_symlinks = true;
        } else if args.no_follow_symlinks {
            self.follow_symlinks = false;
        }
    }

    /// Indexer settings derived from this configuration.
    #[must_use]
    pub fn indexer_config(&self) -> IndexerConfig {
        IndexerConfig::default()
            .with_io_threads(self.io_threads)
            .with_walker_config(WalkerConfig::default().with_follow_symlinks(self.follow_symlinks))
    }

    /// Filters applied to both sides of every comparison.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Filter`] for an invalid regex.
    pub fn entry_filters(&self) -> Result<FilterSet, ConfigError> {
        let mut filters = FilterSet::new();
        if self.ignore_empty_files {
            filters.push(NonEmptyFilter);
        }
        let regex = RegexFilter::new(&self.regex_filters)?;
        if !regex.is_empty() {
            filters.push(regex);
        }
        Ok(filters)
    }

    /// The EXIF filter, if enabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Filter`] for an invalid extension.
    pub fn exif(&self) -> Result<Option<(ExifFilter, ExifScope)>, ConfigError> {
        if !self.exif_filter.enabled {
            return Ok(None);
        }
        let filter = ExifFilter::new(&self.exif_filter.extensions)?;
        Ok(Some((filter, self.exif_filter.scope)))
    }

    /// The configured target archive.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingArchive`] if none is configured.
    pub fn require_target(&self) -> Result<&Archive, ConfigError> {
        self.target.as_ref().ok_or(ConfigError::MissingArchive("target"))
    }

    /// The configured source archives, at least one.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingArchive`] if the list is empty.
    pub fn require_sources(&self) -> Result<&[Archive], ConfigError> {
        if self.sources.is_empty() {
            return Err(ConfigError::MissingArchive("source"));
        }
        Ok(&self.sources)
    }
}
