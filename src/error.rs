//! Exit codes and structured error reporting for the binary.

use serde::Serialize;

use crate::config::ConfigError;
use crate::index::IndexError;
use crate::output::OutputError;

/// Exit codes for archman.
///
/// - 0: Success (completed, results found)
/// - 1: General error
/// - 2: Nothing found (completed, no missing files and no duplicates)
/// - 3: Partial success (some source archive failed, the rest was processed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Completed and reported at least one result.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// Completed with nothing to report.
    NothingFound = 2,
    /// Completed, but at least one archive had to be skipped.
    PartialSuccess = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "AM000",
            Self::GeneralError => "AM001",
            Self::NothingFound => "AM002",
            Self::PartialSuccess => "AM003",
        }
    }

    /// Code for a completed run: partial beats empty beats success.
    #[must_use]
    pub fn for_outcome(found_results: bool, skipped_archives: usize) -> Self {
        if skipped_archives > 0 {
            Self::PartialSuccess
        } else if found_results {
            Self::Success
        } else {
            Self::NothingFound
        }
    }
}

/// Coarse classification of a failure, for scripts reading `--json-errors`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Configuration could not be loaded or is invalid
    Config,
    /// An index could not be built, saved or loaded
    Index,
    /// A report could not be written
    Output,
    /// Anything else
    Other,
}

impl ErrorKind {
    /// Classify an error by its outermost known cause.
    #[must_use]
    pub fn of(err: &anyhow::Error) -> Self {
        err.chain()
            .find_map(|cause| {
                if cause.is::<ConfigError>() {
                    Some(Self::Config)
                } else if cause.is::<IndexError>() {
                    Some(Self::Index)
                } else if cause.is::<OutputError>() {
                    Some(Self::Output)
                } else {
                    None
                }
            })
            .unwrap_or(Self::Other)
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "AM001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Error classification
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
    /// Messages of the underlying causes, outermost first
    pub causes: Vec<String>,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            kind: ErrorKind::of(err),
            message: err.to_string(),
            causes: err.chain().skip(1).map(ToString::to_string).collect(),
        }
    }
}
