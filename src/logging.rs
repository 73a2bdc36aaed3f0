//! Logging setup for archman.
//!
//! Logging goes through the `log` facade with an `env_logger` backend. The
//! level is chosen, in priority order, by:
//!
//! 1. the `RUST_LOG` environment variable, if set
//! 2. `--quiet` (errors only) or `--verbose` (debug, then trace)
//! 3. the default, info
//!
//! Debug builds prefix each line with a timestamp, and with the module path
//! from `-v` on. Release builds print the level and message only.
//!
//! # Example
//!
//! ```rust,no_run
//! use archman::logging::init_logging;
//!
//! init_logging(1, false, false);
//! log::debug!("visible with -v");
//! ```

use env_logger::{Builder, WriteStyle};
use log::LevelFilter;
use std::env;
use std::io::Write;

/// Initialize the logger from CLI verbosity flags.
///
/// Calling this more than once leaves the first logger in place and logs the
/// refusal at debug level.
///
/// # Arguments
///
/// * `verbose` - Verbosity count from CLI (0=info, 1=debug, 2+=trace)
/// * `quiet` - Only show errors (overridden by `RUST_LOG`)
/// * `no_color` - Never color the level names
pub fn init_logging(verbose: u8, quiet: bool, no_color: bool) {
    let rust_log = env::var("RUST_LOG").ok();

    let mut builder = Builder::new();
    match &rust_log {
        Some(_) => {
            builder.parse_default_env();
        }
        None => {
            builder.filter_level(determine_level(verbose, quiet));
        }
    }

    if no_color {
        builder.write_style(WriteStyle::Never);
    }
    configure_format(&mut builder, verbose);

    if let Err(e) = builder.try_init() {
        log::debug!("Logger already initialized: {}", e);
        return;
    }

    match rust_log {
        Some(filter) => log::debug!("Logging configured from RUST_LOG={}", filter),
        None => log::debug!("Logging initialized at level: {}", current_level_name()),
    }
}

/// Map CLI flags to a level filter. `quiet` wins over `verbose`.
fn determine_level(verbose: u8, quiet: bool) -> LevelFilter {
    if quiet {
        return LevelFilter::Error;
    }
    match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

fn configure_format(builder: &mut Builder, verbose: u8) {
    #[cfg(debug_assertions)]
    {
        builder.format(move |buf, record| {
            let timestamp = buf.timestamp_seconds();
            let level = record.level();
            let level_style = buf.default_level_style(level);

            if verbose >= 1 {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} [{}] {}",
                    timestamp,
                    level,
                    record.module_path().unwrap_or("unknown"),
                    record.args()
                )
            } else {
                writeln!(
                    buf,
                    "{} {level_style}{:<5}{level_style:#} {}",
                    timestamp,
                    level,
                    record.args()
                )
            }
        });
    }

    #[cfg(not(debug_assertions))]
    {
        let _ = verbose;
        builder.format(|buf, record| {
            let level = record.level();
            let level_style = buf.default_level_style(level);
            writeln!(
                buf,
                "{level_style}{:<5}{level_style:#} {}",
                level,
                record.args()
            )
        });
    }
}

/// Name of the maximum enabled log level.
pub fn current_level_name() -> &'static str {
    match log::max_level() {
        LevelFilter::Off => "off",
        LevelFilter::Error => "error",
        LevelFilter::Warn => "warn",
        LevelFilter::Info => "info",
        LevelFilter::Debug => "debug",
        LevelFilter::Trace => "trace",
    }
}
