use std::fs;
use std::sync::Mutex;

use archman::cli::{Cli, Commands};
use archman::config::{Config, ConfigError};
use archman::filter::ExifScope;
use archman::index::Archive;
use clap::Parser;
use figment::providers::Serialized;
use figment::Figment;
use tempfile::tempdir;

/// Serializes tests that read `ARCHMAN_` variables.
static ENV_MUTEX: Mutex<()> = Mutex::new(());

#[test]
fn test_config_load_defaults() {
    // Figment without Env so other tests' variables cannot leak in
    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .extract()
        .unwrap();
    assert_eq!(config.io_threads, 4);
    assert!(config.sources.is_empty());
    assert!(!config.exif_filter.enabled);
}

#[test]
fn test_config_load_from_env() {
    let _guard = ENV_MUTEX.lock().unwrap();
    std::env::set_var("ARCHMAN_IO_THREADS", "7");
    std::env::set_var("ARCHMAN_FOLLOW_SYMLINKS", "true");

    let config: Config = Config::figment(None).extract().unwrap();

    std::env::remove_var("ARCHMAN_IO_THREADS");
    std::env::remove_var("ARCHMAN_FOLLOW_SYMLINKS");

    assert_eq!(config.io_threads, 7);
    assert!(config.follow_symlinks);
}

#[test]
fn test_config_load_from_toml() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        r#"
regex_filters = ['(?i)\.jpe?g$', '\.png$']
ignore_empty_files = true

[[sources]]
root = "/mnt/backup1"
index = "/var/lib/archman/backup1.idx"

[target]
root = "/media/phone"
index = "/var/lib/archman/phone.idx"

[exif_filter]
enabled = true
extensions = ["*"]
scope = "sources"
"#,
    )
    .unwrap();

    let config = Config::load(Some(&path)).unwrap();

    assert_eq!(
        config.sources,
        vec![Archive::new("/mnt/backup1", "/var/lib/archman/backup1.idx")]
    );
    assert_eq!(
        config.require_target().unwrap(),
        &Archive::new("/media/phone", "/var/lib/archman/phone.idx")
    );
    assert_eq!(config.regex_filters.len(), 2);
    assert!(config.ignore_empty_files);

    let (exif, scope) = config.exif().unwrap().unwrap();
    assert_eq!(scope, ExifScope::Sources);
    assert!(exif.extensions().contains(&"heic".to_string()));
}

#[test]
fn test_invalid_regex_in_file_is_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "regex_filters = ['(unclosed']\n").unwrap();

    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Filter(_))
    ));
}

#[test]
fn test_unknown_exif_extension_is_rejected() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[exif_filter]\nextensions = ['docx']\n").unwrap();

    assert!(matches!(
        Config::load(Some(&path)),
        Err(ConfigError::Filter(_))
    ));
}

#[test]
fn test_cli_flags_override_file() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = 2\nfollow_symlinks = true\n").unwrap();
    let mut config = Config::load_from(Some(&path)).unwrap();

    let cli = Cli::try_parse_from([
        "archman",
        "run",
        "--io-threads",
        "9",
        "--no-follow-symlinks",
    ])
    .unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    config.merge_indexing_args(&args.indexing);

    assert_eq!(config.io_threads, 9);
    assert!(!config.follow_symlinks);
    let indexer = config.indexer_config();
    assert_eq!(indexer.io_threads, 9);
}

#[test]
fn test_absent_flags_keep_file_values() {
    let _guard = ENV_MUTEX.lock().unwrap();
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "io_threads = 3\nfollow_symlinks = true\n").unwrap();
    let mut config = Config::load_from(Some(&path)).unwrap();

    let cli = Cli::try_parse_from(["archman", "run"]).unwrap();
    let Commands::Run(args) = cli.command else {
        panic!("expected run command");
    };
    config.merge_indexing_args(&args.indexing);

    assert_eq!(config.io_threads, 3);
    assert!(config.follow_symlinks);
}
