use std::fs;
use std::path::{Path, PathBuf};

use archman::cli::Cli;
use archman::error::ExitCode;
use archman::run_app;
use clap::Parser;

use super::fixtures::{content, write, Workspace};

fn cli(args: &[&str]) -> Cli {
    Cli::try_parse_from(std::iter::once("archman").chain(args.iter().copied())).unwrap()
}

fn archive_arg(root: &Path, index: &Path) -> String {
    format!("{}={}", root.display(), index.display())
}

/// Config file naming one source and one target.
fn write_config(ws: &Workspace, extra: &str) -> PathBuf {
    let source = ws.archive("source");
    let target = ws.archive("target");
    write(&source.root, "kept.bin", &content(3000, 1));
    write(&target.root, "kept-copy.bin", &content(3000, 1));
    write(&target.root, "only-here.bin", &content(2500, 2));

    let config = format!(
        r#"{extra}
[[sources]]
root = '{}'
index = '{}'

[target]
root = '{}'
index = '{}'
"#,
        source.root.display(),
        source.index.display(),
        target.root.display(),
        target.index.display()
    );
    write(ws.dir.path(), "config.toml", config.as_bytes())
}

fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    files.sort();
    files
}

#[test]
fn test_index_command_creates_then_loads() {
    let ws = Workspace::new();
    let archive = ws.archive("photos");
    write(&archive.root, "a.jpg", &content(10, 1));
    let config = write(ws.dir.path(), "empty.toml", b"");
    let root = archive.root.to_string_lossy().into_owned();
    let index = archive.index.to_string_lossy().into_owned();
    let config = config.to_string_lossy().into_owned();

    let args = ["-q", "-c", config.as_str(), "index", root.as_str(), index.as_str()];
    assert_eq!(run_app(cli(&args)).unwrap(), ExitCode::Success);
    assert!(archive.is_indexed());

    let before = fs::read(&archive.index).unwrap();
    assert_eq!(run_app(cli(&args)).unwrap(), ExitCode::Success);
    assert_eq!(fs::read(&archive.index).unwrap(), before);
}

#[test]
fn test_missing_command_writes_text_report() {
    let ws = Workspace::new();
    let source = ws.archive("s");
    let target = ws.archive("t");
    write(&source.root, "shared.bin", &content(100, 1));
    write(&target.root, "shared.bin", &content(100, 1));
    let lost = write(&target.root, "deep/lost.bin", &content(200, 2));
    let config = write(ws.dir.path(), "empty.toml", b"");
    let output = ws.path("missing.txt");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "missing",
        "--source",
        &archive_arg(&source.root, &source.index),
        "--target",
        &archive_arg(&target.root, &target.index),
        "--output",
        &output.to_string_lossy(),
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        fs::read_to_string(&output).unwrap(),
        format!("{}\n", lost.display())
    );
}

#[test]
fn test_missing_command_nothing_found() {
    let ws = Workspace::new();
    let source = ws.archive("s");
    let target = ws.archive("t");
    write(&source.root, "x.bin", &content(100, 1));
    write(&target.root, "y.bin", &content(100, 1));
    let config = write(ws.dir.path(), "empty.toml", b"");
    let output = ws.path("missing.json");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "missing",
        "-s",
        &archive_arg(&source.root, &source.index),
        "-t",
        &archive_arg(&target.root, &target.index),
        "-o",
        &output.to_string_lossy(),
        "-f",
        "json",
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::NothingFound);
    let parsed: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(parsed["count"], 0);
}

#[test]
fn test_missing_command_falls_back_to_config() {
    let ws = Workspace::new();
    let config = write_config(&ws, "");
    let output = ws.path("from-config.txt");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "missing",
        "--output",
        &output.to_string_lossy(),
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let report = fs::read_to_string(&output).unwrap();
    assert_eq!(report.lines().count(), 1);
    assert!(report.trim_end().ends_with("only-here.bin"));
}

#[test]
fn test_missing_command_without_archives_fails() {
    let ws = Workspace::new();
    let config = write(ws.dir.path(), "empty.toml", b"");

    let result = run_app(cli(&["-q", "-c", &config.to_string_lossy(), "missing"]));

    assert!(result.is_err());
}

#[test]
fn test_output_file_is_never_overwritten() {
    let ws = Workspace::new();
    let config = write_config(&ws, "");
    let output = write(ws.dir.path(), "taken.txt", b"precious");

    let result = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "missing",
        "--output",
        &output.to_string_lossy(),
    ]));

    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&output).unwrap(), "precious");
}

#[test]
fn test_duplicates_command_writes_clusters() {
    let ws = Workspace::new();
    let archive = ws.archive("dups");
    let bytes = content(3555, 5);
    write(&archive.root, "d1.txt", &bytes);
    write(&archive.root, "d2.txt", &bytes);
    write(&archive.root, "other.txt", &content(3555, 6));
    let config = write(ws.dir.path(), "empty.toml", b"");
    let output = ws.path("dups.txt");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "duplicates",
        &archive_arg(&archive.root, &archive.index),
        "--output",
        &output.to_string_lossy(),
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let report = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = report.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with("# 3555 bytes, "));
    assert!(lines[1].ends_with("d1.txt"));
    assert!(lines[2].ends_with("d2.txt"));
}

#[test]
fn test_duplicates_command_nothing_found() {
    let ws = Workspace::new();
    let archive = ws.archive("unique");
    write(&archive.root, "a", &content(10, 1));
    write(&archive.root, "b", &content(10, 2));
    let config = write(ws.dir.path(), "empty.toml", b"");
    let output = ws.path("dups.txt");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "duplicates",
        &archive_arg(&archive.root, &archive.index),
        "-o",
        &output.to_string_lossy(),
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::NothingFound);
    assert_eq!(fs::read_to_string(&output).unwrap(), "");
}

#[test]
fn test_run_command_writes_timestamped_reports() {
    let ws = Workspace::new();
    let config = write_config(&ws, "io_threads = 2");
    let reports = ws.path("reports");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "run",
        "--output-dir",
        &reports.to_string_lossy(),
        "--format",
        "json",
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    let files = files_in(&reports);
    assert_eq!(files.len(), 2);

    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert!(names[0].starts_with("duplicates-") && names[0].ends_with(".json"));
    assert!(names[1].starts_with("missing-") && names[1].ends_with(".json"));

    let missing: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&files[1]).unwrap()).unwrap();
    assert_eq!(missing["count"], 1);
    let duplicates: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&files[0]).unwrap()).unwrap();
    assert_eq!(duplicates["summary"]["clusters"], 0);
}

#[test]
fn test_run_command_partial_when_source_fails() {
    let ws = Workspace::new();
    let ghost_root = ws.path("ghost");
    let ghost_index = ws.path("idx/ghost.idx");
    let extra = format!(
        "[[sources]]\nroot = '{}'\nindex = '{}'\n",
        ghost_root.display(),
        ghost_index.display()
    );
    let config = write_config(&ws, &extra);
    let reports = ws.path("reports");

    let code = run_app(cli(&[
        "-q",
        "-c",
        &config.to_string_lossy(),
        "run",
        "--output-dir",
        &reports.to_string_lossy(),
    ]))
    .unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
    assert_eq!(files_in(&reports).len(), 2);
}

#[test]
fn test_explicit_missing_config_is_an_error() {
    let ws = Workspace::new();
    let result = run_app(cli(&[
        "-q",
        "-c",
        &ws.path("absent.toml").to_string_lossy(),
        "run",
    ]));

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("Configuration file not found"));
}
