use archman::config::Config;
use archman::index::{Archive, DirectoryIndexer};
use archman::Comparison;

use super::fixtures::{content, write, Workspace};

fn names(entries: &[archman::index::FileEntry]) -> Vec<String> {
    let mut names: Vec<String> = entries
        .iter()
        .map(|e| {
            std::path::Path::new(&e.path)
                .file_name()
                .unwrap()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

/// Two backups and a phone sharing some files.
fn scenario(ws: &Workspace) -> (Vec<Archive>, Archive) {
    let backup1 = ws.archive("backup1");
    let backup2 = ws.archive("backup2");
    let phone = ws.archive("phone");

    write(&backup1.root, "2019/a.jpg", &content(3000, 1));
    write(&backup1.root, "2019/b.jpg", &content(4000, 2));
    write(&backup2.root, "2020/c.jpg", &content(5000, 3));

    write(&phone.root, "DCIM/a-copy.jpg", &content(3000, 1));
    write(&phone.root, "DCIM/c-copy.jpg", &content(5000, 3));
    write(&phone.root, "DCIM/new.jpg", &content(3000, 99));
    write(&phone.root, "DCIM/new-dup.jpg", &content(3000, 99));
    write(&phone.root, "notes.txt", &content(120, 4));
    write(&phone.root, "empty.txt", b"");

    (vec![backup1, backup2], phone)
}

#[test]
fn test_missing_across_merged_sources() {
    let ws = Workspace::new();
    let (sources, target) = scenario(&ws);
    let config = Config::default();

    let comparison =
        Comparison::build(&DirectoryIndexer::with_defaults(), &config, &sources, &target).unwrap();

    assert_eq!(comparison.skipped_sources, 0);
    assert_eq!(comparison.master.file_count(), 3);
    assert_eq!(
        names(&comparison.missing()),
        vec!["empty.txt", "new-dup.jpg", "new.jpg", "notes.txt"]
    );

    let clusters = comparison.target_duplicates();
    assert_eq!(clusters.len(), 1);
    assert_eq!(names(&clusters[0].entries), vec!["new-dup.jpg", "new.jpg"]);
}

#[test]
fn test_filters_shrink_both_sides() {
    let ws = Workspace::new();
    let (sources, target) = scenario(&ws);
    let config = Config {
        ignore_empty_files: true,
        regex_filters: vec![r"\.jpg$".to_string()],
        ..Config::default()
    };

    let comparison =
        Comparison::build(&DirectoryIndexer::with_defaults(), &config, &sources, &target).unwrap();

    assert_eq!(comparison.target.file_count(), 4);
    assert!(comparison.target.bucket(0).is_none());
    assert_eq!(names(&comparison.missing()), vec!["new-dup.jpg", "new.jpg"]);
}

#[test]
fn test_exif_filter_drops_plain_files() {
    let ws = Workspace::new();
    let (sources, target) = scenario(&ws);
    let mut config = Config::default();
    config.exif_filter.enabled = true;

    let comparison =
        Comparison::build(&DirectoryIndexer::with_defaults(), &config, &sources, &target).unwrap();

    // None of the generated files carry camera metadata
    assert!(comparison.master.is_empty());
    assert!(comparison.target.is_empty());
    assert!(comparison.missing().is_empty());
}

#[test]
fn test_exif_scope_sources_leaves_target_alone() {
    let ws = Workspace::new();
    let (sources, target) = scenario(&ws);
    let mut config = Config::default();
    config.exif_filter.enabled = true;
    config.exif_filter.scope = archman::filter::ExifScope::Sources;

    let comparison =
        Comparison::build(&DirectoryIndexer::with_defaults(), &config, &sources, &target).unwrap();

    assert!(comparison.master.is_empty());
    assert_eq!(comparison.target.file_count(), 6);
    assert_eq!(comparison.missing().len(), 6);
}

#[test]
fn test_failed_source_is_skipped() {
    let ws = Workspace::new();
    let (mut sources, target) = scenario(&ws);
    sources.push(Archive::new(ws.path("no-such-root"), ws.path("idx/ghost.idx")));

    let comparison =
        Comparison::build(&DirectoryIndexer::with_defaults(), &Config::default(), &sources, &target)
            .unwrap();

    assert_eq!(comparison.skipped_sources, 1);
    assert_eq!(comparison.master.file_count(), 3);
}

#[test]
fn test_all_sources_failing_is_an_error() {
    let ws = Workspace::new();
    let (_, target) = scenario(&ws);
    let sources = vec![Archive::new(ws.path("nope"), ws.path("idx/nope.idx"))];

    let result =
        Comparison::build(&DirectoryIndexer::with_defaults(), &Config::default(), &sources, &target);

    assert!(result.is_err());
}

#[test]
fn test_failed_target_is_an_error() {
    let ws = Workspace::new();
    let (sources, _) = scenario(&ws);
    let target = Archive::new(ws.path("missing-target"), ws.path("idx/t.idx"));

    let err =
        Comparison::build(&DirectoryIndexer::with_defaults(), &Config::default(), &sources, &target)
            .unwrap_err();

    assert!(err.to_string().contains("Failed to read target archive"));
}

#[test]
fn test_source_with_oversized_length_prefix_is_skipped() {
    let ws = Workspace::new();
    let (mut sources, target) = scenario(&ws);
    let damaged = ws.archive("damaged");
    write(&damaged.root, "x.bin", &content(10, 1));
    let mut artifact = b"ARCHIDX\0".to_vec();
    artifact.push(0x01);
    artifact.push(0xFD);
    artifact.extend_from_slice(&(1u64 << 62).to_le_bytes());
    artifact.extend_from_slice(b"abc");
    std::fs::create_dir_all(damaged.index.parent().unwrap()).unwrap();
    std::fs::write(&damaged.index, &artifact).unwrap();
    sources.push(damaged);

    let comparison =
        Comparison::build(&DirectoryIndexer::with_defaults(), &Config::default(), &sources, &target)
            .unwrap();

    assert_eq!(comparison.skipped_sources, 1);
    assert_eq!(comparison.master.file_count(), 3);
}
