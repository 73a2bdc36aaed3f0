use std::fs;
use std::path::Path;

use archman::compare::{duplicates, missing};
use archman::index::{store, Archive, DirectoryIndexer, IndexError, IndexerConfig};
use archman::scanner::fingerprint_bytes;

use super::fixtures::{content, write, Workspace};

#[test]
fn test_nested_tree_yields_one_bucket_per_size() {
    let ws = Workspace::new();
    let archive = ws.archive("tree");
    write(&archive.root, "gibberish1.txt", &content(3409, 1));
    write(&archive.root, "sub/gibberish2.txt", &content(3780, 2));

    let index = DirectoryIndexer::with_defaults().read_index(&archive).unwrap();

    assert_eq!(index.bucket_count(), 2);
    let small = index.bucket(3409).unwrap();
    let large = index.bucket(3780).unwrap();
    assert_eq!(small.len(), 1);
    assert_eq!(large.len(), 1);
    assert!(Path::new(&small[0].path).ends_with("gibberish1.txt"));
    assert!(Path::new(&large[0].path).ends_with("sub/gibberish2.txt"));
    assert!(Path::new(&large[0].path).is_absolute());
}

#[test]
fn test_identical_pair_forms_one_cluster() {
    let ws = Workspace::new();
    let archive = ws.archive("dups");
    let bytes = content(3555, 7);
    write(&archive.root, "d1.txt", &bytes);
    write(&archive.root, "d2.txt", &bytes);

    let index = DirectoryIndexer::with_defaults().read_index(&archive).unwrap();

    assert_eq!(index.bucket_count(), 1);
    let bucket = index.bucket(3555).unwrap();
    assert_eq!(bucket.len(), 2);
    assert_eq!(bucket[0].fingerprint, bucket[1].fingerprint);

    let clusters = duplicates(&index);
    assert_eq!(clusters.len(), 1);
    assert_eq!(clusters[0].len(), 2);
}

#[test]
fn test_reindexed_file_set_has_nothing_missing() {
    let ws = Workspace::new();
    let first = ws.archive("first");
    let second = ws.archive("second");
    for (rel, len, seed) in [("a.bin", 10, 1), ("x/b.bin", 5000, 2), ("x/y/c.bin", 0, 0)] {
        write(&first.root, rel, &content(len, seed));
        write(&second.root, &format!("moved/{rel}"), &content(len, seed));
    }

    let indexer = DirectoryIndexer::with_defaults();
    let a = indexer.read_index(&first).unwrap();
    let b = indexer.read_index(&second).unwrap();

    assert!(missing(&a, &b).is_empty());
    assert!(missing(&b, &a).is_empty());
}

#[test]
fn test_fingerprint_matches_manual_sample() {
    let ws = Workspace::new();
    let archive = ws.archive("sample");
    let bytes = content(5000, 3);
    write(&archive.root, "big.bin", &bytes);

    let index = DirectoryIndexer::with_defaults().read_index(&archive).unwrap();

    let mut sample = bytes[..1024].to_vec();
    sample.extend_from_slice(&bytes[bytes.len() - 1024..]);
    assert_eq!(index.bucket(5000).unwrap()[0].fingerprint, fingerprint_bytes(&sample));
}

#[test]
fn test_middle_only_difference_is_not_missing() {
    let ws = Workspace::new();
    let a = ws.archive("a");
    let b = ws.archive("b");
    let original = content(4096, 9);
    let mut edited = original.clone();
    edited[2048] ^= 0xFF;
    write(&a.root, "f.bin", &original);
    write(&b.root, "f.bin", &edited);

    let indexer = DirectoryIndexer::with_defaults();
    let ia = indexer.read_index(&a).unwrap();
    let ib = indexer.read_index(&b).unwrap();

    assert!(missing(&ia, &ib).is_empty());
}

#[test]
fn test_read_index_loads_existing_artifact_verbatim() {
    let ws = Workspace::new();
    let archive = ws.archive("frozen");
    write(&archive.root, "one.txt", b"one");

    let indexer = DirectoryIndexer::with_defaults();
    let first = indexer.read_index(&archive).unwrap();

    // Files added later are not picked up: a persisted index is immutable
    write(&archive.root, "two.txt", b"second file");
    let second = indexer.read_index(&archive).unwrap();

    assert_eq!(first, second);
    assert_eq!(second.file_count(), 1);
}

#[test]
fn test_create_index_refuses_existing_artifact() {
    let ws = Workspace::new();
    let archive = ws.archive("once");
    write(&archive.root, "f", b"x");

    let indexer = DirectoryIndexer::with_defaults();
    indexer.create_index(&archive).unwrap();
    let before = fs::read(&archive.index).unwrap();

    let result = indexer.create_index(&archive);

    assert!(matches!(result, Err(IndexError::AlreadyExists(_))));
    assert_eq!(fs::read(&archive.index).unwrap(), before);
}

#[test]
fn test_corrupt_artifact_is_fatal_and_kept() {
    let ws = Workspace::new();
    let archive = ws.archive("corrupt");
    write(&archive.root, "f", b"x");
    fs::create_dir_all(archive.index.parent().unwrap()).unwrap();
    fs::write(&archive.index, b"garbage that is not an index").unwrap();

    let result = DirectoryIndexer::with_defaults().read_index(&archive);

    assert!(matches!(result, Err(IndexError::Corrupt { .. })));
    assert_eq!(fs::read(&archive.index).unwrap(), b"garbage that is not an index");
}

#[test]
fn test_empty_artifact_counts_as_not_indexed() {
    let ws = Workspace::new();
    let archive = ws.archive("placeholder");
    write(&archive.root, "f", b"content");
    fs::create_dir_all(archive.index.parent().unwrap()).unwrap();
    fs::write(&archive.index, b"").unwrap();

    let index = DirectoryIndexer::with_defaults().read_index(&archive).unwrap();

    assert_eq!(index.file_count(), 1);
    assert!(archive.is_indexed());
}

#[test]
fn test_missing_root_is_fatal() {
    let ws = Workspace::new();
    let archive = Archive::new(ws.path("does-not-exist"), ws.path("idx/none.idx"));

    let result = DirectoryIndexer::with_defaults().read_index(&archive);

    assert!(matches!(result, Err(IndexError::RootNotFound(_))));
    assert!(!archive.index.exists());
}

#[test]
fn test_root_that_is_a_file_is_fatal() {
    let ws = Workspace::new();
    let file = write(ws.dir.path(), "plain.txt", b"x");
    let archive = Archive::new(file, ws.path("idx/plain.idx"));

    let result = DirectoryIndexer::with_defaults().create_index(&archive);

    assert!(matches!(result, Err(IndexError::NotADirectory(_))));
}

#[test]
fn test_empty_root_persists_empty_index() {
    let ws = Workspace::new();
    let archive = ws.archive("empty");

    let stats = DirectoryIndexer::with_defaults().create_index(&archive).unwrap();

    assert_eq!(stats.files_indexed, 0);
    assert!(archive.is_indexed());
    assert!(store::load(&archive.index).unwrap().is_empty());
}

#[test]
fn test_thread_count_does_not_change_result() {
    let ws = Workspace::new();
    let one = ws.archive("one");
    let many = ws.archive("many");
    for i in 0..40u8 {
        let bytes = content(100 + usize::from(i % 7) * 1000, i);
        write(&one.root, &format!("d{}/f{i}.bin", i % 3), &bytes);
        write(&many.root, &format!("d{}/f{i}.bin", i % 3), &bytes);
    }

    let a = DirectoryIndexer::new(IndexerConfig::default().with_io_threads(1))
        .read_index(&one)
        .unwrap();
    let b = DirectoryIndexer::new(IndexerConfig::default().with_io_threads(8))
        .read_index(&many)
        .unwrap();

    assert_eq!(a.file_count(), 40);
    for ((size_a, bucket_a), (size_b, bucket_b)) in a.buckets().zip(b.buckets()) {
        assert_eq!(size_a, size_b);
        let fa: Vec<_> = bucket_a.iter().map(|e| &e.fingerprint).collect();
        let fb: Vec<_> = bucket_b.iter().map(|e| &e.fingerprint).collect();
        assert_eq!(fa, fb);
    }
}
