//! Target-minus-reference difference of two indexes.

use std::collections::HashSet;

use crate::index::{FileEntry, Index};

/// Entries of `target` with no content-equal counterpart in `reference`.
///
/// An entry is missing when `reference` has no bucket for its size, or that
/// bucket holds no entry with the same fingerprint. The result follows the
/// bucket order of `target`, then the order within each bucket.
///
/// The question is one-directional: `missing(a, b)` says what in `b` is not
/// represented in `a`. Copy counts are not compared, so one copy in the
/// reference covers any number of copies in the target.
#[must_use]
pub fn missing(reference: &Index, target: &Index) -> Vec<FileEntry> {
    let mut result = Vec::new();

    for (size, entries) in target.buckets() {
        let Some(candidates) = reference.bucket(size) else {
            result.extend(entries.iter().cloned());
            continue;
        };

        let known: HashSet<&str> = candidates.iter().map(|e| e.fingerprint.as_str()).collect();
        result.extend(
            entries
                .iter()
                .filter(|e| !known.contains(e.fingerprint.as_str()))
                .cloned(),
        );
    }

    log::debug!(
        "{} of {} target files have no counterpart in the reference",
        result.len(),
        target.file_count()
    );
    result
}
