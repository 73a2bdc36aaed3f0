//! Folding archive indexes into a master index.

use crate::index::Index;

/// Merge indexes left to right into one.
///
/// Starting from an empty index, each input is absorbed in turn: a bucket
/// size seen for the first time is adopted, a known size gets the incoming
/// entries appended after the ones already there. Entries with equal content
/// from different archives are all kept.
///
/// # Example
///
/// ```
/// use archman::compare::merge;
/// use archman::index::{FileEntry, Index};
///
/// let a: Index = vec![FileEntry::new("/a/x", 4, "f1")].into_iter().collect();
/// let b: Index = vec![FileEntry::new("/b/x", 4, "f1")].into_iter().collect();
///
/// let master = merge(vec![a, b]);
/// assert_eq!(master.bucket(4).unwrap().len(), 2);
/// ```
#[must_use]
pub fn merge(indexes: impl IntoIterator<Item = Index>) -> Index {
    let master = indexes.into_iter().fold(Index::new(), |mut acc, next| {
        acc.absorb(next);
        acc
    });

    log::debug!(
        "Merged master index: {} buckets / {} files",
        master.bucket_count(),
        master.file_count()
    );
    master
}
