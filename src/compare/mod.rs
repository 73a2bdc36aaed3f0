//! Cross-archive comparison built on size-bucketed indexes.
//!
//! This module provides functionality for:
//! - Folding several archive indexes into one master index ([`merge`])
//! - Finding entries of one index with no counterpart in another ([`missing`])
//! - Clustering content-identical entries within one index ([`duplicates`])
//!
//! All three treat their input indexes as read-only (merge consumes them) and
//! compare entries only within the bucket of their size, so the cost is
//! linear in the number of entries rather than quadratic in the archive.
//!
//! # Example
//!
//! ```
//! use archman::compare::{duplicates, merge, missing};
//! use archman::index::{FileEntry, Index};
//!
//! let backup: Index = vec![FileEntry::new("/backup/a.jpg", 10, "aa")].into_iter().collect();
//! let phone: Index = vec![
//!     FileEntry::new("/phone/a.jpg", 10, "aa"),
//!     FileEntry::new("/phone/b.jpg", 12, "bb"),
//!     FileEntry::new("/phone/b-copy.jpg", 12, "bb"),
//! ]
//! .into_iter()
//! .collect();
//!
//! let master = merge(vec![backup]);
//! let not_backed_up = missing(&master, &phone);
//! assert_eq!(not_backed_up.len(), 2);
//!
//! let clusters = duplicates(&phone);
//! assert_eq!(clusters.len(), 1);
//! assert_eq!(clusters[0].len(), 2);
//! ```

pub mod duplicates;
pub mod merge;
pub mod missing;

pub use duplicates::{duplicates, Cluster, DuplicateSummary};
pub use merge::merge;
pub use missing::missing;
