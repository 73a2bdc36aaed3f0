//! Plain-text report formatter.
//!
//! Missing files are written one path per line. Duplicate clusters are
//! written one path per line as well, each cluster headed by a comment line
//! and separated from the next by a blank line:
//!
//! ```text
//! # 3555 bytes, 5d2c...
//! /archive/a/d1.txt
//! /archive/b/d2.txt
//!
//! # 12 bytes, 9f1e...
//! /archive/x
//! /archive/y
//! ```

use std::io::{self, Write};

use crate::compare::Cluster;
use crate::index::FileEntry;

/// Write one path per line.
///
/// # Errors
///
/// Returns any error from `writer`.
pub fn write_missing<W: Write>(writer: &mut W, entries: &[FileEntry]) -> io::Result<()> {
    for entry in entries {
        writeln!(writer, "{}", entry.path)?;
    }
    Ok(())
}

/// Write clusters as blank-line separated path groups.
///
/// # Errors
///
/// Returns any error from `writer`.
pub fn write_duplicates<W: Write>(writer: &mut W, clusters: &[Cluster]) -> io::Result<()> {
    for (i, cluster) in clusters.iter().enumerate() {
        if i > 0 {
            writeln!(writer)?;
        }
        writeln!(writer, "# {} bytes, {}", cluster.size, cluster.fingerprint)?;
        for path in cluster.paths() {
            writeln!(writer, "{path}")?;
        }
    }
    Ok(())
}
