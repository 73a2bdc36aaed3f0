//! Binary persistence of index artifacts.
//!
//! # Format
//!
//! ```text
//! +----------------+--------------------------------------------------+
//! | "ARCHIDX\0"    | bincode(standard) { version, checksum, index }   |
//! +----------------+--------------------------------------------------+
//! ```
//!
//! `checksum` is the SHA-256 of the bincode encoding of `index`, hex encoded.
//!
//! An artifact is never overwritten once it has content. Writes go to a
//! sibling `.partial` file that is renamed into place only after it has been
//! fully written and synced.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::{artifact_has_content, Index, IndexError};

/// Current version of the artifact format.
pub const ARTIFACT_VERSION: u32 = 1;

/// Leading bytes of every artifact.
const MAGIC: &[u8; 8] = b"ARCHIDX\0";

/// Largest artifact body that is written or decoded.
///
/// Length prefixes claiming more than this are rejected before anything is
/// allocated for them.
pub const MAX_ARTIFACT_BYTES: usize = 1 << 30;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    checksum: String,
    index: &'a Index,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    checksum: String,
    index: Index,
}

fn bincode_config() -> impl bincode::config::Config {
    bincode::config::standard().with_limit::<MAX_ARTIFACT_BYTES>()
}

/// SHA-256 over the encoded index.
fn checksum(index: &Index) -> Result<String, IndexError> {
    let encoded = bincode::serde::encode_to_vec(index, bincode_config())
        .map_err(|e| IndexError::Encode(e.to_string()))?;
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Serialize an index into artifact bytes.
///
/// # Errors
///
/// Returns [`IndexError::Encode`] if bincode rejects the data.
pub fn to_bytes(index: &Index) -> Result<Vec<u8>, IndexError> {
    let envelope = EnvelopeRef {
        version: ARTIFACT_VERSION,
        checksum: checksum(index)?,
        index,
    };

    let body = bincode::serde::encode_to_vec(&envelope, bincode_config())
        .map_err(|e| IndexError::Encode(e.to_string()))?;
    if body.len() > MAX_ARTIFACT_BYTES {
        return Err(IndexError::Encode(format!(
            "index encodes to {} bytes, more than the {} byte limit",
            body.len(),
            MAX_ARTIFACT_BYTES
        )));
    }

    let mut bytes = Vec::with_capacity(MAGIC.len() + body.len());
    bytes.extend_from_slice(MAGIC);
    bytes.extend_from_slice(&body);
    Ok(bytes)
}

/// Decode artifact bytes read from `path`.
///
/// # Errors
///
/// Returns [`IndexError::Corrupt`] for foreign or truncated data,
/// [`IndexError::UnsupportedVersion`] and [`IndexError::ChecksumMismatch`]
/// for artifacts that decode but cannot be trusted.
pub fn from_bytes(bytes: &[u8], path: &Path) -> Result<Index, IndexError> {
    let corrupt = |reason: String| IndexError::Corrupt {
        path: path.to_path_buf(),
        reason,
    };

    let body = bytes
        .strip_prefix(MAGIC.as_slice())
        .ok_or_else(|| corrupt("missing index header".to_string()))?;
    if body.len() > MAX_ARTIFACT_BYTES {
        return Err(corrupt(format!("{} bytes exceeds the artifact limit", body.len())));
    }

    let (envelope, consumed): (Envelope, usize) =
        bincode::serde::decode_from_slice(body, bincode_config())
            .map_err(|e| corrupt(e.to_string()))?;

    if consumed != body.len() {
        return Err(corrupt(format!(
            "{} trailing bytes after index data",
            body.len() - consumed
        )));
    }

    if envelope.version != ARTIFACT_VERSION {
        return Err(IndexError::UnsupportedVersion {
            path: path.to_path_buf(),
            found: envelope.version,
            expected: ARTIFACT_VERSION,
        });
    }

    if checksum(&envelope.index)? != envelope.checksum {
        return Err(IndexError::ChecksumMismatch(path.to_path_buf()));
    }

    envelope.index.validate().map_err(|(key, found)| match found {
        Some(size) => corrupt(format!("entry of size {size} stored under bucket {key}")),
        None => corrupt(format!("empty bucket {key}")),
    })?;

    Ok(envelope.index)
}

/// Persist `index` at `path`.
///
/// Returns the number of bytes written.
///
/// # Errors
///
/// Returns [`IndexError::AlreadyExists`] if `path` already has content, and
/// [`IndexError::Io`] if the artifact cannot be written.
pub fn save(index: &Index, path: &Path) -> Result<u64, IndexError> {
    if artifact_has_content(path) {
        return Err(IndexError::AlreadyExists(path.to_path_buf()));
    }

    let bytes = to_bytes(index)?;
    let io_err = |source: std::io::Error| IndexError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let partial = partial_path(path);
    let written = write_synced(&partial, &bytes).and_then(|()| fs::rename(&partial, path));
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&partial) {
            log::debug!(
                "Could not remove partial artifact {}: {}",
                partial.display(),
                cleanup
            );
        }
        return Err(io_err(e));
    }

    log::debug!("Wrote {} bytes to {}", bytes.len(), path.display());
    Ok(bytes.len() as u64)
}

/// Load the index stored at `path`.
///
/// # Errors
///
/// See [`from_bytes`]; additionally [`IndexError::Io`] if the file cannot be
/// read.
pub fn load(path: &Path) -> Result<Index, IndexError> {
    let bytes = fs::read(path).map_err(|source| IndexError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    from_bytes(&bytes, path)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

fn partial_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map_or_else(|| "index".into(), |n| n.to_string_lossy());
    path.with_file_name(format!(".{name}.partial"))
}
