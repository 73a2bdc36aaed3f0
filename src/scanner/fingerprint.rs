//! Sampled SHA-1 file fingerprints.
//!
//! # Overview
//!
//! A fingerprint identifies file content well enough to match copies of the
//! same file across archives without reading every byte of every file.
//!
//! - Files of at most `2 * CHUNK_SIZE` bytes are hashed in full.
//! - Larger files are hashed over their first `CHUNK_SIZE` bytes followed by
//!   their last `CHUNK_SIZE` bytes. The middle is never read.
//!
//! Two large files that agree on head and tail but differ in the middle get
//! the same fingerprint. Copies of the same file always do.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use sha1::{Digest, Sha1};

use super::FingerprintError;

/// Size in bytes of the head and tail samples.
pub const CHUNK_SIZE: usize = 1024;

/// Files longer than this are sampled instead of hashed in full.
const SAMPLE_THRESHOLD: u64 = 2 * CHUNK_SIZE as u64;

/// Fingerprint a file, logging and swallowing read failures.
///
/// Returns `None` when the file cannot be opened or read. Callers treat such
/// a file as absent from the index.
///
/// # Example
///
/// ```no_run
/// use archman::scanner::fingerprint;
/// use std::path::Path;
///
/// if let Some(digest) = fingerprint(Path::new("photo.jpg")) {
///     assert_eq!(digest.len(), 40);
/// }
/// ```
#[must_use]
pub fn fingerprint(path: &Path) -> Option<String> {
    match try_fingerprint(path) {
        Ok(digest) => Some(digest),
        Err(e) => {
            log::warn!("Failed to fingerprint file: {}", e);
            None
        }
    }
}

/// Fingerprint a file, reporting why it could not be read.
///
/// # Errors
///
/// Returns a [`FingerprintError`] if the file cannot be opened, its length
/// cannot be determined, or a sample cannot be read in full.
pub fn try_fingerprint(path: &Path) -> Result<String, FingerprintError> {
    let mut file = File::open(path).map_err(|e| FingerprintError::from_io(path, e))?;
    let len = file
        .metadata()
        .map_err(|e| FingerprintError::from_io(path, e))?
        .len();
    let sample = read_sample(&mut file, len).map_err(|e| FingerprintError::from_io(path, e))?;
    Ok(fingerprint_bytes(&sample))
}

/// SHA-1 of `bytes`, lowercase hex.
#[must_use]
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha1::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Select the bytes that make up the fingerprint of a `len`-byte stream.
fn read_sample<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Vec<u8>> {
    if len > SAMPLE_THRESHOLD {
        let mut sample = vec![0u8; 2 * CHUNK_SIZE];
        let (head, tail) = sample.split_at_mut(CHUNK_SIZE);
        reader.read_exact(head)?;
        reader.seek(SeekFrom::Start(len - CHUNK_SIZE as u64))?;
        reader.read_exact(tail)?;
        Ok(sample)
    } else {
        let mut content = Vec::with_capacity(len as usize);
        reader.read_to_end(&mut content)?;
        Ok(content)
    }
}
