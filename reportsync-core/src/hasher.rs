//! Content digests for change detection.
//!
//! Digests are SHA-256 over the exact file bytes, hex-encoded (64 chars).
//! They are compared for equality only. Unlike rendered output, record bytes
//! are never normalised: a CRLF/LF difference is a real difference.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::types::FileDigest;

/// Hex SHA-256 of `bytes`.
pub fn hash_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Digest of the file at `path`, or [`FileDigest::Unavailable`] when it
/// cannot be read.
pub fn hash_file(path: &Path) -> FileDigest {
    match hash_reader(path) {
        Ok(hex) => FileDigest::Available(hex),
        Err(_) => FileDigest::Unavailable,
    }
}

fn hash_reader(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}
