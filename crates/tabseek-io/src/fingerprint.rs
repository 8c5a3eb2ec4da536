//! Cheap change detection for source files.
//!
//! A fingerprint is the blake3 hash of the file's size, modification time,
//! and path. It does not read file contents.

use std::path::Path;
use std::time::UNIX_EPOCH;

use tabseek_core::hash::{hash_parts, Hash256};

use crate::error::Result;

pub fn fingerprint(path: &Path) -> Result<Hash256> {
    let meta = std::fs::metadata(path)?;
    let size = meta.len().to_le_bytes();
    let mtime = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_nanos())
        .unwrap_or(0)
        .to_le_bytes();
    let path_str = path.to_string_lossy();
    Ok(hash_parts([&size[..], &mtime[..], path_str.as_bytes()]))
}
