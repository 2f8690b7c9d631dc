//! Content hashing.
//!
//! Digests are lowercase hex BLAKE3 and identical on every platform and in
//! every process, which makes them usable as cache keys and asset ids.

use crate::fs::FileSystem;
use std::io;
use std::path::Path;

/// Length of the ids derived from a digest with [`short_id`].
pub const SHORT_ID_LEN: usize = 16;

/// Incremental hash accumulator.
///
/// Every write is framed with its length, so `["ab"]` and `["a", "b"]` hash
/// differently while the same writes in the same order always agree.
/// [`ContentHasher::finish`] consumes the hasher.
#[derive(Debug, Clone, Default)]
pub struct ContentHasher {
    inner: blake3::Hasher,
}

impl ContentHasher {
    /// Create an empty hasher.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a string chunk.
    pub fn write_string(&mut self, s: &str) {
        self.write_buffer(s.as_bytes());
    }

    /// Append a byte chunk.
    pub fn write_buffer(&mut self, bytes: &[u8]) {
        self.inner.update(&(bytes.len() as u64).to_le_bytes());
        self.inner.update(bytes);
    }

    /// Produce the hex digest.
    #[must_use]
    pub fn finish(self) -> String {
        self.inner.finalize().to_hex().to_string()
    }
}

/// Hash a single string. Same as one `write_string` followed by `finish`.
#[must_use]
pub fn hash_string(s: &str) -> String {
    hash_buffer(s.as_bytes())
}

/// Hash a single buffer. Same as one `write_buffer` followed by `finish`.
#[must_use]
pub fn hash_buffer(bytes: &[u8]) -> String {
    let mut hasher = ContentHasher::new();
    hasher.write_buffer(bytes);
    hasher.finish()
}

/// Hash the contents of a file read through `fs`.
///
/// # Errors
/// Returns an error if the file cannot be read.
pub fn hash_file(fs: &dyn FileSystem, path: &Path) -> io::Result<String> {
    let bytes = fs.read(path)?;
    Ok(hash_buffer(&bytes))
}

/// The first [`SHORT_ID_LEN`] characters of a digest.
#[must_use]
pub fn short_id(digest: &str) -> &str {
    digest.get(..SHORT_ID_LEN).unwrap_or(digest)
}
