//! Checksum utilities for uploaded files
//!
//! Uploads are hashed while they are streamed to disk, so the digest is
//! available without a second pass over the file.

use sha2::{Digest, Sha256};

/// Incremental SHA-256 over a byte stream, tracking the total length
#[derive(Clone, Default)]
pub struct StreamDigest {
    hasher: Sha256,
    bytes: u64,
}

impl StreamDigest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next chunk of the stream
    pub fn update(&mut self, chunk: &[u8]) {
        self.hasher.update(chunk);
        self.bytes += chunk.len() as u64;
    }

    /// Number of bytes seen so far
    pub fn len(&self) -> u64 {
        self.bytes
    }

    pub fn is_empty(&self) -> bool {
        self.bytes == 0
    }

    /// Consume the digest, returning the lowercase hex checksum and byte count
    pub fn finish(self) -> (String, u64) {
        (hex::encode(self.hasher.finalize()), self.bytes)
    }
}
