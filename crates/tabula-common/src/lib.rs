//! Tabula Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Logging setup and checksum helpers shared by the Tabula workspace.
//!
//! - **Logging**: console/file `tracing` subscriber configured from the environment
//! - **Checksums**: incremental SHA-256 for uploads streamed to disk
//!
//! # Example
//!
//! ```
//! use tabula_common::checksum::StreamDigest;
//!
//! let mut digest = StreamDigest::new();
//! digest.update(b"Month,Revenue\n");
//! let (checksum, bytes) = digest.finish();
//! assert_eq!(checksum.len(), 64);
//! assert_eq!(bytes, 14);
//! ```

pub mod checksum;
pub mod logging;
