//! Upload validation and staging
//!
//! An accepted upload is streamed to a uniquely named file in the upload
//! directory while its SHA-256 and size are computed. The staged file is
//! owned by [`StagedUpload`] and removed when that value is dropped, so every
//! exit path of an ingestion run deletes it.

use chrono::Utc;
use futures::{Stream, StreamExt};
use std::path::Path;
use tabula_common::checksum::StreamDigest;
use tempfile::TempPath;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use super::naming::staged_file_prefix;

/// Extension and media-type marker accepted for uploads
const ACCEPTED_KIND: &str = "csv";

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("No file uploaded")]
    NoFile,

    #[error("Only CSV files are allowed (got '{filename}' as {content_type})")]
    InvalidFileType {
        filename: String,
        content_type: String,
    },

    #[error("Failed to read upload body: {0}")]
    Body(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to stage upload: {0}")]
    Io(#[from] std::io::Error),
}

/// Accept only files whose extension and declared media type both say CSV
pub fn validate_upload(filename: &str, content_type: Option<&str>) -> Result<(), UploadError> {
    let extension_ok = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.to_ascii_lowercase().contains(ACCEPTED_KIND));

    let media_ok = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains(ACCEPTED_KIND));

    if extension_ok && media_ok {
        Ok(())
    } else {
        Err(UploadError::InvalidFileType {
            filename: filename.to_string(),
            content_type: content_type.unwrap_or("unknown").to_string(),
        })
    }
}

/// An upload written to disk, deleted on drop
#[derive(Debug)]
pub struct StagedUpload {
    path: TempPath,
    filename: String,
    original_name: String,
    size_bytes: u64,
    checksum: String,
}

impl StagedUpload {
    /// Stream `chunks` into a new file under `dir`
    pub async fn stage<S, B, E>(
        dir: &Path,
        original_name: impl Into<String>,
        chunks: S,
    ) -> Result<Self, UploadError>
    where
        S: Stream<Item = Result<B, E>>,
        B: AsRef<[u8]>,
        E: std::error::Error + Send + Sync + 'static,
    {
        let (file, path) = tempfile::Builder::new()
            .prefix(&staged_file_prefix(Utc::now()))
            .suffix(".csv")
            .tempfile_in(dir)?
            .into_parts();

        let mut file = tokio::fs::File::from_std(file);
        let mut digest = StreamDigest::new();
        let mut chunks = std::pin::pin!(chunks);

        while let Some(chunk) = chunks.next().await {
            let chunk = chunk.map_err(|e| UploadError::Body(Box::new(e)))?;
            let bytes = chunk.as_ref();
            digest.update(bytes);
            file.write_all(bytes).await?;
        }
        file.flush().await?;

        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (checksum, size_bytes) = digest.finish();

        tracing::debug!(%filename, size_bytes, "Upload staged");

        Ok(Self {
            path,
            filename,
            original_name: original_name.into(),
            size_bytes,
            checksum,
        })
    }

    /// Stage an in-memory body
    pub async fn from_bytes(
        dir: &Path,
        original_name: impl Into<String>,
        bytes: &[u8],
    ) -> Result<Self, UploadError> {
        let chunks = futures::stream::iter([Ok::<_, std::io::Error>(bytes)]);
        Self::stage(dir, original_name, chunks).await
    }

    pub async fn open(&self) -> std::io::Result<tokio::fs::File> {
        tokio::fs::File::open(&self.path).await
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the staged file within the upload directory
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn checksum(&self) -> &str {
        &self.checksum
    }

    pub fn is_empty(&self) -> bool {
        self.size_bytes == 0
    }
}

/// Ensure the upload directory exists
pub async fn ensure_upload_dir(dir: &Path) -> std::io::Result<()> {
    tokio::fs::create_dir_all(dir).await
}
