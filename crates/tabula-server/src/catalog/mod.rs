//! Dataset catalog (the document store)
//!
//! The catalog owns dataset records: the mapping from a dataset identity to
//! its backing table, owner, original filename and row count. Records are
//! written once, after the backing table is fully populated, and never
//! updated. A re-upload always produces a new record.

pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use uuid::Uuid;

pub use postgres::PgDocumentCatalog;

/// One uploaded file's metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasetRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    /// Name the upload was staged under on the server
    pub filename: String,
    /// Filename as supplied by the client
    pub original_name: String,
    pub table_name: String,
    pub row_count: i64,
    pub size_bytes: i64,
    /// Lowercase hex SHA-256 of the uploaded bytes
    pub checksum: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields supplied by the ingestion pipeline when registering a dataset
#[derive(Debug, Clone)]
pub struct NewDataset {
    pub owner_id: Uuid,
    pub filename: String,
    pub original_name: String,
    pub table_name: String,
    pub row_count: i64,
    pub size_bytes: i64,
    pub checksum: String,
}

impl NewDataset {
    /// Stamp identity and timestamps, producing the immutable record
    pub fn into_record(self, created_at: DateTime<Utc>) -> DatasetRecord {
        DatasetRecord {
            id: Uuid::new_v4(),
            owner_id: self.owner_id,
            filename: self.filename,
            original_name: self.original_name,
            table_name: self.table_name,
            row_count: self.row_count,
            size_bytes: self.size_bytes,
            checksum: self.checksum,
            created_at,
            updated_at: created_at,
        }
    }
}

/// Failure writing a dataset record
#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Backing table '{0}' already has a dataset record")]
    TableAlreadyRegistered(String),

    #[error("Document store write failed: {0}")]
    Store(#[source] sqlx::Error),
}

/// Failure reading dataset records
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Dataset '{0}' not found")]
    NotFound(Uuid),

    #[error("Document store read failed: {0}")]
    Store(#[from] sqlx::Error),
}

/// Storage seam for dataset records
///
/// The pipeline only talks to the document store through this trait, so the
/// catalog can live in a different database than the backing tables.
#[async_trait]
pub trait DatasetCatalog: Send + Sync {
    /// Create exactly one record for a fully populated backing table
    async fn register(&self, dataset: NewDataset) -> Result<DatasetRecord, RegistrationError>;

    /// Look a dataset up by identity
    async fn get(&self, id: Uuid) -> Result<DatasetRecord, CatalogError>;

    /// All datasets owned by `owner_id`, newest first
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<DatasetRecord>, CatalogError>;

    /// Every backing-table name referenced by a record
    async fn table_names(&self) -> Result<HashSet<String>, CatalogError>;

    /// Cheap connectivity probe used by the health endpoint
    async fn ping(&self) -> Result<(), CatalogError>;

    /// Release store connections on shutdown
    async fn close(&self) {}
}
