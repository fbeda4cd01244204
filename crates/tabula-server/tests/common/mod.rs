//! Shared helpers for Tabula server integration tests
//!
//! Database-backed tests run under `#[sqlx::test]`, which creates a fresh
//! database per test from `DATABASE_URL` and applies the workspace
//! migrations. Router tests that never reach the relational store use
//! [`MemoryCatalog`] and a lazily connected pool instead.

#![allow(dead_code)]

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tabula_server::catalog::{
    CatalogError, DatasetCatalog, DatasetRecord, NewDataset, PgDocumentCatalog, RegistrationError,
};
use tabula_server::ingest::{IngestError, IngestRequest, IngestionCoordinator, StagedUpload};
use tabula_server::stores::Stores;

/// Both stores on the per-test database
pub fn stores(pool: &PgPool) -> Stores {
    Stores::new(pool.clone(), Arc::new(PgDocumentCatalog::new(pool.clone())))
}

/// Stores whose relational pool never connects, for router tests
pub fn offline_stores(catalog: Arc<dyn DatasetCatalog>) -> Stores {
    let rows = PgPoolOptions::new()
        .acquire_timeout(Duration::from_secs(1))
        .connect_lazy("postgresql://localhost:1/tabula_offline")
        .expect("lazy pool");
    Stores::new(rows, catalog)
}

/// Stage `body` and run it through `coordinator`
pub async fn ingest_bytes(
    coordinator: &IngestionCoordinator,
    dir: &Path,
    owner_id: Uuid,
    body: &[u8],
) -> Result<DatasetRecord, IngestError> {
    let upload = StagedUpload::from_bytes(dir, "sales.csv", body)
        .await
        .expect("stage upload");

    coordinator
        .ingest(IngestRequest { owner_id, upload }, &CancellationToken::new())
        .await
}

/// Catalog whose writes always fail; reads go to the real document store
pub struct FailingCatalog {
    inner: PgDocumentCatalog,
}

impl FailingCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self {
            inner: PgDocumentCatalog::new(pool),
        }
    }
}

#[async_trait]
impl DatasetCatalog for FailingCatalog {
    async fn register(&self, _dataset: NewDataset) -> Result<DatasetRecord, RegistrationError> {
        Err(RegistrationError::Store(sqlx::Error::PoolClosed))
    }

    async fn get(&self, id: Uuid) -> Result<DatasetRecord, CatalogError> {
        self.inner.get(id).await
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<DatasetRecord>, CatalogError> {
        self.inner.list_for_owner(owner_id).await
    }

    async fn table_names(&self) -> Result<HashSet<String>, CatalogError> {
        self.inner.table_names().await
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        self.inner.ping().await
    }
}

/// In-process catalog for tests that never touch Postgres
#[derive(Default)]
pub struct MemoryCatalog {
    records: Mutex<Vec<DatasetRecord>>,
}

impl MemoryCatalog {
    pub async fn insert(&self, record: DatasetRecord) {
        self.records.lock().await.push(record);
    }
}

#[async_trait]
impl DatasetCatalog for MemoryCatalog {
    async fn register(&self, dataset: NewDataset) -> Result<DatasetRecord, RegistrationError> {
        let mut records = self.records.lock().await;
        if records.iter().any(|r| r.table_name == dataset.table_name) {
            return Err(RegistrationError::TableAlreadyRegistered(dataset.table_name));
        }
        let record = dataset.into_record(chrono::Utc::now());
        records.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: Uuid) -> Result<DatasetRecord, CatalogError> {
        self.records
            .lock()
            .await
            .iter()
            .find(|r| r.id == id)
            .cloned()
            .ok_or(CatalogError::NotFound(id))
    }

    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<DatasetRecord>, CatalogError> {
        let mut owned: Vec<DatasetRecord> = self
            .records
            .lock()
            .await
            .iter()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        owned.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(owned)
    }

    async fn table_names(&self) -> Result<HashSet<String>, CatalogError> {
        Ok(self
            .records
            .lock()
            .await
            .iter()
            .map(|r| r.table_name.clone())
            .collect())
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        Ok(())
    }
}

/// A record that was never backed by a real table
pub fn sample_record(owner_id: Uuid, original_name: &str) -> DatasetRecord {
    NewDataset {
        owner_id,
        filename: "file-1700000000000-abc.csv".to_string(),
        original_name: original_name.to_string(),
        table_name: format!("data_1700000000000_{}", original_name.len()),
        row_count: 2,
        size_bytes: 24,
        checksum: "0".repeat(64),
    }
    .into_record(chrono::Utc::now())
}
