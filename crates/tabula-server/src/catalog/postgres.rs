//! JSONB-document implementation of [`DatasetCatalog`]

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use sqlx::{types::Json, PgPool};
use std::collections::HashSet;
use uuid::Uuid;

use super::{CatalogError, DatasetCatalog, DatasetRecord, NewDataset, RegistrationError};

/// SQLSTATE for `unique_violation`
const UNIQUE_VIOLATION: &str = "23505";

/// Dataset catalog stored as documents in `dataset_documents`
#[derive(Clone)]
pub struct PgDocumentCatalog {
    pool: PgPool,
}

impl PgDocumentCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the document-store migrations
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }
}

#[async_trait]
impl DatasetCatalog for PgDocumentCatalog {
    #[tracing::instrument(skip(self, dataset), fields(table_name = %dataset.table_name))]
    async fn register(&self, dataset: NewDataset) -> Result<DatasetRecord, RegistrationError> {
        // Postgres keeps microseconds; trim so the document and column agree.
        let record = dataset.into_record(Utc::now().trunc_subsecs(6));

        sqlx::query(
            r#"
            INSERT INTO dataset_documents (id, owner_id, table_name, document, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(record.id)
        .bind(record.owner_id)
        .bind(&record.table_name)
        .bind(Json(&record))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if crate::db::has_sqlstate(&e, UNIQUE_VIOLATION) {
                RegistrationError::TableAlreadyRegistered(record.table_name.clone())
            } else {
                RegistrationError::Store(e)
            }
        })?;

        tracing::debug!(dataset_id = %record.id, "Dataset record created");

        Ok(record)
    }

    #[tracing::instrument(skip(self))]
    async fn get(&self, id: Uuid) -> Result<DatasetRecord, CatalogError> {
        let document: Option<Json<DatasetRecord>> =
            sqlx::query_scalar("SELECT document FROM dataset_documents WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        document
            .map(|Json(record)| record)
            .ok_or(CatalogError::NotFound(id))
    }

    #[tracing::instrument(skip(self))]
    async fn list_for_owner(&self, owner_id: Uuid) -> Result<Vec<DatasetRecord>, CatalogError> {
        let documents: Vec<Json<DatasetRecord>> = sqlx::query_scalar(
            r#"
            SELECT document
            FROM dataset_documents
            WHERE owner_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(documents.into_iter().map(|Json(record)| record).collect())
    }

    async fn table_names(&self) -> Result<HashSet<String>, CatalogError> {
        let names: Vec<String> = sqlx::query_scalar("SELECT table_name FROM dataset_documents")
            .fetch_all(&self.pool)
            .await?;

        Ok(names.into_iter().collect())
    }

    async fn ping(&self) -> Result<(), CatalogError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}
